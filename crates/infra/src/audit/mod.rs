//! Append-only audit trail.
//!
//! Entries are written once and never updated or deleted; they stay readable
//! after the entity they describe changes or disappears.
//!
//! ## Best-effort semantics
//!
//! Audit writes happen *after* the business mutation has committed and are
//! not part of its transaction. [`AuditLogger::record`] swallows store
//! failures (logging them and bumping [`AuditLogger::dropped`]), so a failed
//! audit write never fails or rolls back the request. The cost is that an
//! entry can be lost when the audit store is down at the moment of the
//! mutation, or when the process dies between commit and audit write.

pub mod in_memory;
pub mod postgres;
pub mod query;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use showcase_auth::{Actor, ActorKind};
use showcase_core::{AuditLogId, UserId};

pub use in_memory::InMemoryAuditLog;
pub use postgres::PostgresAuditLog;
pub use query::{AuditFilter, AuditOrder, AuditPage, Pagination};

/// Action tags written by the collaboration layer.
pub mod actions {
    pub const COLLABORATION_INVITE: &str = "collaboration.invite";
    pub const COLLABORATION_ACCEPT: &str = "collaboration.accept";
    pub const COLLABORATION_REJECT: &str = "collaboration.reject";
    pub const COLLABORATION_REMOVE: &str = "collaboration.remove";
}

/// Entity type tags.
pub mod entities {
    pub const PROJECT: &str = "project";
    pub const COLLABORATION_INVITE: &str = "collaboration_invite";
}

/// An audit entry that has not been written yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    pub actor_id: Option<UserId>,
    pub actor_type: ActorKind,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: JsonValue,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn new(actor: &Actor, action: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            actor_id: actor.id(),
            actor_type: actor.kind(),
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: None,
            metadata: JsonValue::Object(Default::default()),
            ip_address: None,
            user_agent: None,
            created_at: Utc::now(),
        }
    }

    pub fn entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    fn into_entry(self, id: AuditLogId) -> AuditLogEntry {
        AuditLogEntry {
            id,
            actor_id: self.actor_id,
            actor_type: self.actor_type,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            metadata: self.metadata,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
        }
    }
}

/// A written, immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: AuditLogId,
    pub actor_id: Option<UserId>,
    pub actor_type: ActorKind,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<String>,
    pub metadata: JsonValue,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum AuditStoreError {
    #[error("audit storage error: {0}")]
    Storage(String),

    #[error("corrupt audit row: {0}")]
    Corrupt(String),
}

/// Append-only audit store. There is no update or delete.
#[async_trait::async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AuditStoreError>;

    /// Filtered, offset-paginated read.
    async fn query(
        &self,
        filter: &AuditFilter,
        order: AuditOrder,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditStoreError>;
}

/// Best-effort writer in front of an [`AuditLog`].
pub struct AuditLogger {
    store: Arc<dyn AuditLog>,
    dropped: AtomicU64,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditLog>) -> Self {
        Self {
            store,
            dropped: AtomicU64::new(0),
        }
    }

    /// Write an entry, swallowing failures.
    ///
    /// Call only after the mutation it describes has succeeded.
    pub async fn record(&self, entry: NewAuditEntry) -> Option<AuditLogEntry> {
        let action = entry.action.clone();
        match self.store.append(entry).await {
            Ok(written) => {
                tracing::debug!(audit_id = %written.id, action = %written.action, "audit entry written");
                Some(written)
            }
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(action = %action, error = %e, "audit write failed; entry dropped");
                None
            }
        }
    }

    /// Read path behind `GET /audit-logs`.
    pub async fn logs(
        &self,
        filter: &AuditFilter,
        order: AuditOrder,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditStoreError> {
        self.store.query(filter, order, pagination).await
    }

    /// Number of entries lost to store failures since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
