//! Exactly-once execution for retried mutating requests.
//!
//! ```text
//!   begin ──▶ (no record)  insert in-flight ─▶ New        (caller executes)
//!         ──▶ in-flight                     ─▶ InFlight   (caller rejects, retryable)
//!         ──▶ in-flight, older than timeout ─▶ New        (abandoned; taken over)
//!         ──▶ completed                     ─▶ Completed  (stored response replayed)
//!         ──▶ hash differs                  ─▶ KeyReused  (client error)
//! ```
//!
//! Records expire after `retention`. Only successful responses are completed;
//! on failure the caller releases the in-flight record. Both calls carry the
//! [`ClaimToken`] handed out with `New`; a claim that was since taken over no
//! longer matches and is left alone.

pub mod in_memory;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ConflictKind, GateError};

pub use in_memory::InMemoryIdempotencyStore;

pub const MAX_KEY_LEN: usize = 255;
pub const ANONYMOUS_SCOPE: &str = "anonymous";

/// Client-supplied key, scoped to the actor and route it was used on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    scope: String,
    route: String,
    key: String,
}

impl IdempotencyKey {
    pub fn new(
        scope: impl Into<String>,
        route: impl Into<String>,
        key: &str,
    ) -> Result<Self, GateError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(GateError::Validation("idempotency key must not be empty".to_string()));
        }
        if key.len() > MAX_KEY_LEN {
            return Err(GateError::Validation(format!(
                "idempotency key must be at most {MAX_KEY_LEN} characters"
            )));
        }
        Ok(Self {
            scope: scope.into(),
            route: route.into(),
            key: key.to_string(),
        })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.scope, self.route, self.key)
    }
}

/// Fingerprint of a request: lowercase hex SHA-256 over method, path and body.
pub fn request_hash(method: &str, path: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update([0u8]);
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// The response replayed verbatim for a completed key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub body: JsonValue,
}

/// Identifies one execution's claim on a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClaimToken(Uuid);

impl ClaimToken {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ClaimToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    New(ClaimToken),
    InFlight,
    Completed(StoredResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyConfig {
    pub retention: Duration,
    pub in_flight_timeout: Duration,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            retention: Duration::hours(24),
            in_flight_timeout: Duration::seconds(60),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdempotencyStoreError {
    #[error("idempotency key reused with a different request")]
    KeyReused,

    #[error("idempotency backend error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Atomically look up `key` and claim it when absent.
    async fn begin(
        &self,
        key: &IdempotencyKey,
        request_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<BeginOutcome, IdempotencyStoreError>;

    /// Store the response if `token` still holds the in-flight claim.
    async fn complete(
        &self,
        key: &IdempotencyKey,
        token: ClaimToken,
        response: StoredResponse,
        now: DateTime<Utc>,
    ) -> Result<(), IdempotencyStoreError>;

    /// Drop the in-flight claim held by `token` so a retry executes again.
    async fn release(
        &self,
        key: &IdempotencyKey,
        token: ClaimToken,
    ) -> Result<(), IdempotencyStoreError>;

    /// Delete expired records; returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IdempotencyStoreError>;
}

/// Idempotency service. Store outages fail open: the request runs once
/// without protection.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>) -> Self {
        Self { store }
    }

    pub fn in_memory(config: IdempotencyConfig) -> Self {
        Self::new(Arc::new(InMemoryIdempotencyStore::with_config(config)))
    }

    /// `InFlight` is returned as-is; the caller decides how to reject it.
    pub async fn begin(
        &self,
        key: &IdempotencyKey,
        request_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<BeginOutcome, GateError> {
        match self.store.begin(key, request_hash, now).await {
            Ok(outcome) => Ok(outcome),
            Err(IdempotencyStoreError::KeyReused) => Err(GateError::conflict(
                ConflictKind::IdempotencyKeyReused,
                "idempotency key was already used for a different request",
            )),
            Err(IdempotencyStoreError::Backend(e)) => {
                tracing::warn!(key = %key, error = %e, "idempotency store unavailable; executing unprotected");
                Ok(BeginOutcome::New(ClaimToken::new()))
            }
        }
    }

    pub async fn complete(
        &self,
        key: &IdempotencyKey,
        token: ClaimToken,
        response: StoredResponse,
        now: DateTime<Utc>,
    ) {
        if let Err(e) = self.store.complete(key, token, response, now).await {
            tracing::warn!(key = %key, error = %e, "failed to store idempotent response");
        }
    }

    pub async fn release(&self, key: &IdempotencyKey, token: ClaimToken) {
        if let Err(e) = self.store.release(key, token).await {
            tracing::warn!(key = %key, error = %e, "failed to release idempotency key");
        }
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        match self.store.purge_expired(now).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "idempotency purge failed");
                0
            }
        }
    }
}

/// Maps an in-flight outcome to the retryable conflict clients see.
pub fn in_flight_error() -> GateError {
    GateError::conflict(
        ConflictKind::IdempotencyInFlight,
        "a request with this idempotency key is still being processed",
    )
}
