//! Audit log query interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use showcase_auth::ActorKind;
use showcase_core::UserId;

use super::AuditLogEntry;

/// Offset pagination for audit queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    /// 1-based page number to offset.
    pub fn page(page: u32, limit: u32) -> Self {
        let limit = limit.clamp(1, Self::MAX_LIMIT);
        Self {
            limit,
            offset: page.saturating_sub(1).saturating_mul(limit),
        }
    }
}

/// Filter criteria; every field is optional and set fields combine with AND.
///
/// The date range is half-open: `created_from <= created_at < created_to`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditFilter {
    pub actor_id: Option<UserId>,
    pub actor_type: Option<ActorKind>,
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, entry: &AuditLogEntry) -> bool {
        self.actor_id.is_none_or(|id| entry.actor_id == Some(id))
            && self.actor_type.is_none_or(|kind| entry.actor_type == kind)
            && self.action.as_deref().is_none_or(|a| entry.action == a)
            && self.entity_type.as_deref().is_none_or(|t| entry.entity_type == t)
            && self
                .entity_id
                .as_deref()
                .is_none_or(|id| entry.entity_id.as_deref() == Some(id))
            && self.created_from.is_none_or(|from| entry.created_at >= from)
            && self.created_to.is_none_or(|to| entry.created_at < to)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// One page of audit results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditPage {
    pub records: Vec<AuditLogEntry>,
    /// Number of entries matching the filter across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl AuditPage {
    pub(crate) fn new(records: Vec<AuditLogEntry>, total: u64, pagination: Pagination) -> Self {
        let has_more = u64::from(pagination.offset) + (records.len() as u64) < total;
        Self {
            records,
            total,
            pagination,
            has_more,
        }
    }
}
