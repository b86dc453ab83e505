use std::sync::RwLock;

use showcase_core::AuditLogId;

use super::{
    AuditFilter, AuditLog, AuditLogEntry, AuditOrder, AuditPage, AuditStoreError, NewAuditEntry,
    Pagination,
};

/// In-memory append-only audit log.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: NewAuditEntry) -> Result<AuditLogEntry, AuditStoreError> {
        let written = entry.into_entry(AuditLogId::new());

        let mut entries = self
            .entries
            .write()
            .map_err(|_| AuditStoreError::Storage("lock poisoned".to_string()))?;
        entries.push(written.clone());

        Ok(written)
    }

    async fn query(
        &self,
        filter: &AuditFilter,
        order: AuditOrder,
        pagination: Pagination,
    ) -> Result<AuditPage, AuditStoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AuditStoreError::Storage("lock poisoned".to_string()))?;

        let mut matching: Vec<&AuditLogEntry> = entries.iter().filter(|e| filter.matches(e)).collect();
        matching.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if order == AuditOrder::NewestFirst {
            matching.reverse();
        }

        let total = matching.len() as u64;
        let records = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();

        Ok(AuditPage::new(records, total, pagination))
    }
}
