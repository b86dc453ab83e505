use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::{
    BeginOutcome, ClaimToken, IdempotencyConfig, IdempotencyKey, IdempotencyStore, IdempotencyStoreError,
    StoredResponse,
};

const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
enum RecordState {
    InFlight { token: ClaimToken, started_at: DateTime<Utc> },
    Completed(StoredResponse),
}

impl RecordState {
    fn is_claimed_by(&self, token: ClaimToken) -> bool {
        matches!(self, RecordState::InFlight { token: held, .. } if *held == token)
    }
}

#[derive(Debug, Clone)]
struct Record {
    request_hash: String,
    state: RecordState,
    expires_at: DateTime<Utc>,
}

/// Process-local idempotency records behind one mutex.
#[derive(Debug, Default)]
pub struct InMemoryIdempotencyStore {
    config: IdempotencyConfig,
    records: Mutex<HashMap<IdempotencyKey, Record>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: IdempotencyConfig) -> Self {
        Self {
            config,
            records: Mutex::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> IdempotencyStoreError {
        IdempotencyStoreError::Backend("lock poisoned".to_string())
    }
}

#[async_trait::async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn begin(
        &self,
        key: &IdempotencyKey,
        request_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<BeginOutcome, IdempotencyStoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        if records.len() >= SWEEP_THRESHOLD {
            records.retain(|_, r| r.expires_at > now);
        }

        let token = ClaimToken::new();
        let claim = Record {
            request_hash: request_hash.to_string(),
            state: RecordState::InFlight { token, started_at: now },
            expires_at: now + self.config.retention,
        };

        let existing = match records.get(key) {
            Some(record) if record.expires_at > now => record,
            _ => {
                records.insert(key.clone(), claim);
                return Ok(BeginOutcome::New(token));
            }
        };

        if existing.request_hash != request_hash {
            return Err(IdempotencyStoreError::KeyReused);
        }

        match &existing.state {
            RecordState::Completed(response) => Ok(BeginOutcome::Completed(response.clone())),
            RecordState::InFlight { started_at, .. }
                if *started_at + self.config.in_flight_timeout > now =>
            {
                Ok(BeginOutcome::InFlight)
            }
            RecordState::InFlight { .. } => {
                tracing::warn!(key = %key, "taking over abandoned in-flight idempotency record");
                records.insert(key.clone(), claim);
                Ok(BeginOutcome::New(token))
            }
        }
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        token: ClaimToken,
        response: StoredResponse,
        now: DateTime<Utc>,
    ) -> Result<(), IdempotencyStoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        match records.get_mut(key) {
            Some(record) if record.state.is_claimed_by(token) => {
                record.state = RecordState::Completed(response);
                record.expires_at = now + self.config.retention;
            }
            _ => tracing::debug!(key = %key, claim = %token, "ignoring completion for a stale claim"),
        }
        Ok(())
    }

    async fn release(
        &self,
        key: &IdempotencyKey,
        token: ClaimToken,
    ) -> Result<(), IdempotencyStoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        if records.get(key).is_some_and(|r| r.state.is_claimed_by(token)) {
            records.remove(key);
        }
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, IdempotencyStoreError> {
        let mut records = self.records.lock().map_err(|_| Self::poisoned())?;
        let before = records.len();
        records.retain(|_, r| r.expires_at > now);
        Ok(before - records.len())
    }
}
