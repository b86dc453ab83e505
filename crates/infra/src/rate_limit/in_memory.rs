use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use super::{RateLimitDecision, RateLimitKey, RateLimitStore, RateLimitStoreError};

/// Expired buckets are swept once this many keys are tracked.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Process-local counters behind one mutex.
///
/// Intended for single-instance deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    buckets: Mutex<HashMap<RateLimitKey, Bucket>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().map(|b| b.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn hit(
        &self,
        key: &RateLimitKey,
        window: Duration,
        max: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| RateLimitStoreError::Backend("lock poisoned".to_string()))?;

        if buckets.len() >= SWEEP_THRESHOLD {
            buckets.retain(|_, b| b.reset_at > now);
        }

        let bucket = buckets.entry(key.clone()).or_insert(Bucket {
            count: 0,
            reset_at: now + window,
        });
        if now >= bucket.reset_at {
            bucket.count = 0;
            bucket.reset_at = now + window;
        }

        if bucket.count >= max {
            return Ok(RateLimitDecision {
                allowed: false,
                limit: max,
                remaining: 0,
                reset_at: bucket.reset_at,
            });
        }

        bucket.count += 1;
        Ok(RateLimitDecision {
            allowed: true,
            limit: max,
            remaining: max - bucket.count,
            reset_at: bucket.reset_at,
        })
    }
}
