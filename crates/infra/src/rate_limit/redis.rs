//! Redis-backed counters shared across instances.
//!
//! The check-and-increment runs as one Lua script so concurrent hits from
//! different processes serialize on the Redis server.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use redis::Script;
use tracing::instrument;

use super::{RateLimitDecision, RateLimitKey, RateLimitStore, RateLimitStoreError};

const KEY_PREFIX: &str = "showcase:ratelimit:";

/// Returns `{allowed, count, ttl_ms}`.
const HIT_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local ttl = redis.call('PTTL', KEYS[1])
if current >= tonumber(ARGV[2]) and ttl > 0 then
  return {0, current, ttl}
end
current = redis.call('INCR', KEYS[1])
if current == 1 or ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {1, current, ttl}
"#;

#[derive(Clone)]
pub struct RedisRateLimitStore {
    client: Arc<redis::Client>,
    script: Arc<Script>,
}

impl RedisRateLimitStore {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, RateLimitStoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RateLimitStoreError::Backend(e.to_string()))?;
        Ok(Self {
            client: Arc::new(client),
            script: Arc::new(Script::new(HIT_SCRIPT)),
        })
    }
}

#[async_trait::async_trait]
impl RateLimitStore for RedisRateLimitStore {
    #[instrument(skip(self), fields(key = %key), err)]
    async fn hit(
        &self,
        key: &RateLimitKey,
        window: Duration,
        max: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        let mut conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| RateLimitStoreError::Backend(e.to_string()))?;

        let (allowed, count, ttl_ms): (i64, i64, i64) = self
            .script
            .key(format!("{KEY_PREFIX}{key}"))
            .arg(window.num_milliseconds().max(1))
            .arg(max)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| RateLimitStoreError::Backend(e.to_string()))?;

        let count = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
        Ok(RateLimitDecision {
            allowed: allowed == 1,
            limit: max,
            remaining: max.saturating_sub(count),
            reset_at: now + Duration::milliseconds(ttl_ms.max(0)),
        })
    }
}
