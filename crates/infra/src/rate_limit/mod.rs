//! Fixed-window request counting per (route, client).
//!
//! A window opens on the first hit for a key and lasts `policy.window`. Hits
//! beyond `max_requests` are rejected without consuming the window, and the
//! counter resets to zero once `reset_at` has passed. Every store must make the
//! read-increment-compare step atomic per key.

pub mod in_memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::GateError;

pub use in_memory::InMemoryRateLimitStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisRateLimitStore;

/// Per-route limit.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitPolicy {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    /// Sign-in and credential endpoints: 5 per 15 minutes.
    pub fn auth() -> Self {
        Self::new(Duration::minutes(15), 5)
    }

    /// General API traffic: 100 per 15 minutes.
    pub fn api() -> Self {
        Self::new(Duration::minutes(15), 100)
    }

    pub fn collaboration() -> Self {
        Self::new(Duration::minutes(15), 30)
    }

    pub fn contact() -> Self {
        Self::new(Duration::hours(1), 5)
    }
}

/// Bucket key: `<route>:<client>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey(String);

impl RateLimitKey {
    pub fn new(route: &str, client: &str) -> Self {
        Self(format!("{route}:{client}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, rounded up.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        let ms = (self.reset_at - now).num_milliseconds().max(0) as u64;
        ms.div_ceil(1000)
    }
}

#[derive(Debug, Error)]
pub enum RateLimitStoreError {
    #[error("rate limit backend error: {0}")]
    Backend(String),
}

#[async_trait::async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one hit against `key` and report whether it is within `max`.
    async fn hit(
        &self,
        key: &RateLimitKey,
        window: Duration,
        max: u32,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitStoreError>;
}

/// Rate limiting service. Store outages fail closed.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()))
    }

    pub async fn check(
        &self,
        key: &RateLimitKey,
        policy: RateLimitPolicy,
    ) -> Result<RateLimitDecision, GateError> {
        self.check_at(key, policy, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        key: &RateLimitKey,
        policy: RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, GateError> {
        let decision = self
            .store
            .hit(key, policy.window, policy.max_requests, now)
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "rate limit store failed; rejecting request");
                GateError::Unavailable("rate limiter unavailable".to_string())
            })?;

        if !decision.allowed {
            tracing::info!(key = %key, reset_at = %decision.reset_at, "rate limit exceeded");
        }
        Ok(decision)
    }

    /// Like [`check_at`](Self::check_at) but turns a rejection into
    /// [`GateError::RateLimited`].
    pub async fn enforce(
        &self,
        key: &RateLimitKey,
        policy: RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, GateError> {
        let decision = self.check_at(key, policy, now).await?;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(GateError::RateLimited {
                limit: decision.limit,
                reset_at: decision.reset_at,
                retry_after_secs: decision.retry_after_secs(now),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    #[async_trait::async_trait]
    impl RateLimitStore for BrokenStore {
        async fn hit(
            &self,
            _key: &RateLimitKey,
            _window: Duration,
            _max: u32,
            _now: DateTime<Utc>,
        ) -> Result<RateLimitDecision, RateLimitStoreError> {
            Err(RateLimitStoreError::Backend("connection refused".to_string()))
        }
    }

    #[test]
    fn keys_join_route_and_client() {
        assert_eq!(RateLimitKey::new("invites.create", "10.0.0.7").as_str(), "invites.create:10.0.0.7");
    }

    #[test]
    fn presets() {
        assert_eq!(RateLimitPolicy::auth().max_requests, 5);
        assert_eq!(RateLimitPolicy::auth().window, Duration::minutes(15));
        assert_eq!(RateLimitPolicy::api().max_requests, 100);
        assert_eq!(RateLimitPolicy::contact().window, Duration::hours(1));
    }

    #[test]
    fn retry_after_rounds_up() {
        let now = Utc::now();
        let decision = RateLimitDecision {
            allowed: false,
            limit: 5,
            remaining: 0,
            reset_at: now + Duration::milliseconds(1200),
        };
        assert_eq!(decision.retry_after_secs(now), 2);
        assert_eq!(decision.retry_after_secs(now + Duration::seconds(5)), 0);
    }

    #[tokio::test]
    async fn store_failure_fails_closed() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore));
        let err = limiter
            .check(&RateLimitKey::new("auth", "1.2.3.4"), RateLimitPolicy::auth())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "unavailable");
    }

    #[tokio::test]
    async fn enforce_reports_reset_hint() {
        let limiter = RateLimiter::in_memory();
        let key = RateLimitKey::new("contact", "1.2.3.4");
        let policy = RateLimitPolicy::new(Duration::seconds(10), 1);
        let now = Utc::now();

        limiter.enforce(&key, policy, now).await.unwrap();
        match limiter.enforce(&key, policy, now).await {
            Err(GateError::RateLimited {
                limit,
                retry_after_secs,
                ..
            }) => {
                assert_eq!(limit, 1);
                assert_eq!(retry_after_secs, 10);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
    }
}
