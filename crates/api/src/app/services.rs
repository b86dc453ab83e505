//! Infrastructure wiring: stores, request-safety services and the gate.
//!
//! In-memory stores by default; `USE_PERSISTENT_STORES=true` switches the
//! audit log and collaboration store to Postgres, and (with the `redis`
//! feature) rate-limit buckets to Redis when `REDIS_URL` is set.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use showcase_auth::{Hs256JwtValidator, JwtValidator};
use showcase_infra::audit::{AuditLogger, InMemoryAuditLog, PostgresAuditLog};
use showcase_infra::collaboration::{
    CollaborationStore, InMemoryCollaborationStore, PostgresCollaborationStore,
};
use showcase_infra::config::AppConfig;
use showcase_infra::idempotency::IdempotencyGuard;
use showcase_infra::rate_limit::{RateLimitPolicy, RateLimiter};
use showcase_infra::AuthorizationGate;

/// Per-route-group throttling policies.
#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    /// Collaboration mutations (invite, respond, remove).
    pub collaboration: RateLimitPolicy,
    /// Everything else behind the actor middleware.
    pub api: RateLimitPolicy,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            collaboration: RateLimitPolicy::collaboration(),
            api: RateLimitPolicy::api(),
        }
    }
}

#[derive(Clone)]
pub struct AppServices {
    pub gate: AuthorizationGate,
    pub rate_limits: RateLimits,
}

impl AppServices {
    pub fn new(gate: AuthorizationGate) -> Self {
        Self {
            gate,
            rate_limits: RateLimits::default(),
        }
    }

    /// Fully in-memory wiring over the given collaboration store.
    pub fn in_memory(config: &AppConfig, collaboration: Arc<InMemoryCollaborationStore>) -> Self {
        let gate = AuthorizationGate::new(
            RateLimiter::in_memory(),
            IdempotencyGuard::in_memory(config.idempotency),
            Arc::new(AuditLogger::new(Arc::new(InMemoryAuditLog::new()))),
            collaboration,
        )
        .with_existence_policy(config.existence_policy);
        Self::new(gate)
    }

    pub fn with_rate_limits(mut self, rate_limits: RateLimits) -> Self {
        self.rate_limits = rate_limits;
        self
    }
}

pub fn jwt_validator(secret: &str) -> Arc<dyn JwtValidator> {
    Arc::new(Hs256JwtValidator::new(secret.as_bytes()))
}

pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    if !config.use_persistent_stores {
        tracing::info!("using in-memory stores");
        return Ok(AppServices::in_memory(
            config,
            Arc::new(InMemoryCollaborationStore::new()),
        ));
    }

    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required for persistent stores")?;
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;

    let audit = PostgresAuditLog::new(pool.clone());
    audit.ensure_schema().await.context("failed to apply audit schema")?;
    let collaboration = PostgresCollaborationStore::new(pool);
    collaboration
        .ensure_schema()
        .await
        .context("failed to apply collaboration schema")?;

    let collaboration: Arc<dyn CollaborationStore> = Arc::new(collaboration);
    let gate = AuthorizationGate::new(
        rate_limiter(config)?,
        IdempotencyGuard::in_memory(config.idempotency),
        Arc::new(AuditLogger::new(Arc::new(audit))),
        collaboration,
    )
    .with_existence_policy(config.existence_policy);

    tracing::info!("using Postgres-backed stores");
    Ok(AppServices::new(gate))
}

#[cfg(feature = "redis")]
fn rate_limiter(config: &AppConfig) -> anyhow::Result<RateLimiter> {
    use showcase_infra::rate_limit::RedisRateLimitStore;

    match config.redis_url.as_deref() {
        Some(url) => {
            let store = RedisRateLimitStore::new(url).context("invalid REDIS_URL")?;
            tracing::info!("using Redis-backed rate limiting");
            Ok(RateLimiter::new(Arc::new(store)))
        }
        None => Ok(RateLimiter::in_memory()),
    }
}

#[cfg(not(feature = "redis"))]
fn rate_limiter(config: &AppConfig) -> anyhow::Result<RateLimiter> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but the `redis` feature is disabled; rate limits are process-local");
    }
    Ok(RateLimiter::in_memory())
}
