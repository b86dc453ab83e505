//! Configuration loading and representation.

use std::collections::HashMap;

use chrono::Duration;
use thiserror::Error;

use crate::gate::ExistencePolicy;
use crate::idempotency::IdempotencyConfig;

pub const DEV_JWT_SECRET: &str = "dev-secret";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} is required when USE_PERSISTENT_STORES=true")]
    Missing(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub use_persistent_stores: bool,
    pub idempotency: IdempotencyConfig,
    pub existence_policy: ExistencePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            redis_url: None,
            use_persistent_stores: false,
            idempotency: IdempotencyConfig::default(),
            existence_policy: ExistencePolicy::default(),
        }
    }
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret.to_string(),
            None => {
                tracing::warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret
            }
        };

        let use_persistent_stores = match get("USE_PERSISTENT_STORES") {
            Some(v) => v.parse::<bool>().map_err(|e| ConfigError::Invalid {
                name: "USE_PERSISTENT_STORES",
                reason: e.to_string(),
            })?,
            None => false,
        };

        let database_url = get("DATABASE_URL").map(str::to_string);
        if use_persistent_stores && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let idempotency = IdempotencyConfig {
            retention: seconds(get("IDEMPOTENCY_RETENTION_SECS"), "IDEMPOTENCY_RETENTION_SECS")?
                .unwrap_or(defaults.idempotency.retention),
            in_flight_timeout: seconds(
                get("IDEMPOTENCY_IN_FLIGHT_TIMEOUT_SECS"),
                "IDEMPOTENCY_IN_FLIGHT_TIMEOUT_SECS",
            )?
            .unwrap_or(defaults.idempotency.in_flight_timeout),
        };

        let existence_policy = match get("EXISTENCE_POLICY") {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                name: "EXISTENCE_POLICY",
                reason,
            })?,
            None => defaults.existence_policy,
        };

        Ok(Self {
            jwt_secret,
            bind_addr: get("BIND_ADDR").map(str::to_string).unwrap_or(defaults.bind_addr),
            database_url,
            redis_url: get("REDIS_URL").map(str::to_string),
            use_persistent_stores,
            idempotency,
            existence_policy,
        })
    }
}

fn seconds(raw: Option<&str>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let secs = raw.parse::<u32>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Some(Duration::seconds(i64::from(secs))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = AppConfig::from_vars(HashMap::new()).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.idempotency.retention, Duration::hours(24));
        assert_eq!(cfg.idempotency.in_flight_timeout, Duration::seconds(60));
    }

    #[test]
    fn values_are_parsed() {
        let cfg = AppConfig::from_vars(vars(&[
            ("JWT_SECRET", "s3cret"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("USE_PERSISTENT_STORES", "true"),
            ("DATABASE_URL", "postgres://localhost/showcase"),
            ("IDEMPOTENCY_RETENTION_SECS", "3600"),
            ("EXISTENCE_POLICY", "conceal"),
        ]))
        .unwrap();

        assert_eq!(cfg.jwt_secret, "s3cret");
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert!(cfg.use_persistent_stores);
        assert_eq!(cfg.idempotency.retention, Duration::hours(1));
        assert_eq!(cfg.existence_policy, ExistencePolicy::Conceal);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = AppConfig::from_vars(vars(&[("IDEMPOTENCY_IN_FLIGHT_TIMEOUT_SECS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "IDEMPOTENCY_IN_FLIGHT_TIMEOUT_SECS", .. }));

        let err = AppConfig::from_vars(vars(&[("USE_PERSISTENT_STORES", "true")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        assert!(AppConfig::from_vars(vars(&[("EXISTENCE_POLICY", "maybe")])).is_err());
        assert!(AppConfig::from_vars(vars(&[("IDEMPOTENCY_RETENTION_SECS", "0")])).is_err());
    }
}
