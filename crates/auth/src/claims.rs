use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use showcase_core::UserId;

use crate::{Actor, ActorKind, Role};

/// Signed credential claims (transport-agnostic).
///
/// This is the minimal claim set the platform expects once a token has been
/// decoded and its signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Subject / account identifier.
    pub sub: UserId,

    pub kind: ActorKind,

    pub role: Role,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub issued_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,
}

impl CredentialClaims {
    /// Resolve the actor these claims describe.
    ///
    /// Call [`validate_claims`] first; this only reshapes data.
    pub fn into_actor(self) -> Actor {
        Actor::from_parts(Some(self.sub), self.kind, self.role, self.email)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("role '{role}' is not valid for a {kind} credential")]
    RoleMismatch { kind: ActorKind, role: Role },

    #[error("malformed or unverifiable token: {0}")]
    Malformed(String),
}

/// Deterministically validate credential claims.
///
/// Visitors never hold credentials, so a `visitor` kind is rejected the same
/// way as any other kind/role mismatch.
pub fn validate_claims(
    claims: &CredentialClaims,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    if claims.kind == ActorKind::Visitor || !claims.kind.admits(claims.role) {
        return Err(TokenValidationError::RoleMismatch {
            kind: claims.kind,
            role: claims.role,
        });
    }
    Ok(())
}

/// Verifies a bearer token and returns its validated claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>)
        -> Result<CredentialClaims, TokenValidationError>;
}

/// HMAC-SHA256 token validator.
pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks run in `validate_claims` against the caller's clock.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<CredentialClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<CredentialClaims>(token, &self.key, &self.validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
