//! Request-level failure taxonomy shared by the gate and the HTTP adapter.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use showcase_auth::AuthzError;
use showcase_collab::CollabError;

/// Sub-tag for [`GateError::Conflict`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    InvitePending,
    AlreadyCollaborator,
    InviteNotPending,
    IdempotencyInFlight,
    IdempotencyKeyReused,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::InvitePending => "invite_pending",
            ConflictKind::AlreadyCollaborator => "already_collaborator",
            ConflictKind::InviteNotPending => "invite_not_pending",
            ConflictKind::IdempotencyInFlight => "idempotency_in_flight",
            ConflictKind::IdempotencyKeyReused => "idempotency_key_reused",
        }
    }

    /// The client may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConflictKind::IdempotencyInFlight)
    }
}

/// Terminal failure of a gated request. None of these are retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict ({}): {message}", kind.as_str())]
    Conflict { kind: ConflictKind, message: String },

    #[error("rate limited until {reset_at}")]
    RateLimited {
        limit: u32,
        reset_at: DateTime<Utc>,
        retry_after_secs: u64,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    pub fn conflict(kind: ConflictKind, message: impl Into<String>) -> Self {
        GateError::Conflict {
            kind,
            message: message.into(),
        }
    }

    /// Stable machine-readable tag.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::Unauthorized(_) => "unauthorized",
            GateError::Forbidden(_) => "forbidden",
            GateError::NotFound(_) => "not_found",
            GateError::Conflict { .. } => "conflict",
            GateError::RateLimited { .. } => "rate_limited",
            GateError::Validation(_) => "validation_error",
            GateError::Unavailable(_) => "unavailable",
            GateError::Internal(_) => "internal",
        }
    }

    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            GateError::Conflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Human-readable detail without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            GateError::Unauthorized(m)
            | GateError::Forbidden(m)
            | GateError::NotFound(m)
            | GateError::Validation(m)
            | GateError::Unavailable(m)
            | GateError::Internal(m) => m.clone(),
            GateError::Conflict { message, .. } => message.clone(),
            GateError::RateLimited { retry_after_secs, .. } => {
                format!("too many requests, retry in {retry_after_secs}s")
            }
        }
    }
}

impl From<AuthzError> for GateError {
    fn from(e: AuthzError) -> Self {
        match e {
            AuthzError::Unauthenticated => GateError::Unauthorized(e.to_string()),
            AuthzError::Forbidden(_) => GateError::Forbidden(e.to_string()),
        }
    }
}

impl From<CollabError> for GateError {
    fn from(e: CollabError) -> Self {
        let message = e.to_string();
        match e {
            CollabError::ProjectNotFound(_)
            | CollabError::CreatorNotFound(_)
            | CollabError::InviteNotFound(_)
            | CollabError::NotCollaborator(_) => GateError::NotFound(message),
            CollabError::InactiveCreator(_) | CollabError::SelfInvite => {
                GateError::Validation(message)
            }
            CollabError::NotInviteRecipient(_)
            | CollabError::NotPrimaryCreator
            | CollabError::CannotRemovePrimaryCreator => GateError::Forbidden(message),
            CollabError::AlreadyCollaborator(_) => {
                GateError::conflict(ConflictKind::AlreadyCollaborator, message)
            }
            CollabError::InvitePending(_) => {
                GateError::conflict(ConflictKind::InvitePending, message)
            }
            CollabError::InviteNotPending(_) => {
                GateError::conflict(ConflictKind::InviteNotPending, message)
            }
        }
    }
}
