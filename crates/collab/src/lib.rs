//! `showcase-collab`: multi-author project collaboration domain.
//!
//! Pure state transitions and access derivation. Atomicity of each transition
//! is the job of the store that applies it (see `showcase-infra`).

pub mod access;
pub mod error;
pub mod invite;
pub mod project;

pub use access::{
    ensure_can_remove, ensure_primary_creator, validate_invite, AccessLevel, ProjectAccess,
};
pub use error::CollabError;
pub use invite::{CollaborationInvite, InviteResponse, InviteStatus, InviteTransition};
pub use project::{normalize_email, Collaborator, CollaboratorRole, CreatorProfile, Project};
