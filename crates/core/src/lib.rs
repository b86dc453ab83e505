//! `showcase-core`: identifiers and the domain error model shared by every
//! layer of the access core.
//!
//! Pure types only; no storage or transport concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{AuditLogId, InviteId, ProjectId, UserId};
