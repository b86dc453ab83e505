//! Collaboration persistence.
//!
//! The pure rules live in `showcase-collab`; stores here apply each
//! transition as one atomic step so concurrent requests cannot both succeed
//! on the same (project, receiver) pair.

pub mod in_memory;
pub mod postgres;
pub mod service;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use showcase_collab::{
    CollabError, CollaborationInvite, Collaborator, CreatorProfile, InviteResponse,
    InviteTransition, Project,
};
use showcase_core::{InviteId, ProjectId, UserId};

use crate::error::GateError;

pub use in_memory::InMemoryCollaborationStore;
pub use postgres::PostgresCollaborationStore;
pub use service::CollaborationService;

#[derive(Debug, Error)]
pub enum CollaborationStoreError {
    #[error(transparent)]
    Domain(#[from] CollabError),

    #[error("collaboration storage error: {0}")]
    Backend(String),
}

impl From<CollaborationStoreError> for GateError {
    fn from(e: CollaborationStoreError) -> Self {
        match e {
            CollaborationStoreError::Domain(d) => d.into(),
            CollaborationStoreError::Backend(msg) => {
                tracing::error!(error = %msg, "collaboration store failure");
                GateError::Internal("collaboration storage failure".to_string())
            }
        }
    }
}

/// An invite enriched for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteView {
    #[serde(flatten)]
    pub invite: CollaborationInvite,
    pub project_title: String,
    /// Sender email on received invites, receiver email on sent ones.
    pub counterpart_email: String,
}

/// Invites involving one creator, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteListing {
    pub received: Vec<InviteView>,
    pub sent: Vec<InviteView>,
}

#[async_trait::async_trait]
pub trait CollaborationStore: Send + Sync {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, CollaborationStoreError>;

    async fn get_creator(&self, id: UserId) -> Result<Option<CreatorProfile>, CollaborationStoreError>;

    /// Case-insensitive, whitespace-trimmed lookup.
    async fn find_creator_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CreatorProfile>, CollaborationStoreError>;

    async fn is_collaborator(
        &self,
        project_id: ProjectId,
        creator_id: UserId,
    ) -> Result<bool, CollaborationStoreError>;

    async fn get_invite(
        &self,
        id: InviteId,
    ) -> Result<Option<CollaborationInvite>, CollaborationStoreError>;

    /// Create a pending invite, or reset a rejected one back to pending.
    ///
    /// Fails `AlreadyCollaborator` when a collaborator row (or accepted invite)
    /// exists and `InvitePending` when a pending invite exists.
    async fn open_invite(
        &self,
        project_id: ProjectId,
        sender_id: UserId,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<CollaborationInvite, CollaborationStoreError>;

    /// Apply a response; on accept the collaborator row is written in the
    /// same atomic step.
    async fn respond_invite(
        &self,
        invite_id: InviteId,
        responder_id: UserId,
        response: InviteResponse,
        now: DateTime<Utc>,
    ) -> Result<InviteTransition, CollaborationStoreError>;

    /// Remove the collaborator row and its accepted invite together.
    async fn remove_collaborator(
        &self,
        project_id: ProjectId,
        creator_id: UserId,
    ) -> Result<Collaborator, CollaborationStoreError>;

    async fn list_collaborators(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Collaborator>, CollaborationStoreError>;

    async fn list_invites_for(&self, creator_id: UserId) -> Result<InviteListing, CollaborationStoreError>;
}
