use thiserror::Error;

use showcase_core::{InviteId, ProjectId, UserId};

/// Reportable collaboration failures.
///
/// Each variant has a stable [`code`](CollabError::code) so clients can branch
/// on the failure without parsing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollabError {
    #[error("project {0} not found")]
    ProjectNotFound(ProjectId),

    #[error("creator not found: {0}")]
    CreatorNotFound(String),

    #[error("invite {0} not found")]
    InviteNotFound(InviteId),

    #[error("creator {0} is not active")]
    InactiveCreator(UserId),

    #[error("creators cannot invite themselves")]
    SelfInvite,

    #[error("creator {0} is already a collaborator")]
    AlreadyCollaborator(UserId),

    #[error("an invite for creator {0} is already pending")]
    InvitePending(UserId),

    #[error("invite {0} is not addressed to this creator")]
    NotInviteRecipient(InviteId),

    #[error("invite {0} is no longer pending")]
    InviteNotPending(InviteId),

    #[error("only the primary creator may perform this action")]
    NotPrimaryCreator,

    #[error("the primary creator cannot be removed from their own project")]
    CannotRemovePrimaryCreator,

    #[error("creator {0} is not a collaborator on this project")]
    NotCollaborator(UserId),
}

impl CollabError {
    pub fn code(&self) -> &'static str {
        match self {
            CollabError::ProjectNotFound(_) => "project_not_found",
            CollabError::CreatorNotFound(_) => "creator_not_found",
            CollabError::InviteNotFound(_) => "invite_not_found",
            CollabError::InactiveCreator(_) => "inactive_creator",
            CollabError::SelfInvite => "self_invite",
            CollabError::AlreadyCollaborator(_) => "already_collaborator",
            CollabError::InvitePending(_) => "invite_pending",
            CollabError::NotInviteRecipient(_) => "not_invite_recipient",
            CollabError::InviteNotPending(_) => "invite_not_pending",
            CollabError::NotPrimaryCreator => "not_primary_creator",
            CollabError::CannotRemovePrimaryCreator => "cannot_remove_primary_creator",
            CollabError::NotCollaborator(_) => "not_collaborator",
        }
    }
}
