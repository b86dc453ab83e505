//! Per-project access derivation.
//!
//! Edit access ⇔ primary creator OR collaborator row exists.
//! Owner-level actions (delete, invite, remove collaborator) require the
//! primary creator.

use serde::{Deserialize, Serialize};

use showcase_core::UserId;

use crate::{CollabError, CreatorProfile, Project};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Edit,
    Owner,
}

/// Access facts for one (project, creator) pair.
#[derive(Debug, Clone, Copy)]
pub struct ProjectAccess<'a> {
    project: &'a Project,
    creator_id: UserId,
    is_collaborator: bool,
}

impl<'a> ProjectAccess<'a> {
    pub fn new(project: &'a Project, creator_id: UserId, is_collaborator: bool) -> Self {
        Self {
            project,
            creator_id,
            is_collaborator,
        }
    }

    pub fn is_primary_creator(&self) -> bool {
        self.project.is_primary_creator(self.creator_id)
    }

    pub fn can_edit(&self) -> bool {
        self.is_primary_creator() || self.is_collaborator
    }

    pub fn can_delete(&self) -> bool {
        self.is_primary_creator()
    }

    pub fn can_invite(&self) -> bool {
        self.is_primary_creator()
    }

    pub fn can_remove_collaborator(&self) -> bool {
        self.is_primary_creator()
    }

    pub fn permits(&self, level: AccessLevel) -> bool {
        match level {
            AccessLevel::Edit => self.can_edit(),
            AccessLevel::Owner => self.is_primary_creator(),
        }
    }
}

pub fn ensure_primary_creator(project: &Project, actor_id: UserId) -> Result<(), CollabError> {
    if project.is_primary_creator(actor_id) {
        Ok(())
    } else {
        Err(CollabError::NotPrimaryCreator)
    }
}

/// Checks that do not depend on existing invite/collaborator rows.
///
/// Row-dependent checks (already a collaborator, invite pending) run inside the
/// store's atomic step.
pub fn validate_invite(
    project: &Project,
    inviter_id: UserId,
    invitee: &CreatorProfile,
) -> Result<(), CollabError> {
    if invitee.id == inviter_id {
        return Err(CollabError::SelfInvite);
    }
    ensure_primary_creator(project, inviter_id)?;
    if !invitee.active {
        return Err(CollabError::InactiveCreator(invitee.id));
    }
    Ok(())
}

pub fn ensure_can_remove(
    project: &Project,
    actor_id: UserId,
    target_id: UserId,
) -> Result<(), CollabError> {
    ensure_primary_creator(project, actor_id)?;
    if target_id == project.primary_creator_id {
        return Err(CollabError::CannotRemovePrimaryCreator);
    }
    Ok(())
}
