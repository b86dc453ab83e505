//! Collaboration operations as route handlers call them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use showcase_auth::Actor;
use showcase_collab::{
    ensure_can_remove, ensure_primary_creator, validate_invite, CollabError, CollaborationInvite,
    Collaborator, InviteResponse, InviteTransition, Project,
};
use showcase_core::{InviteId, ProjectId, UserId};

use super::{CollaborationStore, InviteListing};
use crate::error::GateError;

#[derive(Clone)]
pub struct CollaborationService {
    store: Arc<dyn CollaborationStore>,
}

impl CollaborationService {
    pub fn new(store: Arc<dyn CollaborationStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CollaborationStore> {
        &self.store
    }

    async fn project(&self, project_id: ProjectId) -> Result<Project, GateError> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or_else(|| CollabError::ProjectNotFound(project_id).into())
    }

    /// Invite a creator, by email, to collaborate on a project.
    pub async fn invite(
        &self,
        project_id: ProjectId,
        inviter: &Actor,
        invitee_email: &str,
        now: DateTime<Utc>,
    ) -> Result<CollaborationInvite, GateError> {
        let inviter_id = inviter.require_id()?;
        let project = self.project(project_id).await?;
        ensure_primary_creator(&project, inviter_id)?;

        let invitee = self
            .store
            .find_creator_by_email(invitee_email)
            .await?
            .ok_or_else(|| CollabError::CreatorNotFound(invitee_email.trim().to_string()))?;
        validate_invite(&project, inviter_id, &invitee)?;

        let invite = self
            .store
            .open_invite(project.id, inviter_id, invitee.id, now)
            .await?;
        info!(invite_id = %invite.id, project_id = %project.id, receiver_id = %invitee.id, "collaboration invite sent");
        Ok(invite)
    }

    pub async fn respond(
        &self,
        invite_id: InviteId,
        responder: &Actor,
        response: InviteResponse,
        now: DateTime<Utc>,
    ) -> Result<InviteTransition, GateError> {
        let responder_id = responder.require_id()?;
        let transition = self
            .store
            .respond_invite(invite_id, responder_id, response, now)
            .await?;
        info!(
            invite_id = %invite_id,
            status = transition.invite.status.as_str(),
            "collaboration invite answered"
        );
        Ok(transition)
    }

    pub async fn list_invites(&self, actor: &Actor) -> Result<InviteListing, GateError> {
        let creator_id = actor.require_id()?;
        Ok(self.store.list_invites_for(creator_id).await?)
    }

    /// Primary-creator-only; the primary creator can never be removed.
    pub async fn remove_collaborator(
        &self,
        project_id: ProjectId,
        actor: &Actor,
        target_id: UserId,
    ) -> Result<Collaborator, GateError> {
        let actor_id = actor.require_id()?;
        let project = self.project(project_id).await?;
        ensure_can_remove(&project, actor_id, target_id)?;

        let removed = self.store.remove_collaborator(project_id, target_id).await?;
        info!(project_id = %project_id, creator_id = %target_id, "collaborator removed");
        Ok(removed)
    }

    pub async fn list_collaborators(&self, project_id: ProjectId) -> Result<Vec<Collaborator>, GateError> {
        self.project(project_id).await?;
        Ok(self.store.list_collaborators(project_id).await?)
    }
}
