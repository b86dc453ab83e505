use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use showcase_collab::{
    normalize_email, CollabError, CollaborationInvite, Collaborator, CreatorProfile,
    InviteResponse, InviteStatus, InviteTransition, Project,
};
use showcase_core::{InviteId, ProjectId, UserId};

use super::{CollaborationStore, CollaborationStoreError, InviteListing, InviteView};

#[derive(Debug, Default)]
struct State {
    creators: HashMap<UserId, CreatorProfile>,
    projects: HashMap<ProjectId, Project>,
    invites: HashMap<InviteId, CollaborationInvite>,
    /// Unique (project, receiver) → invite.
    invite_index: HashMap<(ProjectId, UserId), InviteId>,
    collaborators: HashMap<(ProjectId, UserId), Collaborator>,
}

impl State {
    fn view(&self, invite: &CollaborationInvite, counterpart: UserId) -> InviteView {
        InviteView {
            invite: invite.clone(),
            project_title: self
                .projects
                .get(&invite.project_id)
                .map(|p| p.title.clone())
                .unwrap_or_default(),
            counterpart_email: self
                .creators
                .get(&counterpart)
                .map(|c| c.email.clone())
                .unwrap_or_default(),
        }
    }
}

/// All collaboration state behind one mutex; each transition is a single
/// critical section.
#[derive(Debug, Default)]
pub struct InMemoryCollaborationStore {
    state: Mutex<State>,
}

impl InMemoryCollaborationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, CollaborationStoreError> {
        self.state
            .lock()
            .map_err(|_| CollaborationStoreError::Backend("lock poisoned".to_string()))
    }

    /// Register (or replace) a creator profile.
    pub fn insert_creator(&self, creator: CreatorProfile) -> Result<(), CollaborationStoreError> {
        self.lock()?.creators.insert(creator.id, creator);
        Ok(())
    }

    pub fn insert_project(&self, project: Project) -> Result<(), CollaborationStoreError> {
        self.lock()?.projects.insert(project.id, project);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CollaborationStore for InMemoryCollaborationStore {
    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>, CollaborationStoreError> {
        Ok(self.lock()?.projects.get(&id).cloned())
    }

    async fn get_creator(&self, id: UserId) -> Result<Option<CreatorProfile>, CollaborationStoreError> {
        Ok(self.lock()?.creators.get(&id).cloned())
    }

    async fn find_creator_by_email(
        &self,
        email: &str,
    ) -> Result<Option<CreatorProfile>, CollaborationStoreError> {
        let email = normalize_email(email);
        Ok(self
            .lock()?
            .creators
            .values()
            .find(|c| c.email == email)
            .cloned())
    }

    async fn is_collaborator(
        &self,
        project_id: ProjectId,
        creator_id: UserId,
    ) -> Result<bool, CollaborationStoreError> {
        Ok(self.lock()?.collaborators.contains_key(&(project_id, creator_id)))
    }

    async fn get_invite(
        &self,
        id: InviteId,
    ) -> Result<Option<CollaborationInvite>, CollaborationStoreError> {
        Ok(self.lock()?.invites.get(&id).cloned())
    }

    async fn open_invite(
        &self,
        project_id: ProjectId,
        sender_id: UserId,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<CollaborationInvite, CollaborationStoreError> {
        let mut state = self.lock()?;

        if !state.projects.contains_key(&project_id) {
            return Err(CollabError::ProjectNotFound(project_id).into());
        }
        if state.collaborators.contains_key(&(project_id, receiver_id)) {
            return Err(CollabError::AlreadyCollaborator(receiver_id).into());
        }

        if let Some(existing_id) = state.invite_index.get(&(project_id, receiver_id)).copied() {
            let invite = state
                .invites
                .get_mut(&existing_id)
                .ok_or_else(|| CollaborationStoreError::Backend("dangling invite index".to_string()))?;
            invite.reopen(sender_id, now)?;
            return Ok(invite.clone());
        }

        let invite = CollaborationInvite::new_pending(project_id, sender_id, receiver_id, now);
        state.invite_index.insert((project_id, receiver_id), invite.id);
        state.invites.insert(invite.id, invite.clone());
        Ok(invite)
    }

    async fn respond_invite(
        &self,
        invite_id: InviteId,
        responder_id: UserId,
        response: InviteResponse,
        now: DateTime<Utc>,
    ) -> Result<InviteTransition, CollaborationStoreError> {
        let mut state = self.lock()?;

        let invite = state
            .invites
            .get_mut(&invite_id)
            .ok_or(CollabError::InviteNotFound(invite_id))?;
        let transition = invite.respond(responder_id, response, now)?;

        if let Some(collaborator) = &transition.collaborator {
            state
                .collaborators
                .insert((collaborator.project_id, collaborator.creator_id), collaborator.clone());
        }
        Ok(transition)
    }

    async fn remove_collaborator(
        &self,
        project_id: ProjectId,
        creator_id: UserId,
    ) -> Result<Collaborator, CollaborationStoreError> {
        let mut state = self.lock()?;

        let removed = state
            .collaborators
            .remove(&(project_id, creator_id))
            .ok_or(CollabError::NotCollaborator(creator_id))?;

        let accepted = state
            .invite_index
            .get(&(project_id, creator_id))
            .copied()
            .filter(|id| {
                state
                    .invites
                    .get(id)
                    .is_some_and(|i| i.status == InviteStatus::Accepted)
            });
        if let Some(invite_id) = accepted {
            state.invites.remove(&invite_id);
            state.invite_index.remove(&(project_id, creator_id));
        }

        Ok(removed)
    }

    async fn list_collaborators(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Collaborator>, CollaborationStoreError> {
        let state = self.lock()?;
        let mut rows: Vec<Collaborator> = state
            .collaborators
            .values()
            .filter(|c| c.project_id == project_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.joined_at);
        Ok(rows)
    }

    async fn list_invites_for(&self, creator_id: UserId) -> Result<InviteListing, CollaborationStoreError> {
        let state = self.lock()?;

        let mut received: Vec<InviteView> = state
            .invites
            .values()
            .filter(|i| i.receiver_id == creator_id)
            .map(|i| state.view(i, i.sender_id))
            .collect();
        let mut sent: Vec<InviteView> = state
            .invites
            .values()
            .filter(|i| i.sender_id == creator_id)
            .map(|i| state.view(i, i.receiver_id))
            .collect();

        let newest_first =
            |a: &InviteView, b: &InviteView| (b.invite.created_at, b.invite.id).cmp(&(a.invite.created_at, a.invite.id));
        received.sort_by(newest_first);
        sent.sort_by(newest_first);

        Ok(InviteListing { received, sent })
    }
}
