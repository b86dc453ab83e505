//! Collaboration invite lifecycle.
//!
//! ```text
//!            invite                accept
//!   none ───────────▶ pending ───────────▶ accepted (terminal)
//!                       │  ▲
//!                reject │  │ re-invite
//!                       ▼  │
//!                     rejected
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use showcase_core::{InviteId, ProjectId, UserId};

use crate::{CollabError, Collaborator, CollaboratorRole};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::Pending => "pending",
            InviteStatus::Accepted => "accepted",
            InviteStatus::Rejected => "rejected",
        }
    }
}

impl core::str::FromStr for InviteStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InviteStatus::Pending),
            "accepted" => Ok(InviteStatus::Accepted),
            "rejected" => Ok(InviteStatus::Rejected),
            other => Err(format!("unknown invite status '{other}'")),
        }
    }
}

/// The receiver's answer to a pending invite.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteResponse {
    Accept,
    Reject,
}

impl core::str::FromStr for InviteResponse {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(InviteResponse::Accept),
            "reject" => Ok(InviteResponse::Reject),
            other => Err(format!("action must be 'accept' or 'reject', got '{other}'")),
        }
    }
}

/// Invite record, unique per (project, receiver).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollaborationInvite {
    pub id: InviteId,
    pub project_id: ProjectId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub status: InviteStatus,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

/// Result of a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteTransition {
    pub invite: CollaborationInvite,
    /// Present exactly when the invite was accepted.
    pub collaborator: Option<Collaborator>,
}

impl CollaborationInvite {
    pub fn new_pending(
        project_id: ProjectId,
        sender_id: UserId,
        receiver_id: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: InviteId::new(),
            project_id,
            sender_id,
            receiver_id,
            status: InviteStatus::Pending,
            created_at: now,
            responded_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == InviteStatus::Pending
    }

    /// Re-invite after a rejection: the existing record goes back to pending
    /// instead of a second record being created.
    pub fn reopen(&mut self, sender_id: UserId, now: DateTime<Utc>) -> Result<(), CollabError> {
        match self.status {
            InviteStatus::Rejected => {
                self.status = InviteStatus::Pending;
                self.sender_id = sender_id;
                self.created_at = now;
                self.responded_at = None;
                Ok(())
            }
            InviteStatus::Pending => Err(CollabError::InvitePending(self.receiver_id)),
            InviteStatus::Accepted => Err(CollabError::AlreadyCollaborator(self.receiver_id)),
        }
    }

    /// Apply the receiver's response. Only legal while pending.
    pub fn respond(
        &mut self,
        responder_id: UserId,
        response: InviteResponse,
        now: DateTime<Utc>,
    ) -> Result<InviteTransition, CollabError> {
        if responder_id != self.receiver_id {
            return Err(CollabError::NotInviteRecipient(self.id));
        }
        if !self.is_pending() {
            return Err(CollabError::InviteNotPending(self.id));
        }

        self.responded_at = Some(now);
        let collaborator = match response {
            InviteResponse::Accept => {
                self.status = InviteStatus::Accepted;
                Some(Collaborator {
                    project_id: self.project_id,
                    creator_id: self.receiver_id,
                    role: CollaboratorRole::Collaborator,
                    joined_at: now,
                })
            }
            InviteResponse::Reject => {
                self.status = InviteStatus::Rejected;
                None
            }
        };

        Ok(InviteTransition {
            invite: self.clone(),
            collaborator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> CollaborationInvite {
        CollaborationInvite::new_pending(ProjectId::new(), UserId::new(), UserId::new(), Utc::now())
    }

    #[test]
    fn accept_creates_collaborator() {
        let mut invite = pending();
        let receiver = invite.receiver_id;

        let t = invite.respond(receiver, InviteResponse::Accept, Utc::now()).unwrap();
        assert_eq!(t.invite.status, InviteStatus::Accepted);
        let collab = t.collaborator.unwrap();
        assert_eq!(collab.creator_id, receiver);
        assert_eq!(collab.project_id, invite.project_id);
        assert!(invite.responded_at.is_some());
    }

    #[test]
    fn double_accept_is_rejected() {
        let mut invite = pending();
        let receiver = invite.receiver_id;
        invite.respond(receiver, InviteResponse::Accept, Utc::now()).unwrap();

        let err = invite.respond(receiver, InviteResponse::Accept, Utc::now()).unwrap_err();
        assert_eq!(err, CollabError::InviteNotPending(invite.id));
    }

    #[test]
    fn reject_creates_nothing() {
        let mut invite = pending();
        let receiver = invite.receiver_id;
        let t = invite.respond(receiver, InviteResponse::Reject, Utc::now()).unwrap();
        assert_eq!(t.invite.status, InviteStatus::Rejected);
        assert!(t.collaborator.is_none());
    }

    #[test]
    fn only_receiver_may_respond() {
        let mut invite = pending();
        let err = invite
            .respond(invite.sender_id, InviteResponse::Accept, Utc::now())
            .unwrap_err();
        assert_eq!(err, CollabError::NotInviteRecipient(invite.id));
        assert!(invite.is_pending());
    }

    #[test]
    fn rejected_invite_reopens_in_place() {
        let mut invite = pending();
        let id = invite.id;
        let receiver = invite.receiver_id;
        invite.respond(receiver, InviteResponse::Reject, Utc::now()).unwrap();

        invite.reopen(invite.sender_id, Utc::now()).unwrap();
        assert_eq!(invite.id, id);
        assert!(invite.is_pending());
        assert!(invite.responded_at.is_none());
    }

    #[test]
    fn pending_and_accepted_invites_cannot_reopen() {
        let mut invite = pending();
        assert_eq!(
            invite.reopen(invite.sender_id, Utc::now()),
            Err(CollabError::InvitePending(invite.receiver_id))
        );

        let receiver = invite.receiver_id;
        invite.respond(receiver, InviteResponse::Accept, Utc::now()).unwrap();
        assert_eq!(
            invite.reopen(invite.sender_id, Utc::now()),
            Err(CollabError::AlreadyCollaborator(receiver))
        );
    }

    #[test]
    fn response_parsing() {
        assert_eq!("accept".parse::<InviteResponse>().unwrap(), InviteResponse::Accept);
        assert!("maybe".parse::<InviteResponse>().is_err());
        assert_eq!("rejected".parse::<InviteStatus>().unwrap(), InviteStatus::Rejected);
    }
}
