use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use showcase_core::{ProjectId, UserId};

/// A project and its fixed primary creator.
///
/// The primary creator is set at creation and never transferred by the
/// collaboration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub primary_creator_id: UserId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(primary_creator_id: UserId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ProjectId::new(),
            primary_creator_id,
            title: title.into(),
            created_at: now,
        }
    }

    pub fn is_primary_creator(&self, creator_id: UserId) -> bool {
        self.primary_creator_id == creator_id
    }
}

/// The collaboration view of a creator account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    pub active: bool,
}

impl CreatorProfile {
    pub fn new(email: &str, display_name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(),
            email: normalize_email(email),
            display_name: display_name.into(),
            active: true,
        }
    }

    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorRole {
    Collaborator,
}

/// Membership row granting edit access. Unique per (project, creator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub project_id: ProjectId,
    pub creator_id: UserId,
    pub role: CollaboratorRole,
    pub joined_at: DateTime<Utc>,
}

/// Email lookup key: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
        let profile = CreatorProfile::new(" Ada@Example.com", "Ada");
        assert_eq!(profile.email, "ada@example.com");
        assert!(profile.active);
        assert!(!profile.deactivated().active);
    }
}
