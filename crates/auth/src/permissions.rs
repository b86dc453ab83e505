use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Permission identifier.
///
/// An atomic capability tag such as `project.create` or `audit.view`.
/// Permissions are granted to roles by the static table in
/// [`crate::policy::RolePermissionSet`]; a role name never implies a permission
/// on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Permission {
    ProjectView,
    ProjectCreate,
    ProjectUpdate,
    ProjectDelete,
    RatingCreate,
    ContactCreate,
    ContactView,
    CollaborationInvite,
    CollaborationRespond,
    CollaborationRemove,
    CreatorProfileUpdate,
    CreatorManage,
    AuditView,
    RoleManage,
    SettingsManage,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl Permission {
    /// The full permission universe.
    pub const ALL: [Permission; 15] = [
        Permission::ProjectView,
        Permission::ProjectCreate,
        Permission::ProjectUpdate,
        Permission::ProjectDelete,
        Permission::RatingCreate,
        Permission::ContactCreate,
        Permission::ContactView,
        Permission::CollaborationInvite,
        Permission::CollaborationRespond,
        Permission::CollaborationRemove,
        Permission::CreatorProfileUpdate,
        Permission::CreatorManage,
        Permission::AuditView,
        Permission::RoleManage,
        Permission::SettingsManage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ProjectView => "project.view",
            Permission::ProjectCreate => "project.create",
            Permission::ProjectUpdate => "project.update",
            Permission::ProjectDelete => "project.delete",
            Permission::RatingCreate => "rating.create",
            Permission::ContactCreate => "contact.create",
            Permission::ContactView => "contact.view",
            Permission::CollaborationInvite => "collaboration.invite",
            Permission::CollaborationRespond => "collaboration.respond",
            Permission::CollaborationRemove => "collaboration.remove",
            Permission::CreatorProfileUpdate => "creator.profile.update",
            Permission::CreatorManage => "creator.manage",
            Permission::AuditView => "audit.view",
            Permission::RoleManage => "role.manage",
            Permission::SettingsManage => "settings.manage",
        }
    }

    /// Leading segment of the tag (`"project"` for `project.create`).
    pub fn category(&self) -> &'static str {
        let tag = self.as_str();
        tag.split('.').next().unwrap_or(tag)
    }

    pub fn description(&self) -> String {
        // "module.action" or "module.resource.action"
        let parts: Vec<&str> = self.as_str().split('.').collect();
        let action = parts[parts.len() - 1];
        let resource = parts[..parts.len() - 1].join(" ");

        let action_desc = match action {
            "view" => "View",
            "create" => "Create",
            "update" => "Update",
            "delete" => "Delete",
            "manage" => "Manage",
            "invite" => "Send invitations for",
            "respond" => "Respond to invitations for",
            "remove" => "Remove members from",
            other => other,
        };

        format!("{action_desc} {resource}")
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}

impl Serialize for Permission {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Boundary check for untrusted permission strings.
pub fn is_valid_permission(candidate: &str) -> bool {
    candidate.parse::<Permission>().is_ok()
}
