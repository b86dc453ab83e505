use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Role identifier used for RBAC.
///
/// Roles form a closed set. Strings coming from tokens, query strings or the
/// database are parsed once at the boundary (see [`is_valid_role`]); everything
/// past that point works with the enum.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Visitor,
    Creator,
    Admin,
    SuperAdmin,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 4] = [Role::Visitor, Role::Creator, Role::Admin, Role::SuperAdmin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Visitor => "visitor",
            Role::Creator => "creator",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Human-facing label for admin screens.
    pub fn display_name(&self) -> &'static str {
        match self {
            Role::Visitor => "Visitor",
            Role::Creator => "Creator",
            Role::Admin => "Administrator",
            Role::SuperAdmin => "Super Administrator",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Visitor => "Anonymous visitor who can browse, rate and send contact messages",
            Role::Creator => "Registered creator who owns projects and collaborates on others",
            Role::Admin => "Moderator with creator management and audit access",
            Role::SuperAdmin => "Full system administrator with every permission",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Boundary check for untrusted role strings.
pub fn is_valid_role(candidate: &str) -> bool {
    candidate.parse::<Role>().is_ok()
}
