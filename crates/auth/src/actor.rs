use serde::{Deserialize, Serialize};

use showcase_core::UserId;

use crate::{AuthzError, Role};

/// What kind of originator a request has.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Visitor,
    Creator,
    Admin,
    System,
}

impl ActorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorKind::Visitor => "visitor",
            ActorKind::Creator => "creator",
            ActorKind::Admin => "admin",
            ActorKind::System => "system",
        }
    }

    /// Whether `role` is a legal role for this kind of actor.
    pub fn admits(&self, role: Role) -> bool {
        matches!(
            (self, role),
            (ActorKind::Visitor, Role::Visitor)
                | (ActorKind::Creator, Role::Creator)
                | (ActorKind::Admin, Role::Admin)
                | (ActorKind::Admin, Role::SuperAdmin)
                | (ActorKind::System, Role::SuperAdmin)
        )
    }
}

impl core::fmt::Display for ActorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for ActorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visitor" => Ok(ActorKind::Visitor),
            "creator" => Ok(ActorKind::Creator),
            "admin" => Ok(ActorKind::Admin),
            "system" => Ok(ActorKind::System),
            other => Err(format!("unknown actor kind '{other}'")),
        }
    }
}

/// A resolved request originator.
///
/// Construction is decoupled from transport: the API derives actors from
/// verified credential claims, tests build them directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    id: Option<UserId>,
    kind: ActorKind,
    role: Role,
    email: Option<String>,
}

impl Actor {
    /// Anonymous visitor (no id, no credential).
    pub fn visitor() -> Self {
        Self {
            id: None,
            kind: ActorKind::Visitor,
            role: Role::Visitor,
            email: None,
        }
    }

    pub fn creator(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            kind: ActorKind::Creator,
            role: Role::Creator,
            email: Some(email.into()),
        }
    }

    pub fn admin(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            kind: ActorKind::Admin,
            role: Role::Admin,
            email: Some(email.into()),
        }
    }

    pub fn super_admin(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            kind: ActorKind::Admin,
            role: Role::SuperAdmin,
            email: Some(email.into()),
        }
    }

    /// Internal principal for scheduled or maintenance work.
    pub fn system(id: UserId) -> Self {
        Self {
            id: Some(id),
            kind: ActorKind::System,
            role: Role::SuperAdmin,
            email: None,
        }
    }

    pub(crate) fn from_parts(
        id: Option<UserId>,
        kind: ActorKind,
        role: Role,
        email: Option<String>,
    ) -> Self {
        Self { id, kind, role, email }
    }

    pub fn id(&self) -> Option<UserId> {
        self.id
    }

    pub fn kind(&self) -> ActorKind {
        self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn is_visitor(&self) -> bool {
        self.kind == ActorKind::Visitor
    }

    /// The account id, or `Unauthenticated` for visitors.
    pub fn require_id(&self) -> Result<UserId, AuthzError> {
        self.id.ok_or(AuthzError::Unauthenticated)
    }

    /// Stable key identifying this actor for rate limiting and idempotency
    /// scoping. `None` for visitors, who are keyed by network identity instead.
    pub fn scope_key(&self) -> Option<String> {
        self.id.map(|id| format!("{}:{}", self.kind.as_str(), id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visitor_has_no_identity() {
        let v = Actor::visitor();
        assert_eq!(v.id(), None);
        assert_eq!(v.role(), Role::Visitor);
        assert_eq!(v.require_id(), Err(AuthzError::Unauthenticated));
        assert_eq!(v.scope_key(), None);
    }

    #[test]
    fn kind_role_compatibility() {
        assert!(ActorKind::Admin.admits(Role::SuperAdmin));
        assert!(ActorKind::Creator.admits(Role::Creator));
        assert!(!ActorKind::Creator.admits(Role::Admin));
        assert!(!ActorKind::Visitor.admits(Role::Creator));
        assert!(!ActorKind::System.admits(Role::Visitor));
    }

    #[test]
    fn scope_key_includes_kind() {
        let id = UserId::new();
        let actor = Actor::creator(id, "a@example.com");
        assert_eq!(actor.scope_key().unwrap(), format!("creator:{id}"));
    }
}
