use serde::Serialize;
use thiserror::Error;

use showcase_core::UserId;

use crate::{Actor, ActorKind, Permission, Role, RolePermissionSet};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The operation needs an identified account and the actor is anonymous.
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(Permission),
}

/// Authorize an actor against the process-wide role table.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(actor: &Actor, required: Permission) -> Result<(), AuthzError> {
    authorize_with(RolePermissionSet::global(), actor, required)
}

/// Authorize against an explicit table.
pub fn authorize_with(
    table: &RolePermissionSet,
    actor: &Actor,
    required: Permission,
) -> Result<(), AuthzError> {
    if table.has_permission(actor.role(), required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// Answers "why was this request allowed/denied?" for admin tooling.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: Permission,
    pub granted: bool,
    pub reason: String,
    pub actor: ActorState,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActorState {
    pub actor_id: Option<UserId>,
    pub kind: ActorKind,
    pub role: Role,
    pub effective_permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub message: String,
    /// Roles whose grants include the missing permission.
    pub granting_roles: Vec<Role>,
    pub suggestions: Vec<String>,
}

pub fn explain_authorization(
    table: &RolePermissionSet,
    actor: &Actor,
    required: Permission,
) -> AuthorizationExplanation {
    let role = actor.role();
    let state = ActorState {
        actor_id: actor.id(),
        kind: actor.kind(),
        role,
        effective_permissions: table.permissions_for(role).collect(),
    };

    if table.has_permission(role, required) {
        return AuthorizationExplanation {
            required_permission: required,
            granted: true,
            reason: format!("role '{role}' grants '{required}'"),
            actor: state,
            denial_reason: None,
        };
    }

    let granting_roles = table.roles_granting(required);
    let mut suggestions = Vec::new();
    if actor.is_visitor() && granting_roles.contains(&Role::Creator) {
        suggestions.push("Sign in with a creator account".to_string());
    }
    if !granting_roles.is_empty() {
        let names: Vec<&str> = granting_roles.iter().map(|r| r.as_str()).collect();
        suggestions.push(format!("Use an account with one of the roles: {}", names.join(", ")));
    }

    AuthorizationExplanation {
        required_permission: required,
        granted: false,
        reason: format!("role '{role}' does not grant '{required}'"),
        actor: state,
        denial_reason: Some(DenialReason {
            message: format!("Missing required permission: '{required}'"),
            granting_roles,
            suggestions,
        }),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry (audit/display)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub name: Role,
    pub display_name: &'static str,
    pub description: &'static str,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub name: Permission,
    pub category: &'static str,
    pub description: String,
    pub granted_to: Vec<Role>,
}

/// Read-only catalog of every role and permission.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: Vec<RoleDefinition>,
    pub permissions: Vec<PermissionDefinition>,
}

impl RbacRegistry {
    pub fn from_table(table: &RolePermissionSet) -> Self {
        let roles = Role::ALL
            .into_iter()
            .map(|role| RoleDefinition {
                name: role,
                display_name: role.display_name(),
                description: role.description(),
                permissions: table.permissions_for(role).collect(),
            })
            .collect();

        let permissions = Permission::ALL
            .into_iter()
            .map(|p| PermissionDefinition {
                name: p,
                category: p.category(),
                description: p.description(),
                granted_to: table.roles_granting(p),
            })
            .collect();

        Self { roles, permissions }
    }

    pub fn role(&self, name: &str) -> Option<&RoleDefinition> {
        let role: Role = name.parse().ok()?;
        self.roles.iter().find(|r| r.name == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_may_view_audit_creator_may_not() {
        let admin = Actor::admin(UserId::new(), "ops@example.com");
        let creator = Actor::creator(UserId::new(), "maker@example.com");

        assert_eq!(authorize(&admin, Permission::AuditView), Ok(()));
        assert_eq!(
            authorize(&creator, Permission::AuditView),
            Err(AuthzError::Forbidden(Permission::AuditView))
        );
    }

    #[test]
    fn visitor_may_rate_but_not_create_projects() {
        let visitor = Actor::visitor();
        assert!(authorize(&visitor, Permission::RatingCreate).is_ok());
        assert!(authorize(&visitor, Permission::ProjectCreate).is_err());
    }

    #[test]
    fn system_actor_holds_everything() {
        let system = Actor::system(UserId::new());
        for p in Permission::ALL {
            assert!(authorize(&system, p).is_ok());
        }
    }

    #[test]
    fn explanation_for_denied_visitor_suggests_signing_in() {
        let table = RolePermissionSet::build();
        let explanation =
            explain_authorization(&table, &Actor::visitor(), Permission::ProjectCreate);

        assert!(!explanation.granted);
        let denial = explanation.denial_reason.unwrap();
        assert_eq!(denial.granting_roles, vec![Role::Creator, Role::SuperAdmin]);
        assert!(denial.suggestions[0].contains("creator"));
        assert_eq!(explanation.actor.effective_permissions.len(), 3);
    }

    #[test]
    fn explanation_for_granted_request() {
        let table = RolePermissionSet::build();
        let admin = Actor::admin(UserId::new(), "ops@example.com");
        let explanation = explain_authorization(&table, &admin, Permission::AuditView);
        assert!(explanation.granted);
        assert!(explanation.denial_reason.is_none());
        assert!(explanation.reason.contains("admin"));
    }

    #[test]
    fn registry_covers_every_role_and_permission() {
        let registry = RbacRegistry::from_table(&RolePermissionSet::build());
        assert_eq!(registry.roles.len(), Role::ALL.len());
        assert_eq!(registry.permissions.len(), Permission::ALL.len());
        assert_eq!(registry.role("super_admin").unwrap().display_name, "Super Administrator");
        assert!(registry.role("owner").is_none());
    }
}
