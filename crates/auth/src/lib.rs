//! `showcase-auth`: pure authentication/authorization boundary.
//!
//! Roles, permissions and the static role/permission table live here, along
//! with actor resolution from signed credentials. No HTTP, no storage.

pub mod actor;
pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod policy;
pub mod roles;

pub use actor::{Actor, ActorKind};
pub use authorize::{
    authorize, authorize_with, explain_authorization, AuthorizationExplanation, AuthzError,
    RbacRegistry,
};
pub use claims::{
    validate_claims, CredentialClaims, Hs256JwtValidator, JwtValidator, TokenValidationError,
};
pub use permissions::{is_valid_permission, Permission, UnknownPermission};
pub use policy::{
    has_all_permissions, has_any_permission, has_permission, has_permission_str,
    RolePermissionSet,
};
pub use roles::{is_valid_role, Role, UnknownRole};
