//! Static role → permission table.
//!
//! The table is built once and never mutated; there are no dynamic grants.
//! Shared references to it need no synchronization.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use crate::{Permission, Role};

const VISITOR: &[Permission] = &[
    Permission::ProjectView,
    Permission::RatingCreate,
    Permission::ContactCreate,
];

const CREATOR_EXTRA: &[Permission] = &[
    Permission::ProjectCreate,
    Permission::ProjectUpdate,
    Permission::ProjectDelete,
    Permission::CollaborationInvite,
    Permission::CollaborationRespond,
    Permission::CollaborationRemove,
    Permission::CreatorProfileUpdate,
];

const ADMIN: &[Permission] = &[
    Permission::ProjectView,
    Permission::ProjectDelete,
    Permission::RatingCreate,
    Permission::ContactCreate,
    Permission::ContactView,
    Permission::CreatorManage,
    Permission::AuditView,
];

/// Immutable mapping from every [`Role`] to its granted permissions.
///
/// # Invariants
/// - `super_admin` holds the full permission universe.
/// - Every permission granted to `visitor` is also granted to `creator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolePermissionSet {
    grants: HashMap<Role, BTreeSet<Permission>>,
}

impl RolePermissionSet {
    /// Build the table from the static grant lists.
    pub fn build() -> Self {
        let visitor: BTreeSet<Permission> = VISITOR.iter().copied().collect();
        let creator: BTreeSet<Permission> = visitor
            .iter()
            .copied()
            .chain(CREATOR_EXTRA.iter().copied())
            .collect();
        let admin: BTreeSet<Permission> = ADMIN.iter().copied().collect();
        let super_admin: BTreeSet<Permission> = Permission::ALL.into_iter().collect();

        let grants = HashMap::from([
            (Role::Visitor, visitor),
            (Role::Creator, creator),
            (Role::Admin, admin),
            (Role::SuperAdmin, super_admin),
        ]);

        Self { grants }
    }

    /// Process-wide table, built on first use.
    pub fn global() -> &'static RolePermissionSet {
        static TABLE: OnceLock<RolePermissionSet> = OnceLock::new();
        TABLE.get_or_init(RolePermissionSet::build)
    }

    pub fn permissions_for(&self, role: Role) -> impl Iterator<Item = Permission> + '_ {
        self.grants.get(&role).into_iter().flat_map(|set| set.iter().copied())
    }

    pub fn has_permission(&self, role: Role, permission: Permission) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|set| set.contains(&permission))
    }

    /// AND across `permissions`. An empty list is vacuously granted.
    pub fn has_all_permissions(&self, role: Role, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(role, *p))
    }

    /// OR across `permissions`. An empty list grants nothing.
    pub fn has_any_permission(&self, role: Role, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has_permission(role, *p))
    }

    /// Roles (in declaration order) that are granted `permission`.
    pub fn roles_granting(&self, permission: Permission) -> Vec<Role> {
        Role::ALL
            .into_iter()
            .filter(|r| self.has_permission(*r, permission))
            .collect()
    }
}

impl Default for RolePermissionSet {
    fn default() -> Self {
        Self::build()
    }
}

pub fn has_permission(role: Role, permission: Permission) -> bool {
    RolePermissionSet::global().has_permission(role, permission)
}

pub fn has_all_permissions(role: Role, permissions: &[Permission]) -> bool {
    RolePermissionSet::global().has_all_permissions(role, permissions)
}

pub fn has_any_permission(role: Role, permissions: &[Permission]) -> bool {
    RolePermissionSet::global().has_any_permission(role, permissions)
}

/// String-level lookup for untrusted input: unknown role or permission tags
/// yield `false`.
pub fn has_permission_str(role: &str, permission: &str) -> bool {
    match (role.parse::<Role>(), permission.parse::<Permission>()) {
        (Ok(role), Ok(permission)) => has_permission(role, permission),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_role() -> impl Strategy<Value = Role> {
        prop::sample::select(Role::ALL.to_vec())
    }

    fn any_permission() -> impl Strategy<Value = Permission> {
        prop::sample::select(Permission::ALL.to_vec())
    }

    #[test]
    fn super_admin_holds_the_universe() {
        let table = RolePermissionSet::build();
        for p in Permission::ALL {
            assert!(table.has_permission(Role::SuperAdmin, p), "missing {p}");
        }
        assert_eq!(table.permissions_for(Role::SuperAdmin).count(), Permission::ALL.len());
    }

    #[test]
    fn visitor_grants_are_a_subset_of_creator_grants() {
        let table = RolePermissionSet::build();
        for p in table.permissions_for(Role::Visitor) {
            assert!(table.has_permission(Role::Creator, p), "creator lacks {p}");
        }
    }

    #[test]
    fn documented_end_to_end_grants() {
        assert!(has_permission(Role::Admin, Permission::AuditView));
        assert!(!has_permission(Role::Creator, Permission::AuditView));
        assert!(!has_permission(Role::Visitor, Permission::ProjectCreate));
        assert!(has_permission(Role::Visitor, Permission::RatingCreate));
    }

    #[test]
    fn all_and_any_semantics() {
        let perms = [Permission::ProjectView, Permission::AuditView];
        assert!(!has_all_permissions(Role::Creator, &perms));
        assert!(has_any_permission(Role::Creator, &perms));
        assert!(has_all_permissions(Role::Admin, &perms));
        assert!(has_all_permissions(Role::Visitor, &[]));
        assert!(!has_any_permission(Role::SuperAdmin, &[]));
    }

    #[test]
    fn string_lookup_never_panics_on_garbage() {
        assert!(has_permission_str("admin", "audit.view"));
        assert!(!has_permission_str("admin", "audit.delete"));
        assert!(!has_permission_str("root", "audit.view"));
        assert!(!has_permission_str("", ""));
    }

    #[test]
    fn global_table_is_shared() {
        let a = RolePermissionSet::global() as *const _;
        let b = RolePermissionSet::global() as *const _;
        assert_eq!(a, b);
        assert_eq!(RolePermissionSet::global(), &RolePermissionSet::build());
    }

    #[test]
    fn roles_granting_lists_in_declaration_order() {
        let table = RolePermissionSet::build();
        assert_eq!(
            table.roles_granting(Permission::AuditView),
            vec![Role::Admin, Role::SuperAdmin]
        );
        assert_eq!(table.roles_granting(Permission::RoleManage), vec![Role::SuperAdmin]);
    }

    proptest! {
        #[test]
        fn lookup_is_deterministic(role in any_role(), perm in any_permission()) {
            let fresh = RolePermissionSet::build();
            prop_assert_eq!(fresh.has_permission(role, perm), has_permission(role, perm));
            prop_assert_eq!(has_permission(role, perm), has_permission(role, perm));
        }

        #[test]
        fn visitor_grant_implies_creator_grant(perm in any_permission()) {
            if has_permission(Role::Visitor, perm) {
                prop_assert!(has_permission(Role::Creator, perm));
            }
        }

        #[test]
        fn all_implies_any_for_non_empty_sets(
            role in any_role(),
            perms in prop::collection::vec(any_permission(), 1..6),
        ) {
            if has_all_permissions(role, &perms) {
                prop_assert!(has_any_permission(role, &perms));
            }
        }
    }
}
