//! Role assignment guard: who may hand out which role.

use crate::{Role, RoleCatalog, RoleId};

/// Decides role assignment using catalog hierarchy levels.
///
/// Roles missing from the catalog never compare: any check involving one is a
/// denial.
#[derive(Debug, Clone, Copy)]
pub struct RoleAssignmentGuard<'a> {
    catalog: &'a RoleCatalog,
    primary_role_edit_level: i32,
}

impl<'a> RoleAssignmentGuard<'a> {
    /// `primary_role_edit_level` is the least privileged level still allowed
    /// to change another user's primary role.
    pub fn new(catalog: &'a RoleCatalog, primary_role_edit_level: i32) -> Self {
        Self {
            catalog,
            primary_role_edit_level,
        }
    }

    /// An actor may assign only roles strictly below their own authority.
    pub fn can_assign_role(&self, actor: &RoleId, target: &RoleId) -> bool {
        match (self.catalog.level(actor), self.catalog.level(target)) {
            (Some(actor_level), Some(target_level)) => actor_level < target_level,
            _ => false,
        }
    }

    /// Catalog roles the actor may assign, most privileged first.
    pub fn assignable_roles(&self, actor: &RoleId) -> Vec<Role> {
        self.catalog
            .by_level()
            .into_iter()
            .filter(|role| self.can_assign_role(actor, &role.id))
            .cloned()
            .collect()
    }

    pub fn can_edit_primary_role(&self, actor: &RoleId) -> bool {
        self.catalog
            .level(actor)
            .is_some_and(|level| level <= self.primary_role_edit_level)
    }
}
