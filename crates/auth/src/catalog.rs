//! Role catalog: the single authoritative ordering of roles.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult};

use crate::{Role, RoleId, RoleTag};

/// Immutable set of roles keyed by id.
///
/// Every ordering decision in the engine goes through [`RoleCatalog::level`].
/// A role missing from the catalog has no level and therefore never compares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleCatalog {
    roles: BTreeMap<RoleId, Role>,
}

impl RoleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog, rejecting empty or duplicate role ids.
    pub fn from_roles(roles: impl IntoIterator<Item = Role>) -> DomainResult<Self> {
        let mut map = BTreeMap::new();
        for role in roles {
            if role.id.as_str().trim().is_empty() {
                return Err(DomainError::validation("role id must not be empty"));
            }
            let id = role.id.clone();
            if map.insert(id.clone(), role).is_some() {
                return Err(DomainError::conflict(format!("duplicate role id '{id}'")));
            }
        }
        Ok(Self { roles: map })
    }

    pub fn get(&self, id: &RoleId) -> Option<&Role> {
        self.roles.get(id)
    }

    pub fn contains(&self, id: &RoleId) -> bool {
        self.roles.contains_key(id)
    }

    /// Hierarchy level of a role, `None` when the role is unknown.
    pub fn level(&self, id: &RoleId) -> Option<i32> {
        self.roles.get(id).map(|r| r.hierarchy_level)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// All roles, most privileged first; ties broken by id.
    pub fn by_level(&self) -> Vec<&Role> {
        let mut roles: Vec<&Role> = self.roles.values().collect();
        roles.sort_by(|a, b| {
            a.hierarchy_level
                .cmp(&b.hierarchy_level)
                .then_with(|| a.id.cmp(&b.id))
        });
        roles
    }

    pub fn iter(&self) -> impl Iterator<Item = &Role> {
        self.roles.values()
    }

    pub fn roles_tagged(&self, tag: RoleTag) -> Vec<&Role> {
        self.by_level().into_iter().filter(|r| r.has_tag(tag)).collect()
    }
}
