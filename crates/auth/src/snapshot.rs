//! Immutable policy snapshots and their serialized form.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warden_core::{DepartmentId, DomainResult, TeamId};

use crate::{
    FieldSecurityEntry, FieldSecurityPolicy, Membership, ModuleVisibility, PermissionMatrix,
    PermissionRule, Role, RoleCatalog, RoleId, VisibilityResolver,
};

/// All rule data the evaluators read, frozen at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySnapshot {
    pub revision: u64,
    pub loaded_at: DateTime<Utc>,
    pub catalog: RoleCatalog,
    pub permissions: PermissionMatrix,
    pub field_security: FieldSecurityPolicy,
    pub visibility: VisibilityResolver,
    pub membership: Membership,
}

/// Serialized snapshot, used for export/import and fixtures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub revision: u64,
    pub loaded_at: DateTime<Utc>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub permissions: Vec<PermissionRule>,
    #[serde(default)]
    pub field_security: Vec<FieldSecurityEntry>,
    #[serde(default)]
    pub visibility: Vec<ModuleVisibility>,
    #[serde(default)]
    pub team_departments: Vec<TeamDepartment>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamDepartment {
    pub team_id: TeamId,
    pub department_id: DepartmentId,
}

impl PolicySnapshot {
    /// Validate a document and build the evaluator structures from it.
    pub fn from_document(doc: SnapshotDocument) -> DomainResult<Self> {
        let catalog = RoleCatalog::from_roles(doc.roles)?;

        let orphaned: HashSet<&RoleId> = doc
            .permissions
            .iter()
            .map(|r| &r.role)
            .chain(doc.field_security.iter().map(|e| &e.role))
            .filter(|role| !catalog.contains(role))
            .collect();
        for role in orphaned {
            tracing::warn!(role = %role, "rule data references a role missing from the catalog");
        }

        let snapshot = Self {
            revision: doc.revision,
            loaded_at: doc.loaded_at,
            permissions: PermissionMatrix::from_rules(doc.permissions)?,
            field_security: FieldSecurityPolicy::from_entries(doc.field_security)?,
            visibility: VisibilityResolver::from_settings(doc.visibility)?,
            membership: Membership::from_pairs(
                doc.team_departments
                    .into_iter()
                    .map(|td| (td.team_id, td.department_id)),
            ),
            catalog,
        };
        Ok(snapshot)
    }

    pub fn to_document(&self) -> SnapshotDocument {
        SnapshotDocument {
            revision: self.revision,
            loaded_at: self.loaded_at,
            roles: self.catalog.by_level().into_iter().cloned().collect(),
            permissions: self.permissions.rules(),
            field_security: self.field_security.entries(),
            visibility: self.visibility.settings(),
            team_departments: self
                .membership
                .pairs()
                .into_iter()
                .map(|(team_id, department_id)| TeamDepartment {
                    team_id,
                    department_id,
                })
                .collect(),
        }
    }
}

/// Atomically swappable pointer to the current snapshot.
///
/// Readers take an `Arc` and keep evaluating against it even if a refresh
/// replaces the cell's contents in the meantime.
#[derive(Debug, Default)]
pub struct SnapshotCell {
    current: ArcSwapOption<PolicySnapshot>,
    stale_after: Option<Duration>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    pub fn with_snapshot(self, snapshot: PolicySnapshot) -> Self {
        self.current.store(Some(Arc::new(snapshot)));
        self
    }

    pub fn load(&self) -> Option<Arc<PolicySnapshot>> {
        self.current.load_full()
    }

    /// Install a new snapshot, returning the one it replaced.
    pub fn replace(&self, snapshot: PolicySnapshot) -> Option<Arc<PolicySnapshot>> {
        self.current.swap(Some(Arc::new(snapshot)))
    }

    pub fn is_stale(&self, snapshot: &PolicySnapshot, now: DateTime<Utc>) -> bool {
        let Some(window) = self.stale_after else {
            return false;
        };
        (now - snapshot.loaded_at)
            .to_std()
            .is_ok_and(|age| age > window)
    }
}
