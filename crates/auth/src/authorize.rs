//! Authorization facade: one decision per request, composed from every
//! sub-policy so no caller can check one and forget another.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::{
    Action, FieldAccess, Module, PolicySnapshot, Record, Role, RoleAssignmentGuard, RoleId,
    SnapshotCell, User, VisibilityLevel,
};

/// Infrastructure failure while authorizing.
///
/// Denials are never errors; they come back as a [`Decision`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("permissions temporarily unavailable: no policy snapshot loaded")]
    SnapshotUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Allowed,
    ModuleActionDenied,
    FieldHidden,
    FieldReadOnly,
    RecordOutOfScope,
    SnapshotUnavailable,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::Allowed => "allowed",
            DecisionReason::ModuleActionDenied => "module_action_denied",
            DecisionReason::FieldHidden => "field_hidden",
            DecisionReason::FieldReadOnly => "field_read_only",
            DecisionReason::RecordOutOfScope => "record_out_of_scope",
            DecisionReason::SnapshotUnavailable => "snapshot_unavailable",
        }
    }
}

impl core::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`Authorizer::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub allowed: bool,
    pub reason: DecisionReason,
    /// Human-readable account of the decision, for logs and "why?" screens.
    pub message: String,
    /// Normalized access to the requested field, if one was requested.
    pub field_access: Option<FieldAccess>,
    /// Fields the actor may see: the record's visible fields, or the requested
    /// field when no record was supplied. Empty on denial.
    pub visible_fields: Vec<String>,
    pub visibility_level: Option<VisibilityLevel>,
    /// Index of the visibility rule that set `visibility_level`.
    pub matched_visibility_rule: Option<usize>,
    pub revision: u64,
    /// Evaluated against a snapshot older than the freshness window.
    pub stale: bool,
}

impl Decision {
    fn deny(reason: DecisionReason, message: String) -> Self {
        Self {
            allowed: false,
            reason,
            message,
            field_access: None,
            visible_fields: Vec::new(),
            visibility_level: None,
            matched_visibility_rule: None,
            revision: 0,
            stale: false,
        }
    }

    /// The fail-closed decision used when no snapshot is loaded.
    pub fn unavailable() -> Self {
        Self::deny(
            DecisionReason::SnapshotUnavailable,
            AuthzError::SnapshotUnavailable.to_string(),
        )
    }
}

/// The single entry point the application calls for authorization.
///
/// Cheap to clone; every clone reads the same [`SnapshotCell`].
#[derive(Debug, Clone)]
pub struct Authorizer {
    cell: Arc<SnapshotCell>,
    primary_role_edit_level: i32,
    /// Revision last reported as stale, shared by all clones.
    stale_warned: Arc<AtomicU64>,
}

const NOT_WARNED: u64 = u64::MAX;

impl Authorizer {
    pub fn new(cell: Arc<SnapshotCell>) -> Self {
        Self {
            cell,
            primary_role_edit_level: 1,
            stale_warned: Arc::new(AtomicU64::new(NOT_WARNED)),
        }
    }

    /// Least privileged level that may still edit another user's primary role.
    pub fn with_primary_role_edit_level(mut self, level: i32) -> Self {
        self.primary_role_edit_level = level;
        self
    }

    pub fn cell(&self) -> &Arc<SnapshotCell> {
        &self.cell
    }

    /// Current snapshot, warning once per revision when it is past its
    /// freshness window.
    pub fn snapshot(&self) -> Result<Arc<PolicySnapshot>, AuthzError> {
        self.current().map(|(snapshot, _)| snapshot)
    }

    fn current(&self) -> Result<(Arc<PolicySnapshot>, bool), AuthzError> {
        let snapshot = self.cell.load().ok_or(AuthzError::SnapshotUnavailable)?;
        let stale = self.cell.is_stale(&snapshot, Utc::now());
        if stale && self.first_stale_sighting(snapshot.revision) {
            tracing::warn!(
                revision = snapshot.revision,
                loaded_at = %snapshot.loaded_at,
                "evaluating against a stale policy snapshot"
            );
        }
        Ok((snapshot, stale))
    }

    fn first_stale_sighting(&self, revision: u64) -> bool {
        self.stale_warned.swap(revision, Ordering::Relaxed) != revision
    }

    /// Decide whether `actor` may perform `action` in `module`, optionally
    /// on one `field` and/or one `record`.
    ///
    /// Checks run in order: module action, then field security, then record
    /// scope. The first failing check determines the reason.
    pub fn evaluate(
        &self,
        actor: &User,
        module: &Module,
        action: &Action,
        field: Option<&str>,
        record: Option<&Record>,
    ) -> Result<Decision, AuthzError> {
        let (snapshot, stale) = self.current()?;
        let role = &actor.role;

        if !snapshot.permissions.has_permission(role, module, action) {
            tracing::debug!(%role, %module, %action, "module action denied");
            return Ok(Decision {
                revision: snapshot.revision,
                stale,
                ..Decision::deny(
                    DecisionReason::ModuleActionDenied,
                    format!("role '{role}' may not {action} in '{module}'"),
                )
            });
        }

        let field_access =
            field.map(|f| snapshot.field_security.get_field_security(module, role, f));
        let resolution = record.map(|r| snapshot.visibility.resolve(module, r));

        let mut reason = DecisionReason::Allowed;
        let mut message = format!("role '{role}' may {action} in '{module}'");

        if let (Some(f), Some(access)) = (field, field_access) {
            if action.reads_fields() && !access.visible {
                reason = DecisionReason::FieldHidden;
                message = format!("field '{f}' of '{module}' is hidden from role '{role}'");
            } else if action.writes_fields() && !access.editable {
                reason = DecisionReason::FieldReadOnly;
                message = format!("field '{f}' of '{module}' is read-only for role '{role}'");
            }
        }

        if let (DecisionReason::Allowed, Some(record), Some(res)) = (reason, record, resolution) {
            if !snapshot
                .membership
                .is_visible_to(res.level, &record.owner, Some(actor))
            {
                reason = DecisionReason::RecordOutOfScope;
                message = format!(
                    "record is visible at '{}' scope, which does not include user {}",
                    res.level, actor.id
                );
            }
        }

        let allowed = reason == DecisionReason::Allowed;
        let visible_fields = if !allowed {
            Vec::new()
        } else if let Some(record) = record {
            record
                .fields
                .keys()
                .filter(|name| {
                    snapshot
                        .field_security
                        .get_field_security(module, role, name)
                        .visible
                })
                .cloned()
                .collect()
        } else {
            match (field, field_access) {
                (Some(f), Some(access)) if access.visible => vec![f.to_string()],
                _ => Vec::new(),
            }
        };

        if !allowed {
            tracing::debug!(%role, %module, %action, reason = %reason, "request denied");
        }

        Ok(Decision {
            allowed,
            reason,
            message,
            field_access,
            visible_fields,
            visibility_level: resolution.map(|r| r.level),
            matched_visibility_rule: resolution.and_then(|r| r.matched_rule),
            revision: snapshot.revision,
            stale,
        })
    }

    /// Like [`Authorizer::evaluate`], but fails closed instead of erroring.
    pub fn evaluate_or_deny(
        &self,
        actor: &User,
        module: &Module,
        action: &Action,
        field: Option<&str>,
        record: Option<&Record>,
    ) -> Decision {
        self.evaluate(actor, module, action, field, record)
            .unwrap_or_else(|_| Decision::unavailable())
    }

    pub fn has_permission(
        &self,
        role: &RoleId,
        module: &Module,
        action: &Action,
    ) -> Result<bool, AuthzError> {
        Ok(self.snapshot()?.permissions.has_permission(role, module, action))
    }

    pub fn has_any_permission(&self, role: &RoleId, module: &Module) -> Result<bool, AuthzError> {
        Ok(self.snapshot()?.permissions.has_any_permission(role, module))
    }

    /// Modules the role can do anything in; drives navigation menus.
    pub fn modules_for(&self, role: &RoleId) -> Result<Vec<Module>, AuthzError> {
        Ok(self.snapshot()?.permissions.modules_for(role))
    }

    /// Roles the actor may assign, most privileged first.
    pub fn assignable_roles(&self, actor_role: &RoleId) -> Result<Vec<Role>, AuthzError> {
        let snapshot = self.snapshot()?;
        let guard = RoleAssignmentGuard::new(&snapshot.catalog, self.primary_role_edit_level);
        Ok(guard.assignable_roles(actor_role))
    }

    pub fn can_assign_role(
        &self,
        actor_role: &RoleId,
        target: &RoleId,
    ) -> Result<bool, AuthzError> {
        let snapshot = self.snapshot()?;
        let guard = RoleAssignmentGuard::new(&snapshot.catalog, self.primary_role_edit_level);
        Ok(guard.can_assign_role(actor_role, target))
    }

    pub fn can_edit_primary_role(&self, actor_role: &RoleId) -> Result<bool, AuthzError> {
        let snapshot = self.snapshot()?;
        let guard = RoleAssignmentGuard::new(&snapshot.catalog, self.primary_role_edit_level);
        Ok(guard.can_edit_primary_role(actor_role))
    }

    /// Normalized field table for rendering forms.
    pub fn field_security(
        &self,
        module: &Module,
        role: &RoleId,
    ) -> Result<BTreeMap<String, FieldAccess>, AuthzError> {
        Ok(self.snapshot()?.field_security.field_security(module, role))
    }

    pub fn resolve_visibility(
        &self,
        module: &Module,
        record: &Record,
    ) -> Result<VisibilityLevel, AuthzError> {
        Ok(self.snapshot()?.visibility.resolve_visibility(module, record))
    }
}
