//! Per-field visible/editable/required flags, scoped by module and role.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult};

use crate::{Module, RoleId};

/// Effective access to one field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldAccess {
    pub visible: bool,
    pub editable: bool,
    pub required: bool,
}

impl FieldAccess {
    /// Access granted when no entry exists for a field.
    pub const DEFAULT: FieldAccess = FieldAccess {
        visible: true,
        editable: true,
        required: false,
    };

    pub const HIDDEN: FieldAccess = FieldAccess {
        visible: false,
        editable: false,
        required: false,
    };

    /// Enforce `required ⇒ editable ⇒ visible`.
    pub fn normalized(self) -> Self {
        let visible = self.visible;
        let editable = visible && self.editable;
        let required = editable && self.required;
        Self {
            visible,
            editable,
            required,
        }
    }
}

impl Default for FieldAccess {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One stored field-security entry, exactly as authored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSecurityEntry {
    pub module: Module,
    pub role: RoleId,
    pub field: String,
    pub visible: bool,
    pub editable: bool,
    pub required: bool,
}

impl FieldSecurityEntry {
    pub fn access(&self) -> FieldAccess {
        FieldAccess {
            visible: self.visible,
            editable: self.editable,
            required: self.required,
        }
    }
}

type FieldTable = BTreeMap<String, FieldAccess>;

/// Field security policy.
///
/// Entries are stored as authored; normalization is applied on every read so
/// an inconsistent entry can never be observed by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSecurityPolicy {
    entries: HashMap<(Module, RoleId), FieldTable>,
}

impl FieldSecurityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(
        entries: impl IntoIterator<Item = FieldSecurityEntry>,
    ) -> DomainResult<Self> {
        let mut map: HashMap<(Module, RoleId), FieldTable> = HashMap::new();
        for entry in entries {
            if entry.field.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "field security entry for ({}, {}) has an empty field name",
                    entry.module, entry.role
                )));
            }
            let access = entry.access();
            let table = map.entry((entry.module.clone(), entry.role.clone())).or_default();
            if table.insert(entry.field.clone(), access).is_some() {
                return Err(DomainError::conflict(format!(
                    "duplicate field security entry for ({}, {}, {})",
                    entry.module, entry.role, entry.field
                )));
            }
        }
        Ok(Self { entries: map })
    }

    pub fn get_field_security(&self, module: &Module, role: &RoleId, field: &str) -> FieldAccess {
        self.entries
            .get(&(module.clone(), role.clone()))
            .and_then(|table| table.get(field))
            .copied()
            .unwrap_or(FieldAccess::DEFAULT)
            .normalized()
    }

    /// Normalized access for every field configured for (module, role).
    ///
    /// Fields without an entry are not listed; callers treat them as
    /// [`FieldAccess::DEFAULT`].
    pub fn field_security(&self, module: &Module, role: &RoleId) -> BTreeMap<String, FieldAccess> {
        self.entries
            .get(&(module.clone(), role.clone()))
            .map(|table| {
                table
                    .iter()
                    .map(|(field, access)| (field.clone(), access.normalized()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Export every stored entry as authored, sorted by (module, role, field).
    pub fn entries(&self) -> Vec<FieldSecurityEntry> {
        let mut out: Vec<FieldSecurityEntry> = self
            .entries
            .iter()
            .flat_map(|((module, role), table)| {
                table.iter().map(move |(field, access)| FieldSecurityEntry {
                    module: module.clone(),
                    role: role.clone(),
                    field: field.clone(),
                    visible: access.visible,
                    editable: access.editable,
                    required: access.required,
                })
            })
            .collect();
        out.sort_by(|a, b| (&a.module, &a.role, &a.field).cmp(&(&b.module, &b.role, &b.field)));
        out
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|t| t.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
