//! Data-driven (role, module, action) permission matrix.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use warden_core::{DomainError, DomainResult};

use crate::{Action, Module, RoleId};

/// One stored permission rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub role: RoleId,
    pub module: Module,
    pub action: Action,
    pub allowed: bool,
}

impl PermissionRule {
    pub fn allow(role: impl Into<RoleId>, module: impl Into<Module>, action: Action) -> Self {
        Self {
            role: role.into(),
            module: module.into(),
            action,
            allowed: true,
        }
    }

    pub fn deny(role: impl Into<RoleId>, module: impl Into<Module>, action: Action) -> Self {
        Self {
            allowed: false,
            ..Self::allow(role, module, action)
        }
    }
}

/// Permission matrix.
///
/// Lookups never fail: an absent role, module or action is a denial. Explicit
/// `allowed: false` rules are kept so an export reproduces the input exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionMatrix {
    rules: HashMap<RoleId, HashMap<Module, BTreeMap<Action, bool>>>,
}

impl PermissionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the matrix. More than one rule for the same triple is rejected.
    pub fn from_rules(rules: impl IntoIterator<Item = PermissionRule>) -> DomainResult<Self> {
        let mut matrix: HashMap<RoleId, HashMap<Module, BTreeMap<Action, bool>>> = HashMap::new();
        for rule in rules {
            let actions = matrix
                .entry(rule.role.clone())
                .or_default()
                .entry(rule.module.clone())
                .or_default();
            if actions.insert(rule.action.clone(), rule.allowed).is_some() {
                return Err(DomainError::conflict(format!(
                    "duplicate permission rule for ({}, {}, {})",
                    rule.role, rule.module, rule.action
                )));
            }
        }
        Ok(Self { rules: matrix })
    }

    pub fn has_permission(&self, role: &RoleId, module: &Module, action: &Action) -> bool {
        self.rules
            .get(role)
            .and_then(|modules| modules.get(module))
            .and_then(|actions| actions.get(action))
            .copied()
            .unwrap_or(false)
    }

    pub fn has_any_permission(&self, role: &RoleId, module: &Module) -> bool {
        self.rules
            .get(role)
            .and_then(|modules| modules.get(module))
            .is_some_and(|actions| actions.values().any(|allowed| *allowed))
    }

    /// Allowed actions for a role within a module, in a stable order.
    pub fn allowed_actions(&self, role: &RoleId, module: &Module) -> Vec<Action> {
        self.rules
            .get(role)
            .and_then(|modules| modules.get(module))
            .map(|actions| {
                actions
                    .iter()
                    .filter(|(_, allowed)| **allowed)
                    .map(|(action, _)| action.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Modules in which the role has at least one allowed action, sorted.
    pub fn modules_for(&self, role: &RoleId) -> Vec<Module> {
        let mut modules: Vec<Module> = self
            .rules
            .get(role)
            .map(|modules| {
                modules
                    .iter()
                    .filter(|(_, actions)| actions.values().any(|allowed| *allowed))
                    .map(|(module, _)| module.clone())
                    .collect()
            })
            .unwrap_or_default();
        modules.sort();
        modules
    }

    /// Export every stored rule, sorted by (role, module, action).
    pub fn rules(&self) -> Vec<PermissionRule> {
        let mut out: Vec<PermissionRule> = self
            .rules
            .iter()
            .flat_map(|(role, modules)| {
                modules.iter().flat_map(move |(module, actions)| {
                    actions.iter().map(move |(action, allowed)| PermissionRule {
                        role: role.clone(),
                        module: module.clone(),
                        action: action.clone(),
                        allowed: *allowed,
                    })
                })
            })
            .collect();
        out.sort_by(|a, b| {
            (&a.role, &a.module, &a.action).cmp(&(&b.role, &b.module, &b.action))
        });
        out
    }

    pub fn len(&self) -> usize {
        self.rules
            .values()
            .flat_map(|modules| modules.values())
            .map(|actions| actions.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn matrix() -> PermissionMatrix {
        PermissionMatrix::from_rules([
            PermissionRule::allow("sales_rep", "leads", Action::Read),
            PermissionRule::allow("sales_rep", "leads", Action::Create),
            PermissionRule::deny("sales_rep", "leads", Action::Delete),
            PermissionRule::deny("sales_rep", "reports", Action::Read),
            PermissionRule::allow("admin", "settings", Action::Update),
        ])
        .unwrap()
    }

    #[test]
    fn exact_rule_decides() {
        let m = matrix();
        let rep = RoleId::from("sales_rep");
        let leads = Module::from("leads");
        assert!(m.has_permission(&rep, &leads, &Action::Read));
        assert!(!m.has_permission(&rep, &leads, &Action::Delete));
    }

    #[test]
    fn absent_rule_is_denied() {
        let m = matrix();
        assert!(!m.has_permission(&"sales_rep".into(), &"leads".into(), &Action::Export));
        assert!(!m.has_permission(&"ghost".into(), &"leads".into(), &Action::Read));
        assert!(!m.has_permission(&"admin".into(), &"nowhere".into(), &Action::Update));
    }

    #[test]
    fn any_permission_ignores_explicit_denials() {
        let m = matrix();
        assert!(m.has_any_permission(&"sales_rep".into(), &"leads".into()));
        assert!(!m.has_any_permission(&"sales_rep".into(), &"reports".into()));
        assert!(!m.has_any_permission(&"ghost".into(), &"leads".into()));
    }

    #[test]
    fn duplicate_triple_is_a_conflict() {
        let err = PermissionMatrix::from_rules([
            PermissionRule::allow("admin", "leads", Action::Read),
            PermissionRule::deny("admin", "leads", Action::Read),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("(admin, leads, read)"));
    }

    #[test]
    fn introspection_lists_allowed_only() {
        let m = matrix();
        assert_eq!(
            m.allowed_actions(&"sales_rep".into(), &"leads".into()),
            vec![Action::Create, Action::Read]
        );
        assert_eq!(m.modules_for(&"sales_rep".into()), vec![Module::from("leads")]);
        assert!(m.modules_for(&"ghost".into()).is_empty());
    }

    #[test]
    fn export_rebuilds_the_same_matrix() {
        let m = matrix();
        let exported = m.rules();
        assert_eq!(exported.len(), 5);
        assert_eq!(PermissionMatrix::from_rules(exported).unwrap(), m);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: modules and actions that no rule mentions are always denied.
        #[test]
        fn unrecognized_pairs_are_denied(
            role in "[a-z_]{1,12}",
            module in "zz_[a-z]{1,10}",
            action in "[a-z]{1,10}",
        ) {
            let m = matrix();
            let role = RoleId::new(role);
            let module = Module::new(module);
            let action = Action::parse(&action);
            prop_assert!(!m.has_permission(&role, &module, &action));
            prop_assert!(!m.has_any_permission(&role, &module));
        }
    }
}
