//! Record visibility: a per-module default scope with ordered, conditional
//! overrides.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use warden_core::{DomainError, DomainResult};

use crate::{Module, User};

/// Organizational scope at which a record is visible.
///
/// Ordered from most to least restrictive, so `Owner < Public`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityLevel {
    Owner,
    Team,
    Department,
    Organization,
    Public,
}

impl VisibilityLevel {
    /// Scope used for modules that have no visibility configuration.
    pub const UNCONFIGURED: VisibilityLevel = VisibilityLevel::Owner;

    pub fn as_str(&self) -> &'static str {
        match self {
            VisibilityLevel::Owner => "owner",
            VisibilityLevel::Team => "team",
            VisibilityLevel::Department => "department",
            VisibilityLevel::Organization => "organization",
            VisibilityLevel::Public => "public",
        }
    }
}

impl core::fmt::Display for VisibilityLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    Contains,
}

impl Condition {
    /// Whether `actual` (from the record) satisfies this condition against
    /// `expected` (from the rule).
    ///
    /// Numeric comparisons that cannot coerce both sides never match.
    pub fn matches(&self, actual: &Value, expected: &Value) -> bool {
        match self {
            Condition::Equals => loosely_equal(actual, expected),
            Condition::NotEquals => !loosely_equal(actual, expected),
            Condition::GreaterThan => match (as_number(actual), as_number(expected)) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            Condition::LessThan => match (as_number(actual), as_number(expected)) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
            Condition::Contains => match actual {
                Value::String(haystack) => match expected {
                    Value::String(needle) => haystack.contains(needle.as_str()),
                    Value::Number(n) => haystack.contains(&n.to_string()),
                    _ => false,
                },
                Value::Array(items) => items.iter().any(|item| loosely_equal(item, expected)),
                _ => false,
            },
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Exact comparison that treats `75000` and `"75000"` as the same value.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// A conditional override for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub module: Module,
    pub field: String,
    pub condition: Condition,
    pub value: Value,
    pub result_level: VisibilityLevel,
}

impl VisibilityRule {
    /// A rule never matches a record that lacks its field.
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        fields
            .get(&self.field)
            .is_some_and(|actual| self.condition.matches(actual, &self.value))
    }
}

/// A record whose visibility is being resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub owner: User,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(owner: User) -> Self {
        Self {
            owner,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Visibility configuration for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleVisibility {
    pub module: Module,
    pub default_level: VisibilityLevel,
    /// Evaluated top to bottom; the first match wins.
    #[serde(default)]
    pub rules: Vec<VisibilityRule>,
}

/// Outcome of resolving a record's visibility.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub level: VisibilityLevel,
    /// Position of the rule that decided, `None` when the default applied.
    pub matched_rule: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityResolver {
    modules: BTreeMap<Module, ModuleVisibility>,
}

impl VisibilityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from per-module settings.
    ///
    /// A module may be configured once, and every rule must belong to the
    /// module it is listed under.
    pub fn from_settings(
        settings: impl IntoIterator<Item = ModuleVisibility>,
    ) -> DomainResult<Self> {
        let mut modules = BTreeMap::new();
        for setting in settings {
            if let Some(stray) = setting.rules.iter().find(|r| r.module != setting.module) {
                return Err(DomainError::validation(format!(
                    "visibility rule on field '{}' belongs to module '{}' but is listed under '{}'",
                    stray.field, stray.module, setting.module
                )));
            }
            if let Some(blank) = setting.rules.iter().position(|r| r.field.trim().is_empty()) {
                return Err(DomainError::validation(format!(
                    "visibility rule #{blank} of module '{}' has an empty field name",
                    setting.module
                )));
            }
            let module = setting.module.clone();
            if modules.insert(module.clone(), setting).is_some() {
                return Err(DomainError::conflict(format!(
                    "visibility configured twice for module '{module}'"
                )));
            }
        }
        Ok(Self { modules })
    }

    pub fn default_level(&self, module: &Module) -> VisibilityLevel {
        self.modules
            .get(module)
            .map(|m| m.default_level)
            .unwrap_or(VisibilityLevel::UNCONFIGURED)
    }

    pub fn resolve(&self, module: &Module, record: &Record) -> Resolution {
        let Some(config) = self.modules.get(module) else {
            return Resolution {
                level: VisibilityLevel::UNCONFIGURED,
                matched_rule: None,
            };
        };

        config
            .rules
            .iter()
            .position(|rule| rule.matches(&record.fields))
            .map(|idx| Resolution {
                level: config.rules[idx].result_level,
                matched_rule: Some(idx),
            })
            .unwrap_or(Resolution {
                level: config.default_level,
                matched_rule: None,
            })
    }

    pub fn resolve_visibility(&self, module: &Module, record: &Record) -> VisibilityLevel {
        self.resolve(module, record).level
    }

    /// Per-module settings, sorted by module; rule order is preserved.
    pub fn settings(&self) -> Vec<ModuleVisibility> {
        self.modules.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use warden_core::UserId;

    fn rule(
        field: &str,
        condition: Condition,
        value: Value,
        level: VisibilityLevel,
    ) -> VisibilityRule {
        VisibilityRule {
            module: Module::from("deals"),
            field: field.to_string(),
            condition,
            value,
            result_level: level,
        }
    }

    fn deals(rules: Vec<VisibilityRule>) -> VisibilityResolver {
        VisibilityResolver::from_settings([ModuleVisibility {
            module: Module::from("deals"),
            default_level: VisibilityLevel::Team,
            rules,
        }])
        .unwrap()
    }

    fn record() -> Record {
        Record::new(User::new(UserId::new(), "sales_rep"))
    }

    #[test]
    fn levels_order_from_most_restrictive() {
        assert!(VisibilityLevel::Owner < VisibilityLevel::Team);
        assert!(VisibilityLevel::Department < VisibilityLevel::Organization);
        assert!(VisibilityLevel::Organization < VisibilityLevel::Public);
    }

    #[test]
    fn unconfigured_module_is_owner_only() {
        let resolver = deals(vec![]);
        assert_eq!(
            resolver.resolve_visibility(&"tickets".into(), &record()),
            VisibilityLevel::Owner
        );
    }

    #[test]
    fn first_matching_rule_wins() {
        let resolver = deals(vec![
            rule("stage", Condition::Equals, json!("won"), VisibilityLevel::Public),
            rule("value", Condition::GreaterThan, json!(1000), VisibilityLevel::Department),
        ]);
        let both = record().with_field("stage", "won").with_field("value", 5000);
        let second_only = record().with_field("stage", "open").with_field("value", 5000);

        let r = resolver.resolve(&"deals".into(), &both);
        assert_eq!(r.level, VisibilityLevel::Public);
        assert_eq!(r.matched_rule, Some(0));
        assert_eq!(
            resolver.resolve_visibility(&"deals".into(), &second_only),
            VisibilityLevel::Department
        );
    }

    #[test]
    fn numeric_conditions_fail_closed() {
        let resolver = deals(vec![rule(
            "value",
            Condition::GreaterThan,
            json!(50000),
            VisibilityLevel::Organization,
        )]);
        for value in [json!("lots"), json!(null), json!(true), json!([60000])] {
            let rec = record().with_field("value", value);
            assert_eq!(resolver.resolve_visibility(&"deals".into(), &rec), VisibilityLevel::Team);
        }
        let numeric_string = record().with_field("value", "60000");
        assert_eq!(
            resolver.resolve_visibility(&"deals".into(), &numeric_string),
            VisibilityLevel::Organization
        );
    }

    #[test]
    fn less_than_compares_numbers() {
        assert!(Condition::LessThan.matches(&json!(9.5), &json!("10")));
        assert!(!Condition::LessThan.matches(&json!(10), &json!(10)));
    }

    #[test]
    fn equality_is_exact_but_crosses_number_encoding() {
        assert!(Condition::Equals.matches(&json!(75000), &json!("75000")));
        assert!(Condition::Equals.matches(&json!("Won"), &json!("Won")));
        assert!(!Condition::Equals.matches(&json!("won"), &json!("Won")));
        assert!(Condition::NotEquals.matches(&json!("lost"), &json!("won")));
        assert!(!Condition::Equals.matches(&json!(true), &json!("true")));
    }

    #[test]
    fn contains_checks_substrings_and_arrays() {
        assert!(Condition::Contains.matches(&json!("Enterprise renewal"), &json!("renewal")));
        assert!(Condition::Contains.matches(&json!(["vip", "emea"]), &json!("vip")));
        assert!(Condition::Contains.matches(&json!([1, 2, 3]), &json!("2")));
        assert!(!Condition::Contains.matches(&json!({"vip": true}), &json!("vip")));
    }

    #[test]
    fn missing_field_never_matches_even_not_equals() {
        let resolver = deals(vec![rule(
            "stage",
            Condition::NotEquals,
            json!("won"),
            VisibilityLevel::Public,
        )]);
        assert_eq!(resolver.resolve_visibility(&"deals".into(), &record()), VisibilityLevel::Team);
    }

    #[test]
    fn misfiled_rule_is_rejected() {
        let mut stray = rule("value", Condition::Equals, json!(1), VisibilityLevel::Public);
        stray.module = Module::from("leads");
        let err = VisibilityResolver::from_settings([ModuleVisibility {
            module: Module::from("deals"),
            default_level: VisibilityLevel::Team,
            rules: vec![stray],
        }])
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    fn level_strategy() -> impl Strategy<Value = VisibilityLevel> {
        prop_oneof![
            Just(VisibilityLevel::Owner),
            Just(VisibilityLevel::Team),
            Just(VisibilityLevel::Department),
            Just(VisibilityLevel::Organization),
            Just(VisibilityLevel::Public),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: when several rules match, the earliest one decides, and
        /// resolving twice gives the same answer.
        #[test]
        fn earliest_match_decides(
            levels in prop::collection::vec(level_strategy(), 1..8),
            value in 0i64..1_000_000,
        ) {
            let rules: Vec<VisibilityRule> = levels
                .iter()
                .map(|l| rule("value", Condition::LessThan, json!(1_000_001), *l))
                .collect();
            let resolver = deals(rules);
            let rec = record().with_field("value", value);

            let first = resolver.resolve(&"deals".into(), &rec);
            prop_assert_eq!(first.level, levels[0]);
            prop_assert_eq!(first.matched_rule, Some(0));
            prop_assert_eq!(resolver.resolve(&"deals".into(), &rec), first);
        }
    }
}
