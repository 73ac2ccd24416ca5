//! Turn raw directory data into a validated policy snapshot.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

use warden_auth::{
    Action, Condition, FieldSecurityEntry, Module, ModuleVisibility, PermissionRule,
    PolicySnapshot, Role, RoleId, RoleTag, SnapshotDocument, TeamDepartment, VisibilityLevel,
    VisibilityRule,
};
use warden_core::{DomainError, DomainResult};

use crate::directory::{DirectoryBundle, RoleDetail, VisibilitySettingRecord};

/// Build a snapshot from one fetched bundle.
///
/// Roles without a hierarchy level (neither sent nor overridden) are left out
/// of the catalog, and so are their permission rules: an unranked role must
/// behave exactly like an unknown one.
pub fn assemble(
    bundle: DirectoryBundle,
    revision: u64,
    loaded_at: DateTime<Utc>,
    level_overrides: &HashMap<String, i32>,
) -> DomainResult<PolicySnapshot> {
    let mut roles = Vec::with_capacity(bundle.roles.len());
    let mut permissions = Vec::new();

    for detail in bundle.roles {
        let Some(level) = detail
            .role
            .hierarchy_level
            .or_else(|| level_overrides.get(&detail.role.id).copied())
        else {
            tracing::warn!(role = %detail.role.id, "role has no hierarchy level; excluding it");
            continue;
        };
        let (role, rules) = convert_role(detail, level);
        roles.push(role);
        permissions.extend(rules);
    }

    let mut seen_teams = HashSet::new();
    let mut team_departments = Vec::new();
    for department in bundle.departments {
        for team_id in department.team_ids {
            if !seen_teams.insert(team_id) {
                return Err(DomainError::conflict(format!(
                    "team {team_id} is listed under more than one department"
                )));
            }
            team_departments.push(TeamDepartment {
                team_id,
                department_id: department.id,
            });
        }
    }

    let field_security = bundle
        .field_security
        .into_iter()
        .map(|r| FieldSecurityEntry {
            module: Module::new(r.module),
            role: RoleId::new(r.role),
            field: r.field,
            visible: r.visible,
            editable: r.editable,
            required: r.required,
        })
        .collect();

    let visibility = bundle
        .visibility
        .into_iter()
        .map(convert_visibility)
        .collect::<DomainResult<Vec<_>>>()?;

    PolicySnapshot::from_document(SnapshotDocument {
        revision,
        loaded_at,
        roles,
        permissions,
        field_security,
        visibility,
        team_departments,
    })
}

fn convert_role(detail: RoleDetail, level: i32) -> (Role, Vec<PermissionRule>) {
    let RoleDetail { role, permissions } = detail;
    let id = RoleId::new(role.id);

    let mut tags = BTreeSet::new();
    for raw in &role.tags {
        match RoleTag::parse(raw) {
            Some(tag) => {
                tags.insert(tag);
            }
            None => tracing::warn!(role = %id, tag = %raw, "ignoring unknown role tag"),
        }
    }

    let mut rules = Vec::new();
    for (module, actions) in permissions {
        let module = Module::new(module);
        // Aliases such as "view"/"read" can collapse onto one action; the
        // most restrictive value wins.
        let mut merged: HashMap<Action, bool> = HashMap::new();
        for (action, allowed) in actions {
            merged
                .entry(Action::parse(&action))
                .and_modify(|a| *a = *a && allowed)
                .or_insert(allowed);
        }
        let mut merged: Vec<(Action, bool)> = merged.into_iter().collect();
        merged.sort();
        for (action, allowed) in merged {
            rules.push(PermissionRule {
                role: id.clone(),
                module: module.clone(),
                action,
                allowed,
            });
        }
    }

    let role = Role {
        id,
        name: role.name,
        hierarchy_level: level,
        is_system_role: role.is_system_role,
        tags,
    };
    (role, rules)
}

fn convert_visibility(record: VisibilitySettingRecord) -> DomainResult<ModuleVisibility> {
    let module = Module::new(record.module);
    let default_level = parse_level(&record.default_level)?;
    let rules = record
        .rules
        .into_iter()
        .map(|r| {
            Ok(VisibilityRule {
                module: module.clone(),
                field: r.field,
                condition: parse_condition(&r.condition)?,
                value: r.value,
                result_level: parse_level(&r.result_level)?,
            })
        })
        .collect::<DomainResult<Vec<_>>>()?;
    Ok(ModuleVisibility {
        module,
        default_level,
        rules,
    })
}

fn parse_level(raw: &str) -> DomainResult<VisibilityLevel> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "owner" | "private" => Ok(VisibilityLevel::Owner),
        "team" => Ok(VisibilityLevel::Team),
        "department" => Ok(VisibilityLevel::Department),
        "organization" | "organisation" => Ok(VisibilityLevel::Organization),
        "public" => Ok(VisibilityLevel::Public),
        other => Err(DomainError::validation(format!("unknown visibility level '{other}'"))),
    }
}

fn parse_condition(raw: &str) -> DomainResult<Condition> {
    let normalized: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .collect::<String>()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "equals" => Ok(Condition::Equals),
        "notequals" => Ok(Condition::NotEquals),
        "greaterthan" => Ok(Condition::GreaterThan),
        "lessthan" => Ok(Condition::LessThan),
        "contains" => Ok(Condition::Contains),
        _ => Err(DomainError::validation(format!("unknown visibility condition '{raw}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DepartmentRecord, FieldSecurityRecord, RoleRecord, VisibilityRuleRecord};
    use serde_json::json;
    use std::collections::BTreeMap;
    use warden_core::{DepartmentId, TeamId};

    fn role(id: &str, level: Option<i32>, grid: &[(&str, &str, bool)]) -> RoleDetail {
        let mut permissions: BTreeMap<String, BTreeMap<String, bool>> = BTreeMap::new();
        for (module, action, allowed) in grid {
            permissions
                .entry(module.to_string())
                .or_default()
                .insert(action.to_string(), *allowed);
        }
        RoleDetail {
            role: RoleRecord {
                id: id.to_string(),
                name: id.to_uppercase(),
                hierarchy_level: level,
                is_system_role: false,
                tags: vec!["sales".to_string(), "rockstar".to_string()],
            },
            permissions,
        }
    }

    fn bundle() -> DirectoryBundle {
        DirectoryBundle {
            roles: vec![
                role("admin", Some(0), &[("leads", "delete", true)]),
                role("sales_rep", None, &[("leads", "read", true), ("leads", "view", false)]),
                role("intern", None, &[("leads", "read", true)]),
            ],
            departments: vec![],
            field_security: vec![FieldSecurityRecord {
                module: "leads".to_string(),
                role: "sales_rep".to_string(),
                field: "value".to_string(),
                visible: true,
                editable: false,
                required: false,
            }],
            visibility: vec![VisibilitySettingRecord {
                module: "deals".to_string(),
                default_level: "team".to_string(),
                rules: vec![VisibilityRuleRecord {
                    field: "value".to_string(),
                    condition: "greaterThan".to_string(),
                    value: json!(50000),
                    result_level: "organization".to_string(),
                }],
            }],
        }
    }

    fn overrides() -> HashMap<String, i32> {
        HashMap::from([("sales_rep".to_string(), 3)])
    }

    #[test]
    fn unranked_roles_and_their_rules_are_excluded() {
        let snapshot = assemble(bundle(), 1, Utc::now(), &overrides()).unwrap();

        assert_eq!(snapshot.catalog.level(&"sales_rep".into()), Some(3));
        assert!(!snapshot.catalog.contains(&"intern".into()));
        assert!(
            !snapshot
                .permissions
                .has_permission(&"intern".into(), &"leads".into(), &Action::Read)
        );
    }

    #[test]
    fn aliased_actions_merge_to_the_stricter_value() {
        let snapshot = assemble(bundle(), 1, Utc::now(), &overrides()).unwrap();
        assert!(
            !snapshot
                .permissions
                .has_permission(&"sales_rep".into(), &"leads".into(), &Action::Read)
        );
        assert!(
            snapshot
                .permissions
                .has_permission(&"admin".into(), &"leads".into(), &Action::Delete)
        );
    }

    #[test]
    fn known_tags_survive_unknown_are_dropped() {
        let snapshot = assemble(bundle(), 1, Utc::now(), &overrides()).unwrap();
        let admin = snapshot.catalog.get(&"admin".into()).unwrap();
        assert_eq!(admin.tags.iter().copied().collect::<Vec<_>>(), vec![RoleTag::Sales]);
    }

    #[test]
    fn visibility_strings_are_parsed() {
        let snapshot = assemble(bundle(), 1, Utc::now(), &overrides()).unwrap();
        let settings = snapshot.visibility.settings();
        assert_eq!(settings[0].default_level, VisibilityLevel::Team);
        assert_eq!(settings[0].rules[0].condition, Condition::GreaterThan);
        assert_eq!(parse_condition("not_equals").unwrap(), Condition::NotEquals);
        assert!(parse_condition("roughly").is_err());
        assert!(parse_level("galaxy").is_err());
    }

    #[test]
    fn team_in_two_departments_is_a_conflict() {
        let team = TeamId::new();
        let mut b = bundle();
        b.departments = vec![
            DepartmentRecord {
                id: DepartmentId::new(),
                name: "Sales".to_string(),
                team_ids: vec![team],
            },
            DepartmentRecord {
                id: DepartmentId::new(),
                name: "Support".to_string(),
                team_ids: vec![team],
            },
        ];
        assert!(matches!(
            assemble(b, 1, Utc::now(), &overrides()),
            Err(DomainError::Conflict(_))
        ));
    }
}
