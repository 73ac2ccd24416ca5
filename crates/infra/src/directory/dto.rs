//! Wire shapes returned by the directory service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use warden_core::{DepartmentId, TeamId};

/// Entry of `GET /user-roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecord {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "order", skip_serializing_if = "Option::is_none")]
    pub hierarchy_level: Option<i32>,
    #[serde(default)]
    pub is_system_role: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of `GET /user-roles/{id}`: the role plus its permission grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: RoleRecord,
    /// module → action → allowed
    #[serde(default)]
    pub permissions: BTreeMap<String, BTreeMap<String, bool>>,
}

/// Entry of `GET /departments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentRecord {
    pub id: DepartmentId,
    pub name: String,
    #[serde(default)]
    pub team_ids: Vec<TeamId>,
}

/// Entry of `GET /settings/field-security`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSecurityRecord {
    pub module: String,
    pub role: String,
    pub field: String,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "yes")]
    pub editable: bool,
    #[serde(default)]
    pub required: bool,
}

fn yes() -> bool {
    true
}

/// Entry of `GET /settings/visibility-rules`: one module's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilitySettingRecord {
    pub module: String,
    pub default_level: String,
    #[serde(default)]
    pub rules: Vec<VisibilityRuleRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRuleRecord {
    pub field: String,
    pub condition: String,
    pub value: serde_json::Value,
    pub result_level: String,
}

/// Everything one refresh fetches, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryBundle {
    pub roles: Vec<RoleDetail>,
    pub departments: Vec<DepartmentRecord>,
    pub field_security: Vec<FieldSecurityRecord>,
    pub visibility: Vec<VisibilitySettingRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_detail_reads_backend_json() {
        let detail: RoleDetail = serde_json::from_value(json!({
            "id": "sales_manager",
            "name": "Sales Manager",
            "order": 2,
            "isSystemRole": false,
            "tags": ["sales"],
            "permissions": { "leads": { "read": true, "delete": false } }
        }))
        .unwrap();

        assert_eq!(detail.role.hierarchy_level, Some(2));
        assert_eq!(detail.role.tags, vec!["sales".to_string()]);
        assert_eq!(detail.permissions["leads"]["delete"], false);
    }

    #[test]
    fn field_security_flags_default_permissively() {
        let record: FieldSecurityRecord = serde_json::from_value(json!({
            "module": "leads", "role": "viewer", "field": "value", "editable": false
        }))
        .unwrap();
        assert!(record.visible);
        assert!(!record.editable);
        assert!(!record.required);
    }
}
