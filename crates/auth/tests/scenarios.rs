//! End-to-end scenarios against a realistic CRM policy snapshot.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use warden_auth::{
    Action, Authorizer, Condition, DecisionReason, FieldAccess, FieldSecurityEntry, Module,
    ModuleVisibility, PermissionRule, PolicySnapshot, Record, Role, RoleId, RoleTag,
    SnapshotCell, SnapshotDocument, User, VisibilityLevel, VisibilityRule,
};
use warden_core::UserId;

fn crm_document() -> SnapshotDocument {
    let mut permissions = Vec::new();
    for action in Action::STANDARD {
        permissions.push(PermissionRule::allow("administrator", "leads", action.clone()));
        permissions.push(PermissionRule::allow("administrator", "deals", action.clone()));
        permissions.push(PermissionRule::allow("administrator", "settings", action));
    }
    for action in [Action::Create, Action::Read, Action::Update, Action::Share] {
        permissions.push(PermissionRule::allow("sales_manager", "leads", action.clone()));
        permissions.push(PermissionRule::allow("sales_manager", "deals", action));
    }
    permissions.push(PermissionRule::allow("sales_rep", "leads", Action::Read));
    permissions.push(PermissionRule::allow("sales_rep", "leads", Action::Create));
    permissions.push(PermissionRule::deny("sales_rep", "leads", Action::Export));
    permissions.push(PermissionRule::allow("viewer", "leads", Action::Read));

    SnapshotDocument {
        revision: 1,
        loaded_at: Utc::now(),
        roles: vec![
            Role::new("administrator", "Administrator", 0)
                .system()
                .with_tag(RoleTag::Admin),
            Role::new("sales_manager", "Sales Manager", 2).with_tag(RoleTag::Sales),
            Role::new("sales_rep", "Sales Rep", 3).with_tag(RoleTag::Sales),
            Role::new("viewer", "Viewer", 9).with_tag(RoleTag::Viewer),
        ],
        permissions,
        field_security: vec![FieldSecurityEntry {
            module: Module::from("leads"),
            role: RoleId::from("viewer"),
            field: "value".to_string(),
            visible: false,
            editable: true,
            required: true,
        }],
        visibility: vec![ModuleVisibility {
            module: Module::from("deals"),
            default_level: VisibilityLevel::Team,
            rules: vec![VisibilityRule {
                module: Module::from("deals"),
                field: "value".to_string(),
                condition: Condition::GreaterThan,
                value: json!(50000),
                result_level: VisibilityLevel::Organization,
            }],
        }],
        team_departments: vec![],
    }
}

fn authorizer(doc: SnapshotDocument) -> Authorizer {
    let snapshot = PolicySnapshot::from_document(doc).expect("valid fixture");
    Authorizer::new(Arc::new(SnapshotCell::new().with_snapshot(snapshot)))
}

fn role_ids(roles: Vec<Role>) -> Vec<String> {
    roles.into_iter().map(|r| r.id.to_string()).collect()
}

#[test]
fn administrator_and_manager_assignable_roles() {
    let a = authorizer(crm_document());

    let from_admin = role_ids(a.assignable_roles(&"administrator".into()).unwrap());
    assert!(from_admin.contains(&"sales_manager".to_string()));
    assert!(from_admin.contains(&"sales_rep".to_string()));
    assert!(!from_admin.contains(&"administrator".to_string()));

    let from_manager = role_ids(a.assignable_roles(&"sales_manager".into()).unwrap());
    assert!(from_manager.contains(&"sales_rep".to_string()));
    assert!(!from_manager.contains(&"sales_manager".to_string()));
    assert!(!from_manager.contains(&"administrator".to_string()));
}

#[test]
fn deal_value_drives_visibility() {
    let a = authorizer(crm_document());
    let owner = User::new(UserId::new(), "sales_rep");

    let big = Record::new(owner.clone()).with_field("value", 75000);
    let small = Record::new(owner).with_field("value", 10000);

    assert_eq!(
        a.resolve_visibility(&"deals".into(), &big).unwrap(),
        VisibilityLevel::Organization
    );
    assert_eq!(
        a.resolve_visibility(&"deals".into(), &small).unwrap(),
        VisibilityLevel::Team
    );
}

#[test]
fn inconsistent_field_entry_is_normalized() {
    let a = authorizer(crm_document());
    let table = a.field_security(&"leads".into(), &"viewer".into()).unwrap();
    assert_eq!(table["value"], FieldAccess::HIDDEN);

    let viewer = User::new(UserId::new(), "viewer");
    let d = a
        .evaluate(&viewer, &"leads".into(), &Action::Read, Some("value"), None)
        .unwrap();
    assert!(!d.allowed);
    assert_eq!(d.reason, DecisionReason::FieldHidden);
}

#[test]
fn explicit_denial_and_unknown_role_both_deny() {
    let a = authorizer(crm_document());
    let rep = User::new(UserId::new(), "sales_rep");
    let ghost = User::new(UserId::new(), "intern");

    for actor in [&rep, &ghost] {
        let d = a
            .evaluate(actor, &"leads".into(), &Action::Export, None, None)
            .unwrap();
        assert_eq!(d.reason, DecisionReason::ModuleActionDenied);
    }
    assert!(a.assignable_roles(&"intern".into()).unwrap().is_empty());
}

#[test]
fn exported_snapshot_reimports_with_identical_decisions() {
    let original = authorizer(crm_document());
    let json = serde_json::to_string_pretty(&original.snapshot().unwrap().to_document()).unwrap();
    let reimported = authorizer(serde_json::from_str(&json).unwrap());

    let roles = ["administrator", "sales_manager", "sales_rep", "viewer", "intern"];
    let modules = ["leads", "deals", "settings", "reports"];
    let mut actions = Action::STANDARD.to_vec();
    actions.push(Action::Custom("convert".to_string()));

    for role in roles {
        let role = RoleId::from(role);
        for module in modules {
            let module = Module::from(module);
            for action in &actions {
                assert_eq!(
                    original.has_permission(&role, &module, action).unwrap(),
                    reimported.has_permission(&role, &module, action).unwrap(),
                    "({role}, {module}, {action})"
                );
            }
            assert_eq!(
                original.field_security(&module, &role).unwrap(),
                reimported.field_security(&module, &role).unwrap()
            );
        }
        assert_eq!(
            role_ids(original.assignable_roles(&role).unwrap()),
            role_ids(reimported.assignable_roles(&role).unwrap())
        );
    }
}

#[test]
fn refresh_swaps_rules_wholesale() {
    let a = authorizer(crm_document());
    let rep = RoleId::from("sales_rep");
    assert!(!a.has_permission(&rep, &"deals".into(), &Action::Read).unwrap());

    let held = a.snapshot().unwrap();

    let mut doc = crm_document();
    doc.revision = 2;
    doc.permissions
        .push(PermissionRule::allow("sales_rep", "deals", Action::Read));
    a.cell().replace(PolicySnapshot::from_document(doc).unwrap());

    assert!(a.has_permission(&rep, &"deals".into(), &Action::Read).unwrap());
    // A reader holding the old snapshot still sees the old rules.
    assert!(!held.permissions.has_permission(&rep, &"deals".into(), &Action::Read));
    assert_eq!(held.revision, 1);
}
