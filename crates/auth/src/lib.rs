//! `warden-auth` — pure role-based authorization engine.
//!
//! Every evaluator here is a synchronous function over an immutable
//! [`PolicySnapshot`]. No IO, no ambient state; the acting user is always an
//! explicit argument. Fetching snapshots is the job of `warden-infra`.

pub mod action;
pub mod authorize;
pub mod catalog;
pub mod field_security;
pub mod guard;
pub mod membership;
pub mod permissions;
pub mod roles;
pub mod snapshot;
pub mod visibility;

pub use action::{Action, Module};
pub use authorize::{Authorizer, AuthzError, Decision, DecisionReason};
pub use catalog::RoleCatalog;
pub use field_security::{FieldAccess, FieldSecurityEntry, FieldSecurityPolicy};
pub use guard::RoleAssignmentGuard;
pub use membership::{Membership, User};
pub use permissions::{PermissionMatrix, PermissionRule};
pub use roles::{Role, RoleId, RoleTag};
pub use snapshot::{PolicySnapshot, SnapshotCell, SnapshotDocument, TeamDepartment};
pub use visibility::{
    Condition, ModuleVisibility, Record, Resolution, VisibilityLevel, VisibilityResolver,
    VisibilityRule,
};
