use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role identifier as issued by the directory service.
///
/// Identifiers are stable keys; display names are not. Nothing in the engine
/// dispatches on a role's display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleId(Cow<'static, str>);

impl RoleId {
    pub fn new(id: impl Into<Cow<'static, str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for RoleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for RoleId {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RoleId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Explicit classification of a role.
///
/// Tags are assigned by administrators in the directory and replace any
/// "does the label contain `Sales`" style checks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTag {
    Admin,
    Sales,
    Marketing,
    Support,
    Finance,
    Viewer,
}

impl RoleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTag::Admin => "admin",
            RoleTag::Sales => "sales",
            RoleTag::Marketing => "marketing",
            RoleTag::Support => "support",
            RoleTag::Finance => "finance",
            RoleTag::Viewer => "viewer",
        }
    }

    /// Parse a tag as sent by the directory. Unknown tags yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(RoleTag::Admin),
            "sales" => Some(RoleTag::Sales),
            "marketing" => Some(RoleTag::Marketing),
            "support" => Some(RoleTag::Support),
            "finance" => Some(RoleTag::Finance),
            "viewer" => Some(RoleTag::Viewer),
            _ => None,
        }
    }
}

impl core::fmt::Display for RoleTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role definition as held in the catalog.
///
/// `hierarchy_level` orders roles by authority: lower is more privileged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub hierarchy_level: i32,
    #[serde(default)]
    pub is_system_role: bool,
    #[serde(default)]
    pub tags: BTreeSet<RoleTag>,
}

impl Role {
    pub fn new(id: impl Into<RoleId>, name: impl Into<String>, hierarchy_level: i32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            hierarchy_level,
            is_system_role: false,
            tags: BTreeSet::new(),
        }
    }

    pub fn system(mut self) -> Self {
        self.is_system_role = true;
        self
    }

    pub fn with_tag(mut self, tag: RoleTag) -> Self {
        self.tags.insert(tag);
        self
    }

    pub fn has_tag(&self, tag: RoleTag) -> bool {
        self.tags.contains(&tag)
    }
}
