use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Functional area a permission is scoped to (e.g. `"leads"`, `"deals"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Module(Cow<'static, str>);

impl Module {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Module {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Module {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Module {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Operation kind checked against a module.
///
/// The well-known vocabulary is closed; anything else round-trips through
/// [`Action::Custom`] so new actions can be introduced from the directory
/// without a release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
    Share,
    Export,
    Custom(String),
}

impl Action {
    pub const STANDARD: [Action; 6] = [
        Action::Create,
        Action::Read,
        Action::Update,
        Action::Delete,
        Action::Share,
        Action::Export,
    ];

    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "create" => Action::Create,
            "read" | "view" => Action::Read,
            "update" | "edit" => Action::Update,
            "delete" => Action::Delete,
            "share" => Action::Share,
            "export" => Action::Export,
            _ => Action::Custom(normalized),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Share => "share",
            Action::Export => "export",
            Action::Custom(s) => s,
        }
    }

    /// Actions that expose field contents to the actor.
    pub fn reads_fields(&self) -> bool {
        matches!(self, Action::Read | Action::Share | Action::Export)
    }

    /// Actions that write field contents.
    pub fn writes_fields(&self) -> bool {
        matches!(self, Action::Create | Action::Update)
    }
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        Action::parse(&value)
    }
}

impl From<Action> for String {
    fn from(value: Action) -> Self {
        value.as_str().to_string()
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_ui_aliases() {
        assert_eq!(Action::parse("View"), Action::Read);
        assert_eq!(Action::parse("edit"), Action::Update);
        assert_eq!(Action::parse(" EXPORT "), Action::Export);
    }

    #[test]
    fn custom_actions_are_normalized() {
        assert_eq!(Action::parse("Convert"), Action::Custom("convert".to_string()));
        assert_eq!(Action::parse("Convert").as_str(), "convert");
    }

    #[test]
    fn actions_serialize_as_plain_strings() {
        let json =
            serde_json::to_string(&vec![Action::Share, Action::Custom("merge".into())]).unwrap();
        assert_eq!(json, r#"["share","merge"]"#);
        let back: Vec<Action> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec![Action::Share, Action::Custom("merge".into())]);
    }

    #[test]
    fn delete_neither_reads_nor_writes_fields() {
        assert!(!Action::Delete.reads_fields());
        assert!(!Action::Delete.writes_fields());
        assert!(Action::Export.reads_fields());
        assert!(Action::Create.writes_fields());
    }
}
