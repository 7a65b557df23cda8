//! Domain types for registry entries.
//!
//! A [`RegistryEntry`] is the plain data structure the engine consumes: it is
//! either fetched from the registry or handed in directly by the caller.
//! Field names follow the registry's JSON documents, so an entry can be
//! deserialized straight from an API response or a local YAML/JSON file.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed identifier for an extractor entry in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractorId(pub String);

impl fmt::Display for ExtractorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ExtractorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ExtractorId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How a usage recipe is invoked.
///
/// Unknown registry values are kept as [`UsageMethod::Other`] so that the
/// entry still loads; usage selection simply never picks them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UsageMethod {
    Cli,
    Python,
    Other(String),
}

impl UsageMethod {
    pub fn as_str(&self) -> &str {
        match self {
            UsageMethod::Cli => "cli",
            UsageMethod::Python => "python",
            UsageMethod::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, UsageMethod::Other(_))
    }
}

impl From<String> for UsageMethod {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "cli" => UsageMethod::Cli,
            "python" => UsageMethod::Python,
            _ => UsageMethod::Other(s),
        }
    }
}

impl From<UsageMethod> for String {
    fn from(m: UsageMethod) -> Self {
        m.as_str().to_string()
    }
}

impl FromStr for UsageMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match UsageMethod::from(s.to_string()) {
            UsageMethod::Other(other) => Err(format!(
                "unknown execution method '{other}'; expected: python, cli"
            )),
            known => Ok(known),
        }
    }
}

impl fmt::Display for UsageMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an installation recipe provisions packages. Only `pip` is executable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstallMethod {
    Pip,
    Conda,
    Other(String),
}

impl InstallMethod {
    pub fn as_str(&self) -> &str {
        match self {
            InstallMethod::Pip => "pip",
            InstallMethod::Conda => "conda",
            InstallMethod::Other(s) => s,
        }
    }
}

impl From<String> for InstallMethod {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "pip" => InstallMethod::Pip,
            "conda" => InstallMethod::Conda,
            _ => InstallMethod::Other(s),
        }
    }
}

impl From<InstallMethod> for String {
    fn from(m: InstallMethod) -> Self {
        m.as_str().to_string()
    }
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A file type the extractor accepts, with optional per-type template values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedFiletype {
    pub id: String,
    /// Overrides for template fields (`input_type`, `output_path`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<BTreeMap<String, String>>,
}

impl SupportedFiletype {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            template: None,
        }
    }
}

/// One way of installing the extractor's packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecipe {
    pub method: InstallMethod,
    #[serde(default)]
    pub packages: Vec<String>,
}

/// One way of invoking the extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecipe {
    pub method: UsageMethod,
    pub command: String,
    /// For `python` usage: the module to import before calling `command`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setup: Option<String>,
}

/// A registry entry describing one extractor plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: ExtractorId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "supported_input_types")]
    pub supported_filetypes: Vec<SupportedFiletype>,
    #[serde(default)]
    pub installation: Vec<InstallRecipe>,
    #[serde(default)]
    pub usage: Vec<UsageRecipe>,
}

impl RegistryEntry {
    /// Look up a supported file type by id.
    pub fn filetype(&self, input_type: &str) -> Option<&SupportedFiletype> {
        self.supported_filetypes.iter().find(|f| f.id == input_type)
    }

    /// Check the structural invariants: non-empty id, unique file type ids.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.id.0.trim().is_empty() {
            return Err(RegistryError::InvalidEntry {
                id: self.id.0.clone(),
                reason: "entry id must not be empty".to_string(),
            });
        }
        let mut seen = HashSet::new();
        for filetype in &self.supported_filetypes {
            if !seen.insert(filetype.id.as_str()) {
                return Err(RegistryError::InvalidEntry {
                    id: self.id.0.clone(),
                    reason: format!("file type '{}' listed more than once", filetype.id),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(filetypes: &[&str]) -> RegistryEntry {
        RegistryEntry {
            id: ExtractorId::from("demo"),
            name: None,
            description: None,
            supported_filetypes: filetypes.iter().map(|f| SupportedFiletype::new(*f)).collect(),
            installation: vec![],
            usage: vec![],
        }
    }

    #[test]
    fn method_strings_are_case_insensitive() {
        assert_eq!(UsageMethod::from("CLI".to_string()), UsageMethod::Cli);
        assert_eq!(InstallMethod::from("Pip".to_string()), InstallMethod::Pip);
        assert_eq!(
            InstallMethod::from("docker".to_string()),
            InstallMethod::Other("docker".to_string())
        );
    }

    #[test]
    fn usage_method_from_str_rejects_unknown() {
        assert_eq!("python".parse::<UsageMethod>(), Ok(UsageMethod::Python));
        assert!("docker".parse::<UsageMethod>().is_err());
    }

    #[test]
    fn validate_rejects_empty_id() {
        let mut e = entry(&["x"]);
        e.id = ExtractorId::from("  ");
        assert!(matches!(e.validate(), Err(RegistryError::InvalidEntry { .. })));
    }

    #[test]
    fn validate_rejects_duplicate_filetypes() {
        let err = entry(&["x", "y", "x"]).validate().unwrap_err();
        assert!(err.to_string().contains("'x' listed more than once"), "got: {err}");
    }

    #[test]
    fn filetype_lookup() {
        let e = entry(&["x", "y"]);
        assert_eq!(e.filetype("y").map(|f| f.id.as_str()), Some("y"));
        assert!(e.filetype("z").is_none());
    }

    #[test]
    fn supported_input_types_alias_is_accepted() {
        let yaml = "id: demo\nsupported_input_types:\n  - id: x\n";
        let e: RegistryEntry = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(e.supported_filetypes, vec![SupportedFiletype::new("x")]);
    }
}
