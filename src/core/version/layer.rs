//! Version layers
//!
//! One parsed version document: the base game version, a loader patch, or the
//! instance's custom override. Layers are immutable once built; edits produce a
//! replacement layer.

use super::VersionType;
use crate::core::error::{ComposeError, ComposeResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Value older documents use for "no minimum launcher version".
const UNSET_LAUNCHER_VERSION: i64 = 0xDEAD_BEEF;

/// One version document contributing to an instance's effective version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionLayer {
    id: String,

    /// Display name (e.g. "Forge")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    /// Display version (e.g. "10.13.4.1614")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,

    /// Loader priority, lower loads first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    release_time: Option<String>,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    version_type: Option<VersionType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    assets: Option<String>,

    /// Legacy pre-1.6 argument style, e.g. "username_session_version"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    process_arguments: Option<String>,

    /// Argument template with `${placeholder}` tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    minecraft_arguments: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_launcher_version",
        skip_serializing_if = "Option::is_none"
    )]
    minimum_launcher_version: Option<u32>,

    #[serde(default, alias = "+tweakers", skip_serializing_if = "Vec::is_empty")]
    tweakers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    main_class: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    libraries: Vec<LibraryDescriptor>,

    /// Mod activation record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    mods: Vec<ModActivation>,
}

fn deserialize_launcher_version<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw
        .filter(|v| *v != UNSET_LAUNCHER_VERSION)
        .and_then(|v| u32::try_from(v).ok()))
}

/// Enabled state of one mod as recorded in a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModActivation {
    pub id: String,
    pub enabled: bool,
}

/// Library dependency as declared by a layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryDescriptor {
    /// Maven coordinate `group:artifact:version[:classifier]`
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// OS name -> native classifier, `${arch}` allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Parsed Maven coordinate of a library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryCoordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    pub classifier: Option<String>,
}

impl LibraryCoordinate {
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split(':').collect();
        if parts.len() < 3 || parts.len() > 4 || parts.iter().any(|p| p.is_empty()) {
            return None;
        }
        Some(Self {
            group: parts[0].to_string(),
            artifact: parts[1].to_string(),
            version: parts[2].to_string(),
            classifier: parts.get(3).map(|c| c.to_string()),
        })
    }

    /// Identity used when layers override each other: everything but the version.
    pub fn key(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!("{}:{}:{}", self.group, self.artifact, classifier),
            None => format!("{}:{}", self.group, self.artifact),
        }
    }
}

/// Rule for conditional inclusion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl Rule {
    /// Does the rule apply on the current OS
    pub fn applies(&self) -> bool {
        self.os.as_ref().is_none_or(|os| os.matches_current())
    }

    pub fn allows(&self) -> bool {
        self.action == "allow"
    }
}

impl OsRule {
    /// Check if current OS matches the rule
    pub fn matches_current(&self) -> bool {
        if let Some(ref name) = self.name {
            if name != current_os() {
                return false;
            }
        }

        if let Some(ref arch) = self.arch {
            let current_arch = if cfg!(target_arch = "x86_64") {
                "x64"
            } else if cfg!(target_arch = "x86") {
                "x86"
            } else if cfg!(target_arch = "aarch64") {
                "arm64"
            } else {
                "unknown"
            };

            if arch != current_arch {
                return false;
            }
        }

        true
    }
}

fn current_os() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

impl LibraryDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            natives: None,
            rules: None,
            enabled: true,
        }
    }

    pub fn coordinate(&self) -> Option<LibraryCoordinate> {
        LibraryCoordinate::parse(&self.name)
    }

    /// Override key; falls back to the raw name for unparsable coordinates.
    pub fn key(&self) -> String {
        self.coordinate()
            .map(|c| c.key())
            .unwrap_or_else(|| self.name.clone())
    }

    /// Native libraries carry a `natives` map or a `natives-*` classifier.
    pub fn is_native(&self) -> bool {
        self.natives.is_some()
            || self
                .coordinate()
                .and_then(|c| c.classifier)
                .is_some_and(|c| c.starts_with("natives-"))
    }

    /// Check if library should be included based on rules.
    ///
    /// With rules present a library starts disallowed and the last rule that
    /// applies on this OS decides.
    pub fn should_include(&self) -> bool {
        match &self.rules {
            None => true,
            Some(rules) if rules.is_empty() => true,
            Some(rules) => rules
                .iter()
                .rev()
                .find(|r| r.applies())
                .is_some_and(|r| r.allows()),
        }
    }

    /// Get the native classifier for current OS
    pub fn native_classifier(&self) -> Option<String> {
        self.natives.as_ref().and_then(|natives| {
            natives.get(current_os()).map(|s| {
                let arch = if cfg!(target_arch = "x86_64") {
                    "64"
                } else {
                    "32"
                };
                s.replace("${arch}", arch)
            })
        })
    }

    /// Relative path of the library jar inside a libraries directory
    pub fn path(&self) -> Option<String> {
        let coordinate = self.coordinate()?;
        let classifier = coordinate.classifier.or_else(|| self.native_classifier());
        let group_path = coordinate.group.replace('.', "/");
        let file = match classifier {
            Some(c) => format!("{}-{}-{}.jar", coordinate.artifact, coordinate.version, c),
            None => format!("{}-{}.jar", coordinate.artifact, coordinate.version),
        };
        Some(format!(
            "{}/{}/{}/{}",
            group_path, coordinate.artifact, coordinate.version, file
        ))
    }
}

impl VersionLayer {
    /// Build a layer from a parsed version document.
    pub fn from_document(document: &serde_json::Value) -> ComposeResult<Self> {
        let label = document
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("<unknown>")
            .to_string();

        let layer: VersionLayer =
            serde_json::from_value(document.clone()).map_err(|e| ComposeError::parse(&label, e))?;
        layer.validate()?;
        Ok(layer)
    }

    /// An empty layer carrying only an id.
    pub fn empty(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            version: None,
            order: None,
            time: None,
            release_time: None,
            version_type: None,
            assets: None,
            process_arguments: None,
            minecraft_arguments: None,
            minimum_launcher_version: None,
            tweakers: Vec::new(),
            main_class: None,
            libraries: Vec::new(),
            mods: Vec::new(),
        }
    }

    fn validate(&self) -> ComposeResult<()> {
        if self.id.trim().is_empty() {
            return Err(ComposeError::parse(&self.id, "missing layer id"));
        }
        if let Some(lib) = self.libraries.iter().find(|l| l.coordinate().is_none()) {
            return Err(ComposeError::parse(
                &self.id,
                format!("invalid library coordinate '{}'", lib.name),
            ));
        }
        if let Some(m) = self.mods.iter().find(|m| m.id.is_empty()) {
            return Err(ComposeError::parse(
                &self.id,
                format!("mod record with empty id (enabled: {})", m.enabled),
            ));
        }
        Ok(())
    }

    /// Serialize back into document form, for persistence.
    pub fn to_document(&self) -> ComposeResult<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// A copy of this layer with its mod activation record replaced.
    pub fn with_mods(&self, mods: Vec<ModActivation>) -> Self {
        Self {
            mods,
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn order(&self) -> Option<i32> {
        self.order
    }

    pub fn time(&self) -> Option<&str> {
        self.time.as_deref()
    }

    pub fn release_time(&self) -> Option<&str> {
        self.release_time.as_deref()
    }

    pub fn version_type(&self) -> Option<&VersionType> {
        self.version_type.as_ref()
    }

    pub fn assets(&self) -> Option<&str> {
        self.assets.as_deref()
    }

    pub fn process_arguments(&self) -> Option<&str> {
        self.process_arguments.as_deref()
    }

    pub fn minecraft_arguments(&self) -> Option<&str> {
        self.minecraft_arguments.as_deref()
    }

    pub fn minimum_launcher_version(&self) -> Option<u32> {
        self.minimum_launcher_version
    }

    pub fn tweakers(&self) -> &[String] {
        &self.tweakers
    }

    pub fn main_class(&self) -> Option<&str> {
        self.main_class.as_deref()
    }

    pub fn libraries(&self) -> &[LibraryDescriptor] {
        &self.libraries
    }

    pub fn mods(&self) -> &[ModActivation] {
        &self.mods
    }
}
