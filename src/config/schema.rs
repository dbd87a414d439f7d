//! Configuration schema
//!
//! Defines the structure of the configuration file.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub compose: ComposeConfig,

    #[serde(default)]
    pub mods: ModsConfig,
}

/// General settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding instances (empty = ~/.gcompose/instances)
    #[serde(default)]
    pub instances_dir: String,
}

/// Layer composition settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Highest `minimumLauncherVersion` a layer may require
    #[serde(default = "default_max_launcher_version")]
    pub max_launcher_version: u32,

    /// Load only the base layer and the custom layer
    #[serde(default)]
    pub only_vanilla: bool,

    /// Extra layers loaded after the loader layers, in order
    #[serde(default)]
    pub external_layers: Vec<String>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_launcher_version: default_max_launcher_version(),
            only_vanilla: false,
            external_layers: Vec::new(),
        }
    }
}

/// Mod folder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModsConfig {
    /// File extensions treated as mods
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ModsConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

// Default value functions for serde
fn default_max_launcher_version() -> u32 {
    18
}
fn default_extensions() -> Vec<String> {
    vec!["jar".to_string(), "zip".to_string(), "litemod".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [compose]
            only_vanilla = true
            "#,
        )
        .unwrap();
        assert!(config.compose.only_vanilla);
        assert_eq!(config.compose.max_launcher_version, 18);
        assert_eq!(config.mods.extensions, ["jar", "zip", "litemod"]);
        assert!(config.general.instances_dir.is_empty());
    }

    #[test]
    fn test_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.compose.external_layers, config.compose.external_layers);
        assert_eq!(parsed.mods.extensions, config.mods.extensions);
    }
}
