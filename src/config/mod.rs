//! Configuration module
//!
//! Handles loading and saving configuration.

mod schema;

pub use schema::{ComposeConfig, Config, GeneralConfig, ModsConfig};

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Get the configuration directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gcompose")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Directory holding instances
pub fn instances_dir(config: &Config) -> PathBuf {
    if config.general.instances_dir.is_empty() {
        config_dir().join("instances")
    } else {
        PathBuf::from(&config.general.instances_dir)
    }
}

/// Load configuration from disk
pub fn load() -> Result<Config> {
    load_from(&config_path())
}

/// Load configuration from `path`, writing defaults if it does not exist
pub fn load_from(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("Invalid config {:?}", path))?;
        Ok(config)
    } else {
        // Create default config
        let config = Config::default();
        save_to(&config, path)?;
        Ok(config)
    }
}

/// Save configuration to `path`
pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    // Ensure config directory exists
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;

    tracing::info!("Configuration saved to {:?}", path);
    Ok(())
}
