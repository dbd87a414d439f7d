//! Merged version
//!
//! The effective launch configuration of an instance, folded left-to-right
//! from its layer stack.

use super::{ModActivation, VersionLayer, VersionType};
use crate::core::error::{ComposeError, ComposeResult};
use crate::core::library::{LibraryResolver, ResolvedLibraries, StableMerge};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedVersion {
    /// Base version id; determines which game jar is used
    id: String,
    time: Option<String>,
    release_time: Option<String>,
    version_type: Option<VersionType>,
    assets: Option<String>,
    process_arguments: Option<String>,
    minecraft_arguments: Option<String>,
    minimum_launcher_version: Option<u32>,
    tweakers: Vec<String>,
    main_class: Option<String>,
    libraries: ResolvedLibraries,
    mods: Vec<ModActivation>,
}

impl MergedVersion {
    /// Fold `layers` in order. Later layers overwrite scalar fields they set,
    /// tweakers concatenate, libraries and mod records merge by key.
    ///
    /// `installed` lists the mod ids present in the instance; each becomes
    /// enabled unless the merged record says otherwise.
    pub(crate) fn fold(
        layers: &[&VersionLayer],
        installed: &[&str],
        max_launcher_version: u32,
    ) -> ComposeResult<Self> {
        let mut merged = MergedVersion::default();

        for layer in layers {
            if let Some(required) = layer.minimum_launcher_version() {
                if required > max_launcher_version {
                    return Err(ComposeError::Merge {
                        layer: layer.id().to_string(),
                        reason: format!(
                            "requires launcher version {}, supported up to {}",
                            required, max_launcher_version
                        ),
                    });
                }
                merged.minimum_launcher_version = Some(required);
            }

            if merged.id.is_empty() {
                merged.id = layer.id().to_string();
            }
            overwrite(&mut merged.time, layer.time());
            overwrite(&mut merged.release_time, layer.release_time());
            overwrite(&mut merged.assets, layer.assets());
            overwrite(&mut merged.process_arguments, layer.process_arguments());
            overwrite(&mut merged.minecraft_arguments, layer.minecraft_arguments());
            overwrite(&mut merged.main_class, layer.main_class());
            if let Some(version_type) = layer.version_type() {
                merged.version_type = Some(version_type.clone());
            }

            merged.tweakers.extend(layer.tweakers().iter().cloned());

            tracing::debug!("Folded layer '{}'", layer.id());
        }

        merged.libraries = LibraryResolver::resolve(layers.iter().copied());
        let recorded = activation_record(layers.iter().copied());
        merged.mods = installed
            .iter()
            .map(|id| ModActivation {
                id: id.to_string(),
                enabled: recorded
                    .iter()
                    .find(|r| r.id == *id)
                    .is_none_or(|r| r.enabled),
            })
            .collect();
        Ok(merged)
    }

    pub fn id(&self) -> &str {
        &self.id
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

    pub fn libraries(&self) -> &ResolvedLibraries {
        &self.libraries
    }

    /// Activation state of every installed mod, in registry order
    pub fn mods(&self) -> &[ModActivation] {
        &self.mods
    }

    /// Ids of installed mods left enabled
    pub fn active_mods(&self) -> impl Iterator<Item = &str> {
        self.mods.iter().filter(|m| m.enabled).map(|m| m.id.as_str())
    }

    /// Game argument template followed by one `--tweakClass` per tweaker.
    ///
    /// Versions without `minecraftArguments` fall back to the legacy
    /// `processArguments` style.
    pub fn launch_arguments(&self) -> String {
        let mut args = match self.minecraft_arguments.as_deref() {
            Some(template) if !template.is_empty() => template.to_string(),
            _ => legacy_arguments(self.process_arguments.as_deref().unwrap_or_default()),
        };

        for tweaker in &self.tweakers {
            if !args.is_empty() {
                args.push(' ');
            }
            args.push_str("--tweakClass ");
            args.push_str(tweaker);
        }
        args
    }

    /// `launch_arguments` with `${name}` placeholders replaced from `tokens`.
    /// Unknown placeholders are left as they are.
    pub fn launch_arguments_with(&self, tokens: &HashMap<&str, &str>) -> String {
        substitute(&self.launch_arguments(), tokens)
    }
}

/// Mod activation records of `layers` merged by id, first position kept.
pub(crate) fn activation_record<'a, I>(layers: I) -> Vec<ModActivation>
where
    I: IntoIterator<Item = &'a VersionLayer>,
{
    let mut mods = StableMerge::new();
    for layer in layers {
        for record in layer.mods() {
            mods.upsert(record.id.clone(), record.clone());
        }
    }
    mods.into_items()
}

fn overwrite(target: &mut Option<String>, value: Option<&str>) {
    if let Some(value) = value {
        *target = Some(value.to_string());
    }
}

fn legacy_arguments(process_arguments: &str) -> String {
    match process_arguments.to_lowercase().as_str() {
        "legacy" => "${auth_player_name} ${auth_session}".to_string(),
        "username_session" => "--username ${auth_player_name} --session ${auth_session}".to_string(),
        "username_session_version" => {
            "--username ${auth_player_name} --session ${auth_session} --version ${profile_name}"
                .to_string()
        }
        _ => String::new(),
    }
}

/// Replace `${name}` tokens in `template`.
pub fn substitute(template: &str, tokens: &HashMap<&str, &str>) -> String {
    let mut out = template.to_string();
    for (name, value) in tokens {
        out = out.replace(&format!("${{{}}}", name), value);
    }
    out
}
