//! Mod management module
//!
//! Tracks the mods installed in an instance and whether each one takes part
//! in the merged version. Directory access and jar inspection are delegated
//! to [`ModDirectory`] and [`ModDescriber`].

mod jar;

pub use jar::{FsModDirectory, JarDescriber};

use crate::core::error::{ComposeError, ComposeResult};
use crate::core::projection::{Notifier, StructureObserver};
use crate::core::version::ModActivation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Description of one mod file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModArtifact {
    /// Full path to the mod
    pub path: PathBuf,
    /// Filename of the mod file
    pub file_name: String,
    /// Identity declared by the mod's own metadata, if any
    pub mod_id: Option<String>,
    pub name: String,
    pub version: String,
    pub description: String,
    /// File size in bytes
    pub size: u64,
    pub modified_at: DateTime<Utc>,
    pub sha1: Option<String>,
}

/// How a mod's id was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModKind {
    /// Identified by its own metadata
    Catalogued,
    /// Identified by its filename
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModEntry {
    kind: ModKind,
    id: String,
    artifact: ModArtifact,
    enabled: bool,
}

impl ModEntry {
    /// Entry for a file found by a directory scan.
    fn discovered(artifact: ModArtifact) -> Self {
        match artifact.mod_id.clone() {
            Some(id) => Self {
                kind: ModKind::Catalogued,
                id,
                artifact,
                enabled: true,
            },
            None => Self::local(artifact),
        }
    }

    fn local(artifact: ModArtifact) -> Self {
        Self {
            kind: ModKind::Local,
            id: artifact.file_name.clone(),
            artifact,
            enabled: true,
        }
    }

    pub fn kind(&self) -> ModKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn artifact(&self) -> &ModArtifact {
        &self.artifact
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

/// Paths that appeared and disappeared since the previous scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RescanDelta {
    pub added: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
}

/// The instance's mods directory
pub trait ModDirectory {
    /// Compare the directory against the last scan.
    fn rescan(&mut self) -> ComposeResult<RescanDelta>;

    /// Bring `file` into the directory, returning its new path.
    /// The adopted path is not reported as added by later scans.
    fn adopt(&mut self, file: &Path) -> ComposeResult<PathBuf>;

    /// Delete `path` from the directory.
    fn remove(&mut self, path: &Path) -> ComposeResult<()>;

    /// Report `path` as added again on the next scan.
    fn defer(&mut self, path: &Path);
}

/// Reads the metadata of one mod file
pub trait ModDescriber {
    fn describe(&self, path: &Path) -> ComposeResult<ModArtifact>;
}

/// Ordered list of installed mods
pub struct ModRegistry {
    entries: Vec<ModEntry>,
    directory: Box<dyn ModDirectory>,
    describer: Box<dyn ModDescriber>,
    notifier: Notifier,
}

impl ModRegistry {
    pub fn new(directory: Box<dyn ModDirectory>, describer: Box<dyn ModDescriber>) -> Self {
        Self {
            entries: Vec::new(),
            directory,
            describer,
            notifier: Notifier::default(),
        }
    }

    pub fn entries(&self) -> &[ModEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ModEntry> {
        self.entries.get(index)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub fn observe(&mut self, observer: Rc<dyn StructureObserver>) {
        self.notifier.subscribe(observer);
    }

    /// Current enabled state of every entry, in list order
    pub fn activation_record(&self) -> Vec<ModActivation> {
        self.entries
            .iter()
            .map(|e| ModActivation {
                id: e.id.clone(),
                enabled: e.enabled,
            })
            .collect()
    }

    pub(crate) fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.id.as_str()).collect()
    }

    /// Register `file` as a local mod, enabled.
    pub(crate) fn install(&mut self, file: &Path) -> ComposeResult<()> {
        let artifact = self.describer.describe(file)?;
        let mut entry = ModEntry::local(artifact);
        if self.position(&entry.id).is_some() {
            return Err(ComposeError::DuplicateMod(entry.id));
        }

        let path = self.directory.adopt(file)?;
        entry.artifact.path = path;

        tracing::info!("Installed mod '{}'", entry.id);
        let _bracket = self.notifier.bracket();
        self.entries.push(entry);
        Ok(())
    }

    /// Delete the inclusive range `first..=last`, files included.
    ///
    /// A failing file removal stops the deletion; entries whose files were
    /// already deleted are dropped before the error is returned.
    pub(crate) fn delete_range(&mut self, first: usize, last: usize) -> ComposeResult<()> {
        let len = self.entries.len();
        if last >= len {
            return Err(ComposeError::range(last, len));
        }
        if first > last {
            return Err(ComposeError::range(first, len));
        }

        let mut deleted = 0;
        let mut failure = None;
        for entry in &self.entries[first..=last] {
            if let Err(e) = self.directory.remove(&entry.artifact.path) {
                failure = Some(e);
                break;
            }
            deleted += 1;
        }

        if deleted > 0 {
            let _bracket = self.notifier.bracket();
            let removed: Vec<ModEntry> = self.entries.drain(first..first + deleted).collect();
            for entry in &removed {
                tracing::info!("Deleted mod '{}'", entry.id);
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Returns whether the flag changed.
    pub(crate) fn set_enabled(&mut self, index: usize, enabled: bool) -> ComposeResult<bool> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| ComposeError::range(index, len))?;
        if entry.enabled == enabled {
            return Ok(false);
        }

        entry.enabled = enabled;
        tracing::debug!("Mod '{}' enabled: {}", entry.id, enabled);
        self.notifier.rows_changed(index, index);
        Ok(true)
    }

    /// Rescan the directory. New files take their state from `record`
    /// (enabled when unrecorded); persisting files keep theirs.
    /// Returns whether the list changed.
    ///
    /// A file that cannot be described is left out and deferred to the next
    /// scan. The rest of the scan is still applied before the first describe
    /// error is returned.
    pub(crate) fn directories_changed(&mut self, record: &[ModActivation]) -> ComposeResult<bool> {
        let delta = self.directory.rescan()?;

        let mut discovered = Vec::new();
        let mut failure = None;
        for path in &delta.added {
            if self.entries.iter().any(|e| &e.artifact.path == path) {
                continue;
            }
            match self.describer.describe(path) {
                Ok(artifact) => discovered.push(ModEntry::discovered(artifact)),
                Err(e) => {
                    tracing::warn!("Cannot describe {:?}: {}", path, e);
                    self.directory.defer(path);
                    failure.get_or_insert(e);
                }
            }
        }

        let vanished = self
            .entries
            .iter()
            .filter(|e| delta.removed.contains(&e.artifact.path))
            .count();
        if vanished == 0 && discovered.is_empty() {
            return failure.map_or(Ok(false), Err);
        }

        let _bracket = self.notifier.bracket();
        self.entries
            .retain(|e| !delta.removed.contains(&e.artifact.path));

        for mut entry in discovered {
            if self.position(&entry.id).is_some() {
                tracing::warn!(
                    "Skipping {:?}: mod '{}' is already installed",
                    entry.artifact.path,
                    entry.id
                );
                continue;
            }
            entry.enabled = record
                .iter()
                .find(|r| r.id == entry.id)
                .is_none_or(|r| r.enabled);
            self.entries.push(entry);
        }

        tracing::info!(
            "Mods rescanned: {} added, {} removed, {} total",
            delta.added.len(),
            vanished,
            self.entries.len()
        );
        failure.map_or(Ok(true), Err)
    }

    /// Set every entry's flag from `record`; unrecorded entries become enabled.
    pub(crate) fn apply_activation(&mut self, record: &[ModActivation]) {
        for entry in &mut self.entries {
            entry.enabled = record
                .iter()
                .find(|r| r.id == entry.id)
                .is_none_or(|r| r.enabled);
        }
        if !self.entries.is_empty() {
            self.notifier.rows_changed(0, self.entries.len() - 1);
        }
    }

    /// Put back the flags of `record` after a failed commit. Entries missing
    /// from `record` keep their flag; recorded ids no longer installed are
    /// ignored.
    pub(crate) fn restore_activation(&mut self, record: &[ModActivation]) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let Some(previous) = record.iter().find(|r| r.id == entry.id) else {
                continue;
            };
            if entry.enabled != previous.enabled {
                entry.enabled = previous.enabled;
                self.notifier.rows_changed(index, index);
            }
        }
    }
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
