//! Filesystem mod directory and jar describer

use super::{ModArtifact, ModDescriber, ModDirectory, RescanDelta};
use crate::core::error::{ComposeError, ComposeResult};
use crate::util::hash::sha1_file;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Mods folder of an instance, scanned with glob patterns per extension
pub struct FsModDirectory {
    dir: PathBuf,
    extensions: Vec<String>,
    known: BTreeSet<PathBuf>,
}

impl FsModDirectory {
    pub fn new(dir: impl Into<PathBuf>, extensions: &[String]) -> Self {
        Self {
            dir: dir.into(),
            extensions: extensions.to_vec(),
            known: BTreeSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn list(&self) -> ComposeResult<BTreeSet<PathBuf>> {
        let mut found = BTreeSet::new();
        if !self.dir.exists() {
            return Ok(found);
        }

        let base = glob::Pattern::escape(&self.dir.to_string_lossy());
        for ext in &self.extensions {
            let pattern = format!("{}/*.{}", base, ext);
            let paths = glob::glob(&pattern).map_err(|e| ComposeError::store("mods", e))?;
            for path in paths {
                let path = path.map_err(|e| ComposeError::store("mods", e))?;
                if path.is_file() {
                    found.insert(path);
                }
            }
        }
        Ok(found)
    }
}

impl ModDirectory for FsModDirectory {
    fn rescan(&mut self) -> ComposeResult<RescanDelta> {
        let current = self.list()?;
        let delta = RescanDelta {
            added: current.difference(&self.known).cloned().collect(),
            removed: self.known.difference(&current).cloned().collect(),
        };
        self.known = current;
        Ok(delta)
    }

    fn adopt(&mut self, file: &Path) -> ComposeResult<PathBuf> {
        let name = file
            .file_name()
            .ok_or_else(|| ComposeError::store("mods", format!("{:?} has no file name", file)))?;
        fs::create_dir_all(&self.dir).map_err(|e| ComposeError::store("mods", e))?;

        let dest = self.dir.join(name);
        if dest != file {
            fs::copy(file, &dest).map_err(|e| ComposeError::store("mods", e))?;
        }
        self.known.insert(dest.clone());
        Ok(dest)
    }

    fn remove(&mut self, path: &Path) -> ComposeResult<()> {
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ComposeError::store("mods", e)),
        }
        self.known.remove(path);
        Ok(())
    }

    fn defer(&mut self, path: &Path) {
        self.known.remove(path);
    }
}

/// Fabric mod metadata from fabric.mod.json
#[derive(Debug, Deserialize)]
struct FabricModJson {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    description: String,
}

/// Describes mod jars from their embedded metadata
pub struct JarDescriber;

impl JarDescriber {
    /// Read mod metadata from a JAR file
    fn read_metadata(path: &Path) -> Option<FabricModJson> {
        let file = fs::File::open(path).ok()?;
        let mut archive = ZipArchive::new(file).ok()?;
        let mut entry = archive.by_name("fabric.mod.json").ok()?;

        let mut contents = String::new();
        entry.read_to_string(&mut contents).ok()?;
        serde_json::from_str(&contents).ok()
    }
}

impl ModDescriber for JarDescriber {
    fn describe(&self, path: &Path) -> ComposeResult<ModArtifact> {
        let describe_error = |reason: String| ComposeError::Describe {
            path: path.to_path_buf(),
            reason,
        };

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| describe_error("file name is not valid UTF-8".to_string()))?
            .to_string();

        let metadata = fs::metadata(path).map_err(|e| describe_error(e.to_string()))?;
        if !metadata.is_file() {
            return Err(describe_error("not a file".to_string()));
        }

        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| DateTime::from_timestamp(d.as_secs() as i64, 0))
            .unwrap_or_else(Utc::now);

        let sha1 = sha1_file(path).map_err(|e| describe_error(e.to_string()))?;

        let clean_name = file_name
            .rsplit_once('.')
            .map(|(stem, _)| stem.to_string())
            .unwrap_or_else(|| file_name.clone());

        let (mod_id, name, version, description) = match Self::read_metadata(path) {
            Some(meta) => {
                let name = if meta.name.is_empty() {
                    clean_name
                } else {
                    meta.name
                };
                let version = if meta.version.is_empty() {
                    "Unknown".to_string()
                } else {
                    meta.version
                };
                (meta.id.filter(|id| !id.is_empty()), name, version, meta.description)
            }
            None => (None, clean_name, "Unknown".to_string(), String::new()),
        };

        Ok(ModArtifact {
            path: path.to_path_buf(),
            file_name,
            mod_id,
            name,
            version,
            description,
            size: metadata.len(),
            modified_at,
            sha1: Some(sha1),
        })
    }
}
