//! Instance storage
//!
//! Where an instance keeps its version documents. The composer only talks to
//! [`LayerStore`]; [`InstanceDir`] is the on-disk layout:
//!
//! ```text
//! <instance>/version.json      base layer
//! <instance>/patches/<id>.json loader and external layers
//! <instance>/custom.json       custom override layer
//! <instance>/order.json        ordering overrides
//! <instance>/mods/             mod files
//! ```

use crate::core::error::{ComposeError, ComposeResult};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Store key of the base layer
pub const BASE_LAYER_ID: &str = "version";
/// Store key of the custom override layer
pub const CUSTOM_LAYER_ID: &str = "custom";
/// Store key of the ordering overrides document
pub const ORDER_DOCUMENT_ID: &str = "order";

/// Source and sink of an instance's version documents
pub trait LayerStore {
    /// Read one document; `None` when it does not exist.
    fn load(&self, layer_id: &str) -> ComposeResult<Option<Value>>;

    /// Ids of the loader layers installed in the instance.
    fn loader_layer_ids(&self) -> ComposeResult<Vec<String>>;

    fn persist(&mut self, layer_id: &str, document: &Value) -> ComposeResult<()>;

    /// Drop a document. Dropping a missing document is not an error.
    fn discard(&mut self, layer_id: &str) -> ComposeResult<()>;
}

/// Instance directory on disk
#[derive(Debug, Clone)]
pub struct InstanceDir {
    root: PathBuf,
}

impl InstanceDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    pub fn patches_dir(&self) -> PathBuf {
        self.root.join("patches")
    }

    /// Name of the instance (directory name)
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn document_path(&self, layer_id: &str) -> ComposeResult<PathBuf> {
        if layer_id.is_empty()
            || layer_id.contains(['/', '\\'])
            || layer_id.starts_with('.')
        {
            return Err(ComposeError::store(layer_id, "invalid document id"));
        }

        Ok(match layer_id {
            BASE_LAYER_ID | CUSTOM_LAYER_ID | ORDER_DOCUMENT_ID => {
                self.root.join(format!("{}.json", layer_id))
            }
            _ => self.patches_dir().join(format!("{}.json", layer_id)),
        })
    }
}

impl LayerStore for InstanceDir {
    fn load(&self, layer_id: &str) -> ComposeResult<Option<Value>> {
        let path = self.document_path(layer_id)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ComposeError::store(layer_id, e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ComposeError::parse(layer_id, e))
    }

    fn loader_layer_ids(&self) -> ComposeResult<Vec<String>> {
        let dir = self.patches_dir();
        let mut ids = Vec::new();

        if !dir.exists() {
            return Ok(ids);
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| ComposeError::store("patches", e))?;
        for entry in entries {
            let path = entry.map_err(|e| ComposeError::store("patches", e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }

        // Directory iteration order is platform dependent
        ids.sort();
        Ok(ids)
    }

    fn persist(&mut self, layer_id: &str, document: &Value) -> ComposeResult<()> {
        let path = self.document_path(layer_id)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ComposeError::store(layer_id, e))?;
        }

        let content = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, content).map_err(|e| ComposeError::store(layer_id, e))?;

        tracing::debug!("Saved {:?}", path);
        Ok(())
    }

    fn discard(&mut self, layer_id: &str) -> ComposeResult<()> {
        let path = self.document_path(layer_id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Removed {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ComposeError::store(layer_id, e)),
        }
    }
}
