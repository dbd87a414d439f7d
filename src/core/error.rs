//! Error taxonomy for version composition
//!
//! Every core operation returns `ComposeResult<T>`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ComposeError {
    /// A version document could not be turned into a layer.
    #[error("failed to parse layer '{layer}': {reason}")]
    Parse { layer: String, reason: String },

    /// The base layer is missing or unreadable; nothing can be composed.
    #[error("failed to load base layer: {0}")]
    Load(String),

    /// The fold rejected a layer. The previous merged result is kept.
    #[error("failed to merge layer '{layer}': {reason}")]
    Merge { layer: String, reason: String },

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("index {index} out of range (len {len})")]
    Range { index: usize, len: usize },

    #[error("mod '{0}' is already installed")]
    DuplicateMod(String),

    #[error("failed to describe mod at {path:?}: {reason}")]
    Describe { path: PathBuf, reason: String },

    #[error("incomplete configuration: {0}")]
    IncompleteConfiguration(String),

    /// A persistence collaborator failed to read, write or drop a document.
    #[error("store error for '{layer}': {reason}")]
    Store { layer: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ComposeResult<T> = Result<T, ComposeError>;

impl ComposeError {
    pub(crate) fn parse(layer: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ComposeError::Parse {
            layer: layer.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn store(layer: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ComposeError::Store {
            layer: layer.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn range(index: usize, len: usize) -> Self {
        ComposeError::Range { index, len }
    }
}
