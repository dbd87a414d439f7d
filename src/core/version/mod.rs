//! Version composition module
//!
//! Version layers, the merged configuration they fold into, and the composer
//! that owns an instance's layer stack.

mod composer;
mod layer;
mod merged;

pub use composer::{LayerOrigin, MoveDirection, VersionComposer};
pub use layer::{LibraryCoordinate, LibraryDescriptor, ModActivation, OsRule, Rule, VersionLayer};
pub use merged::MergedVersion;

use serde::{Deserialize, Serialize};

/// Release channel of a version
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Release,
    Snapshot,
    OldBeta,
    OldAlpha,
}

impl std::fmt::Display for VersionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VersionType::Release => "release",
            VersionType::Snapshot => "snapshot",
            VersionType::OldBeta => "old_beta",
            VersionType::OldAlpha => "old_alpha",
        };
        f.write_str(name)
    }
}
