//! gcompose library root
//!
//! Version layer composition and mod activation for Minecraft instances.

pub mod config;
pub mod core;
pub mod util;

pub use config::Config;
pub use crate::core::error::{ComposeError, ComposeResult};
pub use crate::core::version::{MergedVersion, VersionComposer, VersionLayer};
