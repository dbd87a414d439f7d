//! Core module
//!
//! Version layers, their composition, and the mods that ride along.

pub mod error;
pub mod instance;
pub mod library;
pub mod mods;
pub mod projection;
pub mod version;
