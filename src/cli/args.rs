//! CLI argument definitions
//!
//! Uses clap derive macros for argument parsing.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// gcompose - inspect and edit the version layers of Minecraft instances
#[derive(Parser, Debug)]
#[command(name = "gcompose")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Instance name or path to an instance directory
    #[arg(short, long, global = true)]
    pub instance: Option<String>,

    /// Load only the base layer and the custom layer
    #[arg(long, global = true)]
    pub only_vanilla: bool,

    /// Extra layer to load after the loader layers (repeatable)
    #[arg(short, long = "external", global = true)]
    pub external: Vec<String>,

    /// List all instances
    #[arg(short, long)]
    pub list: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand (default: show)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the merged version
    Show,
    /// List the layer stack
    Layers,
    /// List the active libraries
    Libs,
    /// List installed mods
    Mods,
    /// Check the merged version is launchable
    Check,
    /// Enable a mod
    Enable { index: usize },
    /// Disable a mod
    Disable { index: usize },
    /// Install a mod file into the instance
    Install { file: PathBuf },
    /// Delete mods (inclusive range)
    Delete { first: usize, last: Option<usize> },
    /// Move a layer up or down
    Move {
        index: usize,
        #[arg(value_enum)]
        direction: Direction,
    },
    /// Remove a layer
    Remove { index: usize },
    /// Restore the default layer order
    ResetOrder,
    /// Remove the custom override layer
    Revert,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Direction {
    Up,
    Down,
}
