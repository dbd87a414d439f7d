//! CLI module
//!
//! Command-line interface for gcompose.

mod args;

pub use args::{Args, Commands, Direction};

use crate::config::{self, Config};
use crate::core::instance::InstanceDir;
use crate::core::mods::{FsModDirectory, JarDescriber, ModRegistry, format_size};
use crate::core::version::{MoveDirection, VersionComposer};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Run one command
pub fn run(mut args: Args, config: &Config) -> Result<()> {
    if args.list {
        return list_instances(config);
    }

    let command = args.command.take().unwrap_or(Commands::Show);
    let mut composer = open(&args, config)?;

    match command {
        Commands::Show => show(&composer),
        Commands::Layers => layers(&composer),
        Commands::Libs => libs(&composer),
        Commands::Mods => mods(&composer),
        Commands::Check => {
            composer.finalize()?;
            println!("✅ {} is ready to launch", composer.merged().id());
            Ok(())
        }
        Commands::Enable { index } => set_enabled(&mut composer, index, true),
        Commands::Disable { index } => set_enabled(&mut composer, index, false),
        Commands::Install { file } => {
            composer.install_mod(&file)?;
            composer.reapply_if_needed()?;
            mods(&composer)
        }
        Commands::Delete { first, last } => {
            composer.delete_mods(first, last.unwrap_or(first))?;
            composer.reapply_if_needed()?;
            mods(&composer)
        }
        Commands::Move { index, direction } => {
            let direction = match direction {
                Direction::Up => MoveDirection::Up,
                Direction::Down => MoveDirection::Down,
            };
            if !composer.move_layer(index, direction)? {
                println!("Layer {} stays in place.", index);
            }
            layers(&composer)
        }
        Commands::Remove { index } => {
            composer.remove(index)?;
            layers(&composer)
        }
        Commands::ResetOrder => {
            composer.reset_order()?;
            layers(&composer)
        }
        Commands::Revert => {
            if composer.revert_to_base()? {
                println!("✅ Custom layer removed.");
            } else {
                println!("No custom layer to remove.");
            }
            layers(&composer)
        }
    }
}

/// Resolve the instance directory from a name or a path
fn instance_dir(args: &Args, config: &Config) -> Result<PathBuf> {
    let instance = args
        .instance
        .as_deref()
        .context("No instance given. Use --instance <name|path>.")?;

    let as_path = PathBuf::from(instance);
    if as_path.is_dir() {
        return Ok(as_path);
    }

    let named = config::instances_dir(config).join(instance);
    if named.is_dir() {
        Ok(named)
    } else {
        anyhow::bail!("Instance '{}' not found", instance)
    }
}

/// Load an instance's layers and mods
fn open(args: &Args, config: &Config) -> Result<VersionComposer> {
    let dir = InstanceDir::new(instance_dir(args, config)?);
    tracing::info!("Opening instance '{}'", dir.name());

    let registry = ModRegistry::new(
        Box::new(FsModDirectory::new(dir.mods_dir(), &config.mods.extensions)),
        Box::new(JarDescriber),
    );
    let mut composer = VersionComposer::new(Box::new(dir), registry, config.compose.clone());

    let mut external = config.compose.external_layers.clone();
    external.extend(args.external.iter().cloned());

    composer
        .reload(args.only_vanilla || config.compose.only_vanilla, &external)
        .context("Failed to load version layers")?;
    composer
        .mods_directories_changed()
        .context("Failed to scan mods")?;
    composer.reapply_if_needed()?;

    Ok(composer)
}

/// List all available instances
fn list_instances(config: &Config) -> Result<()> {
    let dir = config::instances_dir(config);
    let mut names = Vec::new();

    if dir.exists() {
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.join("version.json").exists() {
                if let Some(name) = path.file_name() {
                    names.push(name.to_string_lossy().to_string());
                }
            }
        }
    }
    names.sort();

    if names.is_empty() {
        println!("📦 No instances found in {:?}.", dir);
        return Ok(());
    }

    println!("📦 Instances ({}):", names.len());
    for name in names {
        println!("   {}", name);
    }
    Ok(())
}

fn show(composer: &VersionComposer) -> Result<()> {
    let merged = composer.merged();
    println!("📦 Version: {}", merged.id());
    if let Some(version_type) = merged.version_type() {
        println!("   Type: {}", version_type);
    }
    println!("   Main class: {}", merged.main_class().unwrap_or("-"));
    println!("   Assets: {}", merged.assets().unwrap_or("-"));
    if let Some(time) = merged.release_time() {
        println!("   Released: {}", time);
    }
    if let Some(required) = merged.minimum_launcher_version() {
        println!("   Minimum launcher version: {}", required);
    }
    if !merged.tweakers().is_empty() {
        println!("   Tweakers: {}", merged.tweakers().join(", "));
    }
    println!("   Arguments: {}", merged.launch_arguments());
    println!(
        "   Libraries: {} normal, {} native",
        composer.active_normal_libs().len(),
        composer.active_native_libs().len()
    );
    println!(
        "   Mods: {} of {} enabled",
        merged.active_mods().count(),
        composer.mods().len()
    );
    Ok(())
}

fn layers(composer: &VersionComposer) -> Result<()> {
    println!("📚 Layers ({}):", composer.layer_count());
    for (index, layer) in composer.layers().enumerate() {
        let marker = if composer.is_reorderable(index) { " " } else { "*" };
        println!(
            "  {}{:>2} {} {} [{}]",
            marker,
            index,
            layer.display_name(),
            layer.version().unwrap_or_default(),
            layer.id()
        );
    }
    Ok(())
}

fn libs(composer: &VersionComposer) -> Result<()> {
    println!("📚 Libraries ({}):", composer.active_normal_libs().len());
    for lib in composer.active_normal_libs() {
        println!("   {}", lib.name);
    }
    println!("🔧 Natives ({}):", composer.active_native_libs().len());
    for lib in composer.active_native_libs() {
        match lib.native_classifier() {
            Some(classifier) => println!("   {} ({})", lib.name, classifier),
            None => println!("   {}", lib.name),
        }
    }
    Ok(())
}

fn mods(composer: &VersionComposer) -> Result<()> {
    let registry = composer.mods();
    if registry.is_empty() {
        println!("🧩 No mods installed.");
        return Ok(());
    }

    println!("🧩 Mods ({}):", registry.len());
    for (index, entry) in registry.entries().iter().enumerate() {
        let artifact = entry.artifact();
        println!(
            "  {:>2} [{}] {} {} ({})",
            index,
            if entry.enabled() { "x" } else { " " },
            artifact.name,
            artifact.version,
            format_size(artifact.size)
        );
    }
    Ok(())
}

fn set_enabled(composer: &mut VersionComposer, index: usize, enabled: bool) -> Result<()> {
    if !composer.set_mod_enabled(index, enabled)? {
        println!("Mod {} already {}.", index, if enabled { "enabled" } else { "disabled" });
    }
    composer.reapply_if_needed()?;
    mods(composer)
}
