//! `sgm cache` command - Manage the metadata cache
//!
//! The cache is a JSON file holding one record per game identity, so that
//! listing a library does not re-read every image. It is user-local and can
//! always be rebuilt from the game files.

use chrono::Local;
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{open_catalog, resolve_config};
use crate::cli::GlobalOpts;
use crate::core::pipeline::{PipelineEvent, RefreshPipeline};
use crate::core::record::readable_size;
use crate::core::transfer::TRANSFER_BUSY_MESSAGE;

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache statistics
    Status,

    /// Discard the cache and re-read every game
    Rebuild,

    /// Delete the cache file
    Clear,
}

pub fn run(cmd: CacheCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CacheCommands::Status => run_status(global),
        CacheCommands::Rebuild => run_rebuild(global),
        CacheCommands::Clear => run_clear(global),
    }
}

fn run_status(global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let catalog = open_catalog(global, &config);
    let stats = catalog.cache_statistics();

    println!("{}", style("Cache Status").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Location:        {}", config.cache_file().display());
    println!("  Records:         {}", style(stats.total_records).cyan());
    println!("  Complete:        {}", style(stats.valid_records).cyan());
    println!("  Trimmed:         {}", style(stats.trimmed).cyan());
    println!("  On PC:           {}", style(stats.on_pc).cyan());
    println!("  On SD:           {}", style(stats.on_sd).cyan());
    println!(
        "  File size:       {}",
        style(readable_size(stats.file_size_bytes)).cyan()
    );
    match stats.last_saved {
        Some(at) => println!(
            "  Last saved:      {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("  Last saved:      {}", style("never").dim()),
    }

    Ok(())
}

fn run_rebuild(global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let catalog = open_catalog(global, &config);
    let (pipeline, events) = RefreshPipeline::new(catalog);

    if !global.quiet {
        println!("{} Rebuilding cache...", style("→").blue());
    }
    if !pipeline.rebuild_cache().into_diagnostic()? {
        return Err(miette::miette!("{}", TRANSFER_BUSY_MESSAGE));
    }
    pipeline.wait_full_load();

    let stats = events
        .try_iter()
        .filter_map(|event| match event {
            PipelineEvent::FullLoadFinished(stats) => Some(stats),
            _ => None,
        })
        .last()
        .unwrap_or_default();

    if !global.quiet {
        println!(
            "{} Cache rebuilt in {}ms",
            style("✓").green(),
            stats.duration_ms
        );
        println!("  Files scanned:   {}", stats.files_scanned());
        println!("  Games cached:    {}", stats.added_to_cache);
    }

    Ok(())
}

fn run_clear(global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let catalog = open_catalog(global, &config);
    catalog.reset_cache().into_diagnostic()?;

    if !global.quiet {
        println!(
            "{} Cache cleared: {}",
            style("✓").green(),
            config.cache_file().display()
        );
    }
    Ok(())
}
