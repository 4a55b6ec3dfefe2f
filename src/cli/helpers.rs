//! Shared helper functions for CLI commands
//!
//! This module contains utility functions that are used across multiple
//! command modules to avoid code duplication.

use miette::{IntoDiagnostic, Result};
use std::sync::Arc;

use crate::cli::output::ConsoleView;
use crate::cli::GlobalOpts;
use crate::core::cache::SyncStats;
use crate::core::catalog::{Catalog, CatalogSettings};
use crate::core::config::Config;
use crate::core::pipeline::{PipelineEvent, RefreshPipeline};
use crate::core::record::{CartridgeRecord, Location};
use crate::core::transfer::TRANSFER_BUSY_MESSAGE;

/// Resolve configuration: files, then environment, then command-line flags
pub fn resolve_config(global: &GlobalOpts) -> Result<Config> {
    let mut config = Config::load(global.config.as_deref()).into_diagnostic()?;
    config.merge(Config {
        pc_folders: global.pc_folders.clone(),
        sd_root: global.sd_root.clone(),
        default_view: global.view.map(Location::from),
        cache_file: global.cache.clone(),
    });
    Ok(config)
}

/// Open the catalog with a console view on stderr
pub fn open_catalog(global: &GlobalOpts, config: &Config) -> Arc<Catalog> {
    let view = Arc::new(ConsoleView::new(config.default_view(), global.quiet));
    Arc::new(Catalog::new(CatalogSettings::from(config), view))
}

/// Run a full load in the background and wait for it
pub fn load_catalog(catalog: Arc<Catalog>, force: bool) -> Result<(RefreshPipeline, SyncStats)> {
    let (pipeline, events) = RefreshPipeline::new(catalog);
    if !pipeline.start_full_load(force) {
        return Err(miette::miette!("{}", TRANSFER_BUSY_MESSAGE));
    }
    pipeline.wait_full_load();

    let stats = events
        .try_iter()
        .find_map(|event| match event {
            PipelineEvent::FullLoadFinished(stats) => Some(stats),
            _ => None,
        })
        .unwrap_or_default();
    Ok((pipeline, stats))
}

/// Look up a game or fail with a helpful message
pub fn find_game(
    catalog: &Catalog,
    query: &str,
    location: Option<Location>,
) -> Result<CartridgeRecord> {
    catalog.find_game(query, location).ok_or_else(|| match location {
        Some(location) => miette::miette!("No game matching '{}' on {}", query, location),
        None => miette::miette!("No game matching '{}'", query),
    })
}

/// Truncate a string to max_len characters, adding "..." if truncated
///
/// Useful for table columns that need fixed-width output.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Escape a string for CSV output
///
/// Handles commas, quotes, and newlines according to RFC 4180.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("ゼルダの伝説", 5), "ゼル...");
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("with\nnewline"), "\"with\nnewline\"");
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "pc_folders: [/from-file]\nsd_root: /file-sd\n").unwrap();

        let global = GlobalOpts {
            config: Some(path),
            sd_root: Some(PathBuf::from("/flag-sd")),
            view: Some(crate::cli::args::LocationArg::Sd),
            ..GlobalOpts::default()
        };
        let config = resolve_config(&global).unwrap();

        assert_eq!(config.pc_folders, vec![PathBuf::from("/from-file")]);
        assert_eq!(config.sd_root, Some(PathBuf::from("/flag-sd")));
        assert_eq!(config.default_view(), Location::Sd);
    }
}
