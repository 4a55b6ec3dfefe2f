//! `sgm list` command - Scan both locations and list games

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{load_catalog, open_catalog, resolve_config};
use crate::cli::table::{render_games, summary, GameRow};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::record::{CartridgeRecord, Location};

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Which list to print (default: the configured view)
    #[arg(long, short = 'l', value_enum)]
    pub location: Option<ListSource>,

    /// Re-read every file instead of using cached metadata
    #[arg(long)]
    pub force: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListSource {
    Pc,
    Sd,
    /// Every record in the metadata cache
    Cache,
}

pub fn run(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let catalog = open_catalog(global, &config);
    let (_pipeline, stats) = load_catalog(catalog.clone(), args.force)?;

    let (records, label): (Vec<CartridgeRecord>, String) = match args.location {
        Some(ListSource::Cache) => (catalog.cached_games(), "cache".to_string()),
        Some(ListSource::Pc) => (catalog.games(Location::Pc), Location::Pc.to_string()),
        Some(ListSource::Sd) => (catalog.games(Location::Sd), Location::Sd.to_string()),
        None => {
            let location = config.default_view();
            (catalog.games(location), location.to_string())
        }
    };

    let rows: Vec<GameRow> = records.iter().map(GameRow::from).collect();
    let text = render_games(&rows, global.format).into_diagnostic()?;
    println!("{}", text);

    if global.format == OutputFormat::Auto && !global.quiet {
        println!();
        println!("{}", summary(rows.len(), &label));
        if stats.parsed > 0 {
            println!(
                "{} Read metadata for {} file(s) in {}ms",
                style("✓").green(),
                stats.parsed,
                stats.duration_ms
            );
        }
    }

    Ok(())
}
