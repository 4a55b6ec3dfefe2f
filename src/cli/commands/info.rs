//! `sgm info` command - Show details for one game

use chrono::Local;
use console::style;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{find_game, load_catalog, open_catalog, resolve_config};
use crate::cli::table::GameRow;
use crate::cli::{GlobalOpts, LocationArg, OutputFormat};
use crate::core::record::{readable_size, CartridgeRecord};
use crate::core::transfer::TRANSFER_BUSY_MESSAGE;

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    /// Game path, file name, title or identity prefix
    pub game: String,

    /// Only look on this location
    #[arg(long, short = 'l', value_enum)]
    pub location: Option<LocationArg>,

    /// Re-read this game's metadata from disk
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Serialize)]
struct GameDetails<'a> {
    #[serde(flatten)]
    row: GameRow,
    developer: &'a str,
    revision: &'a str,
    capacity: &'a str,
    master_key_revision: &'a str,
    sdk_version: &'a str,
    product_code: &'a str,
    pc_path: String,
    sd_path: String,
    refreshed_at: Option<String>,
}

impl<'a> GameDetails<'a> {
    fn new(record: &'a CartridgeRecord) -> Self {
        let meta = &record.metadata;
        Self {
            row: GameRow::from(record),
            developer: &meta.developer,
            revision: &meta.revision,
            capacity: &meta.capacity,
            master_key_revision: &meta.master_key_revision,
            sdk_version: &meta.sdk_version,
            product_code: &meta.product_code,
            pc_path: record.pc_path.display().to_string(),
            sd_path: record.sd_path.display().to_string(),
            refreshed_at: record.refreshed_at.map(|t| t.to_rfc3339()),
        }
    }
}

pub fn run(args: InfoArgs, global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let catalog = open_catalog(global, &config);
    let (pipeline, _) = load_catalog(catalog.clone(), false)?;

    let location = args.location.map(Into::into);
    let mut record = find_game(&catalog, &args.game, location)?;

    if args.refresh {
        if !pipeline.request_refresh(record.clone()) {
            return Err(miette::miette!("{}", TRANSFER_BUSY_MESSAGE));
        }
        pipeline.wait_refresh();
        record = find_game(&catalog, &record.path().display().to_string(), Some(record.location))?;
    }

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&GameDetails::new(&record)).into_diagnostic()?;
            println!("{}", json);
        }
        _ => print_details(&record),
    }
    Ok(())
}

fn print_details(record: &CartridgeRecord) {
    let meta = &record.metadata;

    println!("{}", style(record.display_name()).bold());
    println!("{}", style("─".repeat(40)).dim());
    print_field("Identity", record.identity.as_str());
    print_field("Location", &record.location.to_string());
    print_field("Path", &record.path().display().to_string());
    print_field("Title ID", &meta.title_id);
    print_field("Developer", &meta.developer);
    print_field("Product code", &meta.product_code);
    print_field("Revision", &meta.revision);
    print_field("Capacity", &meta.capacity);
    print_field("Master key", &meta.master_key_revision);
    print_field("SDK version", &meta.sdk_version);
    print_field("Size", &readable_size(meta.size));
    print_field("Used size", &readable_size(meta.used_size));

    let trimmed = if record.is_trimmed {
        style("yes").green()
    } else {
        style("no").yellow()
    };
    println!("  {:<14} {}", "Trimmed:", trimmed);

    let cert = if record.has_unique_certificate {
        style("unique").green()
    } else {
        style("wiped").dim()
    };
    println!("  {:<14} {}", "Certificate:", cert);

    print_field("On PC", if record.on_pc { "yes" } else { "no" });
    print_field("On SD", if record.on_sd { "yes" } else { "no" });
    if let Some(at) = record.refreshed_at {
        print_field(
            "Refreshed",
            &at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        );
    }
}

fn print_field(label: &str, value: &str) {
    let value = if value.is_empty() { "-" } else { value };
    println!("  {:<14} {}", format!("{}:", label), value);
}
