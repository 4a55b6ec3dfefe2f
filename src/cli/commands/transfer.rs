//! `sgm copy|move|delete|trim` commands - File operations on games
//!
//! Each command runs a full load, executes the operation on disk, then hands
//! the completed operation back to the catalog so the lists and the cache
//! reflect it.

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{find_game, load_catalog, open_catalog, resolve_config};
use crate::cli::{GlobalOpts, LocationArg};
use crate::core::catalog::{ApplyOutcome, Catalog};
use crate::core::config::Config;
use crate::core::record::{readable_size, CartridgeRecord, FileOpKind, Location};
use crate::core::transfer;

#[derive(clap::Args, Debug)]
pub struct TransferArgs {
    /// Game path, file name, title or identity prefix
    pub game: String,

    /// Destination location
    #[arg(long, value_enum)]
    pub to: LocationArg,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Game path, file name, title or identity prefix
    pub game: String,

    /// Location to delete from
    #[arg(long, value_enum, conflicts_with = "all")]
    pub from: Option<LocationArg>,

    /// Delete every copy and forget the game
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct TrimArgs {
    /// Game path, file name, title or identity prefix
    pub game: String,

    /// Location of the copy to trim
    #[arg(long, value_enum)]
    pub from: Option<LocationArg>,
}

pub fn run_copy(args: TransferArgs, global: &GlobalOpts) -> Result<()> {
    run_transfer(args, FileOpKind::Copy, global)
}

pub fn run_move(args: TransferArgs, global: &GlobalOpts) -> Result<()> {
    run_transfer(args, FileOpKind::Move, global)
}

fn run_transfer(args: TransferArgs, kind: FileOpKind, global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let catalog = open_catalog(global, &config);
    load_catalog(catalog.clone(), false)?;

    let destination = Location::from(args.to);
    let record = find_game(&catalog, &args.game, Some(destination.opposite()))?;
    if catalog.contains(destination, &record.identity) {
        return Err(miette::miette!(
            "{} is already on {}",
            record.display_name(),
            destination
        ));
    }

    let root = destination_root(&config, destination);
    let bytes = perform(&catalog, record.clone(), kind, destination, root)?;

    if !global.quiet {
        let verb = if kind == FileOpKind::Copy { "Copied" } else { "Moved" };
        println!(
            "{} {} {} to {} ({})",
            style("✓").green(),
            verb,
            style(record.display_name()).cyan(),
            destination,
            readable_size(bytes)
        );
    }
    Ok(())
}

pub fn run_delete(args: DeleteArgs, global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let catalog = open_catalog(global, &config);
    load_catalog(catalog.clone(), false)?;

    let from = args.from.map(Location::from);
    let record = find_game(&catalog, &args.game, from)?;

    if args.all {
        let copies = catalog.find_all(&record.identity);
        for copy in copies {
            let location = copy.location;
            perform(&catalog, copy, FileOpKind::PermanentDelete, location, None)?;
        }
        if !global.quiet {
            println!(
                "{} Deleted every copy of {}",
                style("✓").green(),
                style(record.display_name()).cyan()
            );
        }
        return Ok(());
    }

    if from.is_none() && catalog.contains(record.location.opposite(), &record.identity) {
        return Err(miette::miette!(
            help = "pass --from pc|sd, or --all to delete both copies",
            "{} is on both PC and SD",
            record.display_name()
        ));
    }

    let location = record.location;
    let name = record.display_name();
    perform(&catalog, record, FileOpKind::Delete, location, None)?;
    if !global.quiet {
        println!(
            "{} Deleted {} from {}",
            style("✓").green(),
            style(name).cyan(),
            location
        );
    }
    Ok(())
}

pub fn run_trim(args: TrimArgs, global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let catalog = open_catalog(global, &config);
    load_catalog(catalog.clone(), false)?;

    let record = find_game(&catalog, &args.game, args.from.map(Into::into))?;
    if record.is_trimmed {
        if !global.quiet {
            println!(
                "{} {} is already trimmed",
                style("·").dim(),
                record.display_name()
            );
        }
        return Ok(());
    }

    let location = record.location;
    let name = record.display_name();
    let removed = perform(&catalog, record, FileOpKind::Trim, location, None)?;
    if !global.quiet {
        println!(
            "{} Trimmed {} ({} freed)",
            style("✓").green(),
            style(name).cyan(),
            readable_size(removed)
        );
    }
    Ok(())
}

fn destination_root(config: &Config, location: Location) -> Option<PathBuf> {
    match location {
        Location::Pc => config.pc_folders.first().cloned(),
        Location::Sd => config.sd_root.clone(),
    }
}

/// Plan, execute and apply one file operation
fn perform(
    catalog: &Catalog,
    mut record: CartridgeRecord,
    kind: FileOpKind,
    destination: Location,
    destination_root: Option<PathBuf>,
) -> Result<u64> {
    record.file_operation =
        transfer::plan(&record, kind, destination, destination_root.as_deref()).into_diagnostic()?;
    let bytes = transfer::execute(catalog.transfer_gate(), &mut record).into_diagnostic()?;

    match catalog.apply_file_operation(&record) {
        ApplyOutcome::Applied => Ok(bytes),
        ApplyOutcome::Skipped => Err(miette::miette!(
            "{} finished on disk but the catalog could not be updated",
            kind
        )),
        ApplyOutcome::Rejected => Err(miette::miette!(
            "{}",
            crate::core::transfer::TRANSFER_BUSY_MESSAGE
        )),
    }
}
