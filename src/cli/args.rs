//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    cache::CacheCommands,
    config::ConfigCommands,
    info::InfoArgs,
    list::ListArgs,
    transfer::{DeleteArgs, TransferArgs, TrimArgs},
};
use crate::core::record::Location;

#[derive(Parser)]
#[command(name = "sgm")]
#[command(author, version, about = "Switch Game Manager")]
#[command(long_about = "Catalog XCI cartridge images across PC folders and an SD card, and copy, move, delete or trim them.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Config file (default: user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cache file (overrides config)
    #[arg(long, global = true)]
    pub cache: Option<PathBuf>,

    /// PC game folder, repeatable (overrides config)
    #[arg(long = "pc", global = true, value_name = "DIR")]
    pub pc_folders: Vec<PathBuf>,

    /// SD card root (overrides config)
    #[arg(long = "sd", global = true, value_name = "DIR")]
    pub sd_root: Option<PathBuf>,

    /// Location shown by default
    #[arg(long, global = true)]
    pub view: Option<LocationArg>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan both locations and list games
    ///
    /// The built-in reader only decodes the plaintext XCI header. Title and
    /// title id are stored encrypted, so cached entries are never complete
    /// and every image is re-read on each run.
    List(ListArgs),

    /// Show details for one game
    Info(InfoArgs),

    /// Copy a game to the other location
    Copy(TransferArgs),

    /// Move a game to the other location
    Move(TransferArgs),

    /// Delete a game from one or both locations
    Delete(DeleteArgs),

    /// Trim unused padding from a game image
    Trim(TrimArgs),

    /// Metadata cache management
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Table for terminals
    #[default]
    Auto,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
}

/// Game location as a command-line value
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationArg {
    Pc,
    Sd,
}

impl From<LocationArg> for Location {
    fn from(arg: LocationArg) -> Self {
        match arg {
            LocationArg::Pc => Location::Pc,
            LocationArg::Sd => Location::Sd,
        }
    }
}
