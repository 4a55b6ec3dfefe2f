//! `sgm config` command - Configuration display
//!
//! Shows the effective configuration after merging the config file,
//! environment variables and command-line flags.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::resolve_config;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration values
    Show,

    /// Show paths to the config and cache files
    Path,
}

/// Run a config subcommand
pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show => run_show(global),
        ConfigCommands::Path => run_path(global),
    }
}

fn run_show(global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&config).into_diagnostic()?;
            println!("{}", json);
            return Ok(());
        }
        OutputFormat::Tsv | OutputFormat::Csv | OutputFormat::Md => {
            print!("{}", config.to_yaml().into_diagnostic()?);
            return Ok(());
        }
        OutputFormat::Auto => {}
    }

    println!("{}", style("Effective Configuration").bold().underlined());
    println!();

    if config.pc_folders.is_empty() {
        print_config_value("pc_folders", None);
    } else {
        println!("  {}:", style("pc_folders").cyan());
        for folder in &config.pc_folders {
            println!("    - {}", folder.display());
        }
    }
    let sd_root = config.sd_root.as_ref().map(|p| p.display().to_string());
    print_config_value("sd_root", sd_root.as_deref());
    print_config_value("default_view", Some(config.default_view().as_str()));
    print_config_value(
        "cache_file",
        Some(&config.cache_file().display().to_string()),
    );

    println!();
    println!("{}", style("Config Sources (in priority order):").dim());
    println!("  1. Command-line flags (--pc, --sd, --view, --cache)");
    println!("  2. Environment (SGM_PC_FOLDERS, SGM_SD_ROOT, SGM_DEFAULT_VIEW, SGM_CACHE_FILE)");
    match &global.config {
        Some(path) => println!("  3. {}", path.display()),
        None => match Config::global_config_path() {
            Some(path) => println!("  3. {}", path.display()),
            None => println!("  3. (no user config directory)"),
        },
    }

    Ok(())
}

fn run_path(global: &GlobalOpts) -> Result<()> {
    let config = resolve_config(global)?;
    let config_path = global.config.clone().or_else(Config::global_config_path);

    match config_path {
        Some(path) => {
            let marker = if path.exists() {
                style("✓").green()
            } else {
                style("✗").dim()
            };
            println!("{} config: {}", marker, path.display());
        }
        None => println!("{} config: (no user config directory)", style("✗").dim()),
    }

    let cache = config.cache_file();
    let marker = if cache.exists() {
        style("✓").green()
    } else {
        style("✗").dim()
    };
    println!("{} cache:  {}", marker, cache.display());

    Ok(())
}

fn print_config_value(key: &str, value: Option<&str>) {
    match value {
        Some(v) => println!("  {}: {}", style(key).cyan(), v),
        None => println!("  {}: {}", style(key).cyan(), style("(not set)").dim()),
    }
}
