//! Table formatting for game lists
//!
//! One row type feeds every output format: a `tabled` table for terminals,
//! markdown, TSV and CSV for piping, JSON for programs.

use console::style;
use serde::Serialize;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{escape_csv, truncate_str};
use crate::cli::OutputFormat;
use crate::core::record::{readable_size, CartridgeRecord, Location};

const NAME_WIDTH: usize = 40;

const HEADERS: [&str; 9] = [
    "ID", "NAME", "TITLE ID", "SIZE", "USED", "TRIMMED", "CERT", "PC", "SD",
];

/// A game flattened for display
#[derive(Debug, Clone, Serialize)]
pub struct GameRow {
    pub identity: String,
    pub name: String,
    pub title_id: String,
    pub path: String,
    pub location: Location,
    pub size: u64,
    pub used_size: u64,
    pub trimmed: bool,
    pub unique_certificate: bool,
    pub on_pc: bool,
    pub on_sd: bool,
}

impl From<&CartridgeRecord> for GameRow {
    fn from(record: &CartridgeRecord) -> Self {
        Self {
            identity: record.identity.to_string(),
            name: record.display_name(),
            title_id: record.metadata.title_id.clone(),
            path: record.path().display().to_string(),
            location: record.location,
            size: record.metadata.size,
            used_size: record.metadata.used_size,
            trimmed: record.is_trimmed,
            unique_certificate: record.has_unique_certificate,
            on_pc: record.on_pc,
            on_sd: record.on_sd,
        }
    }
}

impl GameRow {
    fn cells(&self, short: bool) -> Vec<String> {
        let identity = if short {
            self.identity.chars().take(12).collect()
        } else {
            self.identity.clone()
        };
        let name = if short {
            truncate_str(&self.name, NAME_WIDTH)
        } else {
            self.name.clone()
        };
        vec![
            identity,
            name,
            dash_if_empty(&self.title_id),
            readable_size(self.size),
            readable_size(self.used_size),
            yes_no(self.trimmed),
            yes_no(self.unique_certificate),
            yes_no(self.on_pc),
            yes_no(self.on_sd),
        ]
    }
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.to_string()
}

fn dash_if_empty(value: &str) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value.to_string()
    }
}

/// Render rows in the requested format
pub fn render_games(rows: &[GameRow], format: OutputFormat) -> Result<String, serde_json::Error> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(rows)?,
        OutputFormat::Tsv => delimited(rows, "\t", |s| s.replace('\t', " ")),
        OutputFormat::Csv => delimited(rows, ",", escape_csv),
        OutputFormat::Md => tabled_table(rows, true),
        OutputFormat::Auto => tabled_table(rows, false),
    };
    Ok(text)
}

fn delimited<F>(rows: &[GameRow], separator: &str, escape: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut lines = vec![HEADERS.join(separator).to_lowercase().replace(' ', "_")];
    for row in rows {
        let cells: Vec<String> = row.cells(false).iter().map(|c| escape(c)).collect();
        lines.push(cells.join(separator));
    }
    lines.join("\n")
}

fn tabled_table(rows: &[GameRow], markdown: bool) -> String {
    let mut builder = Builder::default();
    builder.push_record(HEADERS);
    for row in rows {
        builder.push_record(row.cells(true));
    }

    let mut table = builder.build();
    if markdown {
        table.with(Style::markdown());
    } else {
        table.with(Style::rounded());
    }
    table.to_string()
}

/// One-line summary printed under human-readable tables
pub fn summary(count: usize, location: &str) -> String {
    format!("{} game(s) on {}", style(count).cyan(), location)
}
