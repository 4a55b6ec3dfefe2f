//! Cartridge records - the catalog entity and its pending file operation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::core::identity::CartridgeId;

/// Size of the cartridge certificate block
pub const CERT_LEN: usize = 512;

/// Required length of a title id for a record to be usable
pub const TITLE_ID_LEN: usize = 16;

/// One of the two physical storage roots tracked by the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    #[default]
    Pc,
    Sd,
}

impl Location {
    /// The other location
    pub fn opposite(&self) -> Self {
        match self {
            Location::Pc => Location::Sd,
            Location::Sd => Location::Pc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Pc => "pc",
            Location::Sd => "sd",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Pc => write!(f, "PC"),
            Location::Sd => write!(f, "SD"),
        }
    }
}

impl std::str::FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pc" | "local" => Ok(Location::Pc),
            "sd" | "sdcard" => Ok(Location::Sd),
            _ => Err(format!("Unknown location: {} (expected pc or sd)", s)),
        }
    }
}

/// Kind of file operation pending on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileOpKind {
    #[default]
    None,
    Copy,
    Move,
    /// Remove from one location only
    Delete,
    /// Remove from every location
    PermanentDelete,
    Trim,
}

impl fmt::Display for FileOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileOpKind::None => "none",
            FileOpKind::Copy => "copy",
            FileOpKind::Move => "move",
            FileOpKind::Delete => "delete",
            FileOpKind::PermanentDelete => "permanent delete",
            FileOpKind::Trim => "trim",
        };
        write!(f, "{}", s)
    }
}

/// A file operation requested on a record and its completion state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileOperation {
    pub kind: FileOpKind,
    pub source: Location,
    pub destination: Location,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub completed: bool,
}

impl FileOperation {
    pub fn is_pending(&self) -> bool {
        self.kind != FileOpKind::None
    }
}

/// Metadata extracted from the cartridge image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameMetadata {
    pub title: String,
    pub developer: String,
    pub revision: String,
    pub capacity: String,
    pub master_key_revision: String,
    pub sdk_version: String,
    pub title_id: String,
    pub product_code: String,
    /// Exact size of the image in bytes
    pub size: u64,
    /// Bytes actually used by cartridge data
    pub used_size: u64,
    pub certificate: Vec<u8>,
    pub icon: Option<Vec<u8>>,
}

impl Default for GameMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            developer: String::new(),
            revision: String::new(),
            capacity: String::new(),
            master_key_revision: String::new(),
            sdk_version: String::new(),
            title_id: String::new(),
            product_code: String::new(),
            size: 0,
            used_size: 0,
            certificate: vec![0; CERT_LEN],
            icon: None,
        }
    }
}

impl GameMetadata {
    /// Left-pad a short title id with zeros so it has the canonical width
    pub fn normalize_title_id(&mut self) {
        let trimmed = self.title_id.trim().trim_end_matches('\0');
        if !trimmed.is_empty() && trimmed.len() < TITLE_ID_LEN {
            self.title_id = format!("{:0>width$}", trimmed, width = TITLE_ID_LEN);
        } else {
            self.title_id = trimmed.to_string();
        }
    }
}

/// A catalog entry for one cartridge image at one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CartridgeRecord {
    pub identity: CartridgeId,
    pub pc_path: PathBuf,
    pub sd_path: PathBuf,
    /// Which location list this record belongs to
    pub location: Location,
    pub on_pc: bool,
    pub on_sd: bool,
    pub metadata: GameMetadata,
    pub is_trimmed: bool,
    pub has_unique_certificate: bool,
    pub retain_in_cache: bool,
    pub file_operation: FileOperation,
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl CartridgeRecord {
    /// An empty record for a freshly discovered file
    pub fn discovered(identity: CartridgeId, path: &Path, location: Location) -> Self {
        let mut record = Self {
            identity,
            ..Self::default()
        };
        record.mark_discovered(path, location);
        record
    }

    /// Reset the transient fields to reflect a discovery at `path`
    pub fn mark_discovered(&mut self, path: &Path, location: Location) {
        self.location = location;
        self.set_path(location, path.to_path_buf());
        self.on_pc = location == Location::Pc;
        self.on_sd = location == Location::Sd;
        self.file_operation = FileOperation::default();
    }

    /// Path of this record in its own location
    pub fn path(&self) -> &Path {
        self.path_in(self.location)
    }

    pub fn path_in(&self, location: Location) -> &Path {
        match location {
            Location::Pc => &self.pc_path,
            Location::Sd => &self.sd_path,
        }
    }

    pub fn set_path(&mut self, location: Location, path: PathBuf) {
        match location {
            Location::Pc => self.pc_path = path,
            Location::Sd => self.sd_path = path,
        }
    }

    pub fn is_present(&self, location: Location) -> bool {
        match location {
            Location::Pc => self.on_pc,
            Location::Sd => self.on_sd,
        }
    }

    pub fn set_present(&mut self, location: Location, present: bool) {
        match location {
            Location::Pc => self.on_pc = present,
            Location::Sd => self.on_sd = present,
        }
    }

    /// A record is usable without re-parsing when it has a title and a full title id
    pub fn is_valid(&self) -> bool {
        !self.metadata.title.trim().is_empty()
            && self.metadata.title_id.trim().len() == TITLE_ID_LEN
    }

    /// Recompute the flags derived from metadata
    pub fn recompute_flags(&mut self) {
        self.is_trimmed = is_trimmed(self.metadata.size, self.metadata.used_size);
        self.has_unique_certificate = has_unique_certificate(&self.metadata.certificate);
    }

    /// Carry over the path of a location this record does not know about
    pub fn merge_known_paths(&mut self, other: &CartridgeRecord) {
        if self.pc_path.as_os_str().is_empty() {
            self.pc_path = other.pc_path.clone();
        }
        if self.sd_path.as_os_str().is_empty() {
            self.sd_path = other.sd_path.clone();
        }
    }

    /// Title if known, otherwise the file name
    pub fn display_name(&self) -> String {
        if !self.metadata.title.is_empty() {
            return self.metadata.title.clone();
        }
        self.path()
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.identity.to_string())
    }
}

/// An image is trimmed when its size equals its used size
pub fn is_trimmed(size: u64, used_size: u64) -> bool {
    size == used_size
}

/// A certificate is unique unless every byte equals the first one
pub fn has_unique_certificate(certificate: &[u8]) -> bool {
    match certificate.first() {
        Some(first) => certificate.iter().any(|b| b != first),
        None => false,
    }
}

/// Format a byte count with binary units, e.g. "1.5 GB"
pub fn readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut order = 0;
    while size >= 1024.0 && order < UNITS.len() - 1 {
        order += 1;
        size /= 1024.0;
    }
    let formatted = format!("{:.2}", size);
    let formatted = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", formatted, UNITS[order])
}
