//! Persistent metadata cache
//!
//! This module keeps previously parsed cartridge metadata across runs:
//! - Records are keyed by cartridge identity, at most one per identity
//! - The cache file is a pretty-printed JSON array, rewritten wholesale on save
//! - Records not marked `retain_in_cache` are pruned right before saving
//! - Saving an empty (pruned-to-empty) cache never clobbers the file on disk
//!
//! IMPORTANT: a missing cache file is an empty cache, a malformed one is an
//! error. The caller decides how to recover from [`CacheError::Corrupt`].

mod types;

pub use types::*;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::identity::CartridgeId;
use crate::core::record::CartridgeRecord;

/// Default cache file name
pub const CACHE_FILE: &str = "cache.json";

/// Errors that can occur while loading or saving the cache
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to access cache file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cache file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Load records from a cache file
///
/// Returns an empty list if the file does not exist.
pub fn load(path: &Path) -> Result<Vec<CartridgeRecord>, CacheError> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Remove every record not marked for retention, returning how many went
pub fn prune(records: &mut Vec<CartridgeRecord>) -> usize {
    let mut removed = 0;
    for i in (0..records.len()).rev() {
        if !records[i].retain_in_cache {
            debug!(identity = %records[i].identity, title = %records[i].metadata.title, "pruning cache entry");
            records.remove(i);
            removed += 1;
        }
    }
    removed
}

/// Prune and write records to a cache file
///
/// Returns `Ok(false)` without touching the file when nothing is left to save.
pub fn save(path: &Path, records: &mut Vec<CartridgeRecord>) -> Result<bool, CacheError> {
    prune(records);

    if records.is_empty() {
        debug!(path = %path.display(), "cache is empty, leaving file untouched");
        return Ok(false);
    }

    let json = serde_json::to_string_pretty(records)?;
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    // Write next to the target and rename so a crash never leaves half a file
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;

    info!(path = %path.display(), records = records.len(), "saved cache");
    Ok(true)
}

/// First record with the given identity
///
/// Unknown identities never match.
pub fn find_by_identity<'a>(
    identity: &CartridgeId,
    records: &'a [CartridgeRecord],
) -> Option<&'a CartridgeRecord> {
    if identity.is_unknown() {
        return None;
    }
    records.iter().find(|r| &r.identity == identity)
}

/// The identity-keyed metadata cache bound to its file
#[derive(Debug)]
pub struct MetadataCache {
    path: PathBuf,
    records: Vec<CartridgeRecord>,
}

impl MetadataCache {
    /// An empty cache that will save to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Load the cache from `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let records = load(&path)?;
        debug!(path = %path.display(), records = records.len(), "loaded cache");
        Ok(Self { path, records })
    }

    /// Load the cache, starting empty if the file is corrupt
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(path.clone()) {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable cache, it will be rebuilt");
                Self::new(path)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[CartridgeRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn find(&self, identity: &CartridgeId) -> Option<&CartridgeRecord> {
        find_by_identity(identity, &self.records)
    }

    pub fn find_mut(&mut self, identity: &CartridgeId) -> Option<&mut CartridgeRecord> {
        if identity.is_unknown() {
            return None;
        }
        self.records.iter_mut().find(|r| &r.identity == identity)
    }

    /// Replace any record with the same identity by `record`
    ///
    /// Returns true when the identity was not cached before. The new record
    /// inherits the other location's path from the one it replaces.
    pub fn upsert(&mut self, mut record: CartridgeRecord) -> bool {
        if record.identity.is_unknown() {
            return false;
        }

        let previous = self
            .records
            .iter()
            .position(|r| r.identity == record.identity);

        match previous {
            Some(index) => {
                let old = self.records.remove(index);
                record.merge_known_paths(&old);
                self.records.retain(|r| r.identity != record.identity);
                self.records.push(record);
                false
            }
            None => {
                self.records.push(record);
                true
            }
        }
    }

    /// Drop every in-memory record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Prune and persist; see [`save`]
    pub fn save(&mut self) -> Result<bool, CacheError> {
        save(&self.path, &mut self.records)
    }

    /// Delete the cache file from disk
    pub fn remove_file(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Summary of the cached records and the file on disk
    pub fn statistics(&self) -> CacheStats {
        let file = fs::metadata(&self.path).ok();

        CacheStats {
            total_records: self.records.len(),
            valid_records: self.records.iter().filter(|r| r.is_valid()).count(),
            trimmed: self.records.iter().filter(|r| r.is_trimmed).count(),
            on_pc: self.records.iter().filter(|r| r.on_pc).count(),
            on_sd: self.records.iter().filter(|r| r.on_sd).count(),
            file_size_bytes: file.as_ref().map(|m| m.len()).unwrap_or(0),
            last_saved: file
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from),
        }
    }
}
