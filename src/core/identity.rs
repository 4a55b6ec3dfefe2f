//! Cartridge identity derivation
//!
//! A cartridge is matched across scans and locations by an identity derived
//! from its file name. Two files with the same base name are treated as the
//! same game, wherever they live. Derivation sits behind [`IdentityStrategy`]
//! so a content-based identity can be swapped in without touching the catalog.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Sentinel identity for files that could not be identified
pub const UNKNOWN_IDENTITY: &str = "UNKNOWN";

/// Stable key used to match the same cartridge across scans and locations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartridgeId(String);

impl CartridgeId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The sentinel returned when a file does not exist
    pub fn unknown() -> Self {
        Self(UNKNOWN_IDENTITY.to_string())
    }

    /// Unknown identities never match anything, so they always force a re-scan
    pub fn is_unknown(&self) -> bool {
        self.0.is_empty() || self.0 == UNKNOWN_IDENTITY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for tables
    pub fn short(&self) -> &str {
        if self.0.len() > 12 {
            &self.0[..12]
        } else {
            &self.0
        }
    }
}

impl Default for CartridgeId {
    fn default() -> Self {
        Self::unknown()
    }
}

impl fmt::Display for CartridgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Strategy for deriving a cartridge identity from a file on disk
pub trait IdentityStrategy: Send + Sync {
    fn derive(&self, path: &Path) -> CartridgeId;
}

/// SHA-256 of the file's base name with the extension stripped
#[derive(Debug, Default, Clone, Copy)]
pub struct FileNameSha256;

impl IdentityStrategy for FileNameSha256 {
    fn derive(&self, path: &Path) -> CartridgeId {
        if !path.is_file() {
            return CartridgeId::unknown();
        }

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        CartridgeId(hash_name(&stem))
    }
}

/// Compute the lowercase hex SHA-256 digest of a name
pub fn hash_name(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    format!("{:x}", hasher.finalize())
}
