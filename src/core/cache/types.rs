//! Cache and reconciliation result types

use chrono::{DateTime, Utc};

/// Statistics from a full reconciliation pass
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub pc_files: usize,
    pub sd_files: usize,
    pub cache_hits: usize,
    pub parsed: usize,
    pub added_to_cache: usize,
    pub saved: bool,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl SyncStats {
    pub fn files_scanned(&self) -> usize {
        self.pc_files + self.sd_files
    }
}

/// Cache statistics
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub total_records: usize,
    pub valid_records: usize,
    pub trimmed: usize,
    pub on_pc: usize,
    pub on_sd: usize,
    pub file_size_bytes: u64,
    pub last_saved: Option<DateTime<Utc>>,
}
