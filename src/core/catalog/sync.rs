//! Catalog reconciliation with the filesystem
//!
//! A full pass scans both locations, rebuilds the PC and SD lists from cached
//! metadata where possible, parses whatever is missing or invalid, and saves
//! the cache once at the end.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info};

use super::Catalog;
use crate::core::cache::SyncStats;
use crate::core::record::{CartridgeRecord, FileOperation, Location};
use crate::core::scanner;
use crate::core::xci;

/// What [`Catalog::refresh_game`] did to a record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Metadata was re-parsed from the file
    pub reparsed: bool,
    /// The identity was not in the cache before
    pub inserted_new: bool,
}

impl Catalog {
    /// Full reconciliation of both locations against the cache
    ///
    /// With `force`, every file is re-parsed. Checks `cancel` between items;
    /// a cancelled pass does not save the cache or mark the catalog loaded.
    pub fn load_all(&self, force: bool, cancel: &AtomicBool) -> SyncStats {
        let start = Instant::now();
        let mut stats = SyncStats::default();

        self.set_loaded(false);
        self.view.clear_all();
        self.view.set_status("Loading games..");

        let pc_paths = scanner::scan_pc(&self.settings.pc_folders);
        let sd_paths = self
            .settings
            .sd_root
            .as_deref()
            .map(scanner::scan_sd)
            .unwrap_or_default();

        stats.pc_files = pc_paths.len();
        stats.sd_files = sd_paths.len();

        {
            let mut pc = self.lock_list(Location::Pc);
            *pc = self.build_location_list(&pc_paths, Location::Pc, &mut stats);
        }
        {
            let mut sd = self.lock_list(Location::Sd);
            *sd = self.build_location_list(&sd_paths, Location::Sd, &mut stats);
        }

        let total = stats.files_scanned();
        let mut progress = 0;
        let mut dirty = false;
        self.view.set_progress(progress, total);

        for (location, paths) in [(Location::Pc, &pc_paths), (Location::Sd, &sd_paths)] {
            for path in paths {
                if cancel.load(Ordering::SeqCst) {
                    info!(progress, total, "reconciliation cancelled");
                    stats.cancelled = true;
                    stats.duration_ms = start.elapsed().as_millis() as u64;
                    return stats;
                }

                self.view.set_status(&format!(
                    "Processing [{}/{}] {}",
                    progress,
                    total,
                    path.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default()
                ));

                let Some(record) = self.take_for_refresh(location, path) else {
                    continue;
                };

                let (record, outcome) = self.refresh_game(record, force);
                if outcome.reparsed {
                    stats.parsed += 1;
                    dirty = true;
                }
                if outcome.inserted_new {
                    stats.added_to_cache += 1;
                    dirty = true;
                }

                self.store_refreshed(location, path, &record);

                if location == self.view.displayed_location() {
                    self.view.add_item(&record);
                }

                progress += 1;
                self.view.set_progress(progress, total);
            }
        }

        if dirty {
            stats.saved = self.persist();
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        self.view.set_status("");
        self.set_loaded(true);

        info!(
            pc = stats.pc_files,
            sd = stats.sd_files,
            parsed = stats.parsed,
            added = stats.added_to_cache,
            duration_ms = stats.duration_ms,
            "reconciliation complete"
        );
        stats
    }

    /// Build a location list from discovered paths
    ///
    /// Called with the location lock held; takes the cache lock inside it.
    fn build_location_list(
        &self,
        paths: &[PathBuf],
        location: Location,
        stats: &mut SyncStats,
    ) -> Vec<CartridgeRecord> {
        let cache = self.lock_cache();

        paths
            .iter()
            .map(|path| {
                let identity = self.identity.derive(path);
                match cache.find(&identity) {
                    Some(cached) => {
                        stats.cache_hits += 1;
                        let mut record = cached.clone();
                        record.mark_discovered(path, location);
                        record
                    }
                    None => CartridgeRecord::discovered(identity, path, location),
                }
            })
            .collect()
    }

    fn take_for_refresh(&self, location: Location, path: &Path) -> Option<CartridgeRecord> {
        self.lock_list(location)
            .iter()
            .find(|r| r.path() == path)
            .cloned()
    }

    fn store_refreshed(&self, location: Location, path: &Path, record: &CartridgeRecord) {
        let mut list = self.lock_list(location);
        if let Some(slot) = list.iter_mut().find(|r| r.path() == path) {
            *slot = record.clone();
        }
    }

    /// Bring one record up to date and upsert it into the cache
    ///
    /// Metadata is parsed only when `force` is set or the record is invalid,
    /// and only if the file still exists. Presence flags are recomputed from
    /// both live lists, any pending file operation is cleared, and the record
    /// is marked for retention.
    pub fn refresh_game(
        &self,
        mut record: CartridgeRecord,
        force: bool,
    ) -> (CartridgeRecord, RefreshOutcome) {
        let mut outcome = RefreshOutcome::default();

        if force || !record.is_valid() {
            let path = record.path().to_path_buf();
            if path.is_file() {
                debug!(path = %path.display(), force, "parsing cartridge metadata");
                let mut metadata = self.parser.parse(&path);
                metadata.certificate = xci::read_certificate(&path);
                metadata.normalize_title_id();
                record.metadata = metadata;
                record.identity = self.identity.derive(&path);
                record.recompute_flags();
                record.refreshed_at = Some(Utc::now());
                outcome.reparsed = true;
            }
        }

        record.on_pc = self.contains(Location::Pc, &record.identity);
        record.on_sd = self.contains(Location::Sd, &record.identity);
        record.retain_in_cache = true;
        record.file_operation = FileOperation::default();

        outcome.inserted_new = self.upsert(record.clone());
        (record, outcome)
    }
}
