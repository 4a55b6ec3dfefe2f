//! The game catalog
//!
//! A [`Catalog`] owns the three collections the tool keeps in sync:
//! - the PC list (games found under the configured PC folders)
//! - the SD list (games found in the SD root)
//! - the metadata cache (one record per identity, persisted as JSON)
//!
//! Each collection has its own lock. The only nesting allowed is a location
//! lock held while taking the cache lock (location outer, cache inner), which
//! happens while building location lists during a full pass.

mod apply;
mod sync;

pub use apply::ApplyOutcome;
pub use sync::RefreshOutcome;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::core::cache::{CacheError, CacheStats, MetadataCache};
use crate::core::config::Config;
use crate::core::identity::{CartridgeId, FileNameSha256, IdentityStrategy};
use crate::core::record::{CartridgeRecord, Location};
use crate::core::transfer::{TransferGate, TRANSFER_BUSY_MESSAGE};
use crate::core::view::CatalogView;
use crate::core::xci::{MetadataParser, XciHeaderParser};

/// Where the catalog looks for games and keeps its cache
#[derive(Debug, Clone, Default)]
pub struct CatalogSettings {
    pub pc_folders: Vec<PathBuf>,
    pub sd_root: Option<PathBuf>,
    pub cache_file: PathBuf,
}

impl From<&Config> for CatalogSettings {
    fn from(config: &Config) -> Self {
        Self {
            pc_folders: config.pc_folders.clone(),
            sd_root: config.sd_root.clone(),
            cache_file: config.cache_file(),
        }
    }
}

/// The PC list, SD list and metadata cache with their locks
pub struct Catalog {
    settings: CatalogSettings,
    pc: Mutex<Vec<CartridgeRecord>>,
    sd: Mutex<Vec<CartridgeRecord>>,
    cache: Mutex<MetadataCache>,
    identity: Box<dyn IdentityStrategy>,
    parser: Box<dyn MetadataParser>,
    view: Arc<dyn CatalogView>,
    transfer: TransferGate,
    loaded: AtomicBool,
}

impl Catalog {
    /// Create a catalog and load its cache
    ///
    /// An unreadable cache file is logged and treated as empty.
    pub fn new(settings: CatalogSettings, view: Arc<dyn CatalogView>) -> Self {
        let cache = MetadataCache::open_or_empty(&settings.cache_file);
        Self {
            settings,
            pc: Mutex::new(Vec::new()),
            sd: Mutex::new(Vec::new()),
            cache: Mutex::new(cache),
            identity: Box::new(FileNameSha256),
            parser: Box::new(XciHeaderParser),
            view,
            transfer: TransferGate::new(),
            loaded: AtomicBool::new(false),
        }
    }

    /// Replace the identity strategy
    pub fn with_identity(mut self, identity: Box<dyn IdentityStrategy>) -> Self {
        self.identity = identity;
        self
    }

    /// Replace the metadata parser
    pub fn with_parser(mut self, parser: Box<dyn MetadataParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    pub fn view(&self) -> &Arc<dyn CatalogView> {
        &self.view
    }

    pub fn transfer_gate(&self) -> &TransferGate {
        &self.transfer
    }

    /// Derive the identity of a file with the configured strategy
    pub fn derive_identity(&self, path: &Path) -> CartridgeId {
        self.identity.derive(path)
    }

    /// Whether a full pass has completed and no refresh is pending
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub(crate) fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::SeqCst);
    }

    /// Reject the request when a file transfer is running
    ///
    /// Returns true when the caller may proceed.
    pub fn ensure_no_transfer(&self) -> bool {
        if self.transfer.is_active() {
            self.view.set_status(TRANSFER_BUSY_MESSAGE);
            return false;
        }
        true
    }

    fn list(&self, location: Location) -> &Mutex<Vec<CartridgeRecord>> {
        match location {
            Location::Pc => &self.pc,
            Location::Sd => &self.sd,
        }
    }

    pub(crate) fn lock_list(&self, location: Location) -> MutexGuard<'_, Vec<CartridgeRecord>> {
        lock_or_recover(self.list(location))
    }

    pub(crate) fn lock_cache(&self) -> MutexGuard<'_, MetadataCache> {
        lock_or_recover(&self.cache)
    }

    /// Snapshot of one location list
    pub fn games(&self, location: Location) -> Vec<CartridgeRecord> {
        self.lock_list(location).clone()
    }

    /// Snapshot of the cache collection
    pub fn cached_games(&self) -> Vec<CartridgeRecord> {
        self.lock_cache().records().to_vec()
    }

    pub fn cache_statistics(&self) -> CacheStats {
        self.lock_cache().statistics()
    }

    /// Whether a location list holds a record with this identity
    pub fn contains(&self, location: Location, identity: &CartridgeId) -> bool {
        !identity.is_unknown()
            && self
                .lock_list(location)
                .iter()
                .any(|r| &r.identity == identity)
    }

    /// Every record with this identity across both lists, PC first
    pub fn find_all(&self, identity: &CartridgeId) -> Vec<CartridgeRecord> {
        let mut found: Vec<CartridgeRecord> = self
            .lock_list(Location::Pc)
            .iter()
            .filter(|r| &r.identity == identity)
            .cloned()
            .collect();
        found.extend(
            self.lock_list(Location::Sd)
                .iter()
                .filter(|r| &r.identity == identity)
                .cloned(),
        );
        found
    }

    /// Find a game by path, file name, title or identity prefix
    ///
    /// Searches `location` only when given, otherwise PC before SD.
    pub fn find_game(&self, query: &str, location: Option<Location>) -> Option<CartridgeRecord> {
        let locations = match location {
            Some(l) => vec![l],
            None => vec![Location::Pc, Location::Sd],
        };

        let query_path = Path::new(query);
        let lower = query.to_lowercase();

        for loc in locations {
            let list = self.lock_list(loc);
            let hit = list
                .iter()
                .find(|r| r.path() == query_path)
                .or_else(|| {
                    list.iter().find(|r| {
                        r.path()
                            .file_name()
                            .map_or(false, |n| n.to_string_lossy().to_lowercase() == lower)
                    })
                })
                .or_else(|| {
                    list.iter().find(|r| {
                        r.path()
                            .file_stem()
                            .map_or(false, |n| n.to_string_lossy().to_lowercase() == lower)
                    })
                })
                .or_else(|| {
                    list.iter().find(|r| {
                        !r.metadata.title.is_empty() && r.metadata.title.to_lowercase() == lower
                    })
                })
                .or_else(|| {
                    if query.len() >= 6 {
                        list.iter().find(|r| r.identity.as_str().starts_with(&lower))
                    } else {
                        None
                    }
                });

            if let Some(record) = hit {
                return Some(record.clone());
            }
        }
        None
    }

    /// Insert or replace the cached record for this identity
    ///
    /// This is the only path that adds records to the cache. Returns true when
    /// the identity was not cached before.
    pub fn upsert(&self, record: CartridgeRecord) -> bool {
        self.lock_cache().upsert(record)
    }

    /// Apply a change to the cached record for an identity, if any
    pub(crate) fn update_cached<F>(&self, identity: &CartridgeId, update: F)
    where
        F: FnOnce(&mut CartridgeRecord),
    {
        if let Some(record) = self.lock_cache().find_mut(identity) {
            update(record);
        }
    }

    /// Prune and persist the cache
    pub fn save_cache(&self) -> Result<bool, CacheError> {
        self.lock_cache().save()
    }

    /// Persist the cache, logging instead of failing
    pub(crate) fn persist(&self) -> bool {
        match self.save_cache() {
            Ok(saved) => saved,
            Err(e) => {
                warn!(error = %e, "failed to save cache");
                self.view.set_status(&format!("Failed to save cache: {}", e));
                false
            }
        }
    }

    /// Reload the cache from disk, replacing the in-memory collection
    pub fn reload_cache(&self) -> Result<usize, CacheError> {
        let loaded = MetadataCache::open(&self.settings.cache_file)?;
        let count = loaded.len();
        *self.lock_cache() = loaded;
        Ok(count)
    }

    /// Forget every cached record and delete the cache file
    pub fn reset_cache(&self) -> Result<(), CacheError> {
        let mut cache = self.lock_cache();
        cache.clear();
        cache.remove_file()?;
        debug!(path = %cache.path().display(), "cache reset");
        Ok(())
    }

    /// Replace the entry for the same file in the record's location list
    ///
    /// Used when a single refresh completes. The view is updated when the
    /// record's location is the one on display.
    pub fn replace_in_location(&self, record: &CartridgeRecord) {
        let old = {
            let mut list = self.lock_list(record.location);
            let old = list
                .iter()
                .position(|r| same_entry(r, record.location, record))
                .map(|i| list.remove(i));
            list.push(record.clone());
            old
        };

        if record.location == self.view.displayed_location() {
            if let Some(old) = &old {
                self.view.remove_item(old);
            }
            self.view.add_item(record);
        }

        self.view
            .set_status(&format!("Refreshed {}", record.display_name()));
    }

    /// Mirror the displayed location list to the view
    pub fn refresh_view(&self) {
        if !self.is_loaded() {
            return;
        }
        self.view.clear_all();
        for record in self.games(self.view.displayed_location()) {
            self.view.add_item(&record);
        }
    }
}

/// Whether a list entry in `location` stands for `record`
///
/// In the record's own list that is the entry for the same file, since a
/// recursive PC scan can list two files with one identity. In the opposite
/// list it is the copy with the same identity.
pub(crate) fn same_entry(entry: &CartridgeRecord, location: Location, record: &CartridgeRecord) -> bool {
    if record.location == location {
        entry.path() == record.path()
    } else {
        !record.identity.is_unknown() && entry.identity == record.identity
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
