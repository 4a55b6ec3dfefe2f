//! Background refresh jobs
//!
//! Two jobs keep the catalog current, each on its own worker thread and never
//! running concurrently with itself:
//! - the full load, a single-slot runner; starting it while busy is a no-op
//! - the single refresh, one consumer draining a FIFO queue of records
//!
//! Refresh requests are queued data independent of the job. A request made
//! while the full load runs waits in the queue and is picked up when the full
//! load completes. Completion is reported on an `mpsc` channel.
//!
//! Lock order: the queue lock is never held while taking catalog locks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::core::cache::{CacheError, SyncStats};
use crate::core::catalog::{lock_or_recover, Catalog};
use crate::core::identity::CartridgeId;
use crate::core::record::CartridgeRecord;

/// Completion notices from the background jobs
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A full load finished or was cancelled
    FullLoadFinished(SyncStats),
    /// One queued record was re-parsed and placed back in its list
    Refreshed { identity: CartridgeId, title: String },
    /// The refresh queue is empty and the cache was persisted
    RefreshQueueDrained { saved: bool },
}

#[derive(Default)]
struct RefreshQueue {
    pending: VecDeque<CartridgeRecord>,
    running: bool,
}

struct Shared {
    catalog: Arc<Catalog>,
    events: Sender<PipelineEvent>,
    full_busy: AtomicBool,
    cancel: AtomicBool,
    full_handle: Mutex<Option<JoinHandle<()>>>,
    queue: Mutex<RefreshQueue>,
    single_handle: Mutex<Option<JoinHandle<()>>>,
}

/// Runs full loads and single refreshes against a shared [`Catalog`]
pub struct RefreshPipeline {
    shared: Arc<Shared>,
}

impl RefreshPipeline {
    /// Create the pipeline and the receiving end of its event channel
    pub fn new(catalog: Arc<Catalog>) -> (Self, Receiver<PipelineEvent>) {
        let (events, receiver) = mpsc::channel();
        let shared = Arc::new(Shared {
            catalog,
            events,
            full_busy: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            full_handle: Mutex::new(None),
            queue: Mutex::new(RefreshQueue::default()),
            single_handle: Mutex::new(None),
        });
        (Self { shared }, receiver)
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.shared.catalog
    }

    /// Start a full reconciliation in the background
    ///
    /// Returns false if one is already running or a transfer is in progress.
    pub fn start_full_load(&self, force: bool) -> bool {
        let shared = &self.shared;
        if !shared.catalog.ensure_no_transfer() {
            return false;
        }

        let mut slot = lock_or_recover(&shared.full_handle);
        if shared
            .full_busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("full load already running, request dropped");
            return false;
        }
        shared.cancel.store(false, Ordering::SeqCst);

        let worker = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("sgm-full-load".to_owned())
            .spawn(move || {
                let stats = worker.catalog.load_all(force, &worker.cancel);
                worker.full_busy.store(false, Ordering::SeqCst);
                let cancelled = stats.cancelled;
                let _ = worker.events.send(PipelineEvent::FullLoadFinished(stats));
                if !cancelled {
                    Shared::kick_refresh(&worker);
                }
            });

        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to spawn full load worker");
                shared.full_busy.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    pub fn is_full_load_running(&self) -> bool {
        self.shared.full_busy.load(Ordering::SeqCst)
    }

    /// Block until the current full load, if any, has finished
    pub fn wait_full_load(&self) {
        let handle = lock_or_recover(&self.shared.full_handle).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("full load worker panicked");
                self.shared.full_busy.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Queue a record for a forced re-parse
    ///
    /// The refresh job starts if it is idle and no full load is running.
    /// Returns false if a transfer is in progress.
    pub fn request_refresh(&self, record: CartridgeRecord) -> bool {
        let shared = &self.shared;
        if !shared.catalog.ensure_no_transfer() {
            return false;
        }

        debug!(game = %record.display_name(), "queued refresh");
        {
            let mut queue = lock_or_recover(&shared.queue);
            shared.catalog.set_loaded(false);
            queue.pending.push_back(record);
        }
        Shared::kick_refresh(shared);
        true
    }

    /// Records waiting in the refresh queue, excluding the one in flight
    pub fn pending_refreshes(&self) -> usize {
        lock_or_recover(&self.shared.queue).pending.len()
    }

    pub fn is_refresh_running(&self) -> bool {
        lock_or_recover(&self.shared.queue).running
    }

    /// Block until the refresh queue has drained
    pub fn wait_refresh(&self) {
        loop {
            let handle = lock_or_recover(&self.shared.single_handle).take();
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    warn!("refresh worker panicked");
                    lock_or_recover(&self.shared.queue).running = false;
                }
            }

            {
                let queue = lock_or_recover(&self.shared.queue);
                if !queue.running && queue.pending.is_empty() {
                    return;
                }
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    /// Block until both jobs are idle
    pub fn wait_idle(&self) {
        self.wait_full_load();
        self.wait_refresh();
    }

    /// Throw away the cache and reload everything
    ///
    /// A running full load is cancelled and joined first, so two passes never
    /// write the cache file at the same time. Returns whether the new load
    /// was started.
    pub fn rebuild_cache(&self) -> Result<bool, CacheError> {
        let shared = &self.shared;
        if !shared.catalog.ensure_no_transfer() {
            return Ok(false);
        }

        if self.is_full_load_running() {
            info!("cancelling running full load for rebuild");
        }
        shared.cancel.store(true, Ordering::SeqCst);
        self.wait_full_load();
        shared.cancel.store(false, Ordering::SeqCst);

        shared.catalog.reset_cache()?;
        Ok(self.start_full_load(false))
    }
}

impl Shared {
    /// Start the refresh worker if there is work and nothing blocks it
    fn kick_refresh(shared: &Arc<Shared>) {
        if shared.full_busy.load(Ordering::SeqCst) {
            return;
        }

        let mut slot = lock_or_recover(&shared.single_handle);
        {
            let mut queue = lock_or_recover(&shared.queue);
            if queue.running || queue.pending.is_empty() {
                return;
            }
            queue.running = true;
        }

        // The previous worker has already cleared `running` and is exiting
        if let Some(previous) = slot.take() {
            if previous.join().is_err() {
                warn!("refresh worker panicked");
            }
        }

        let worker = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("sgm-refresh".to_owned())
            .spawn(move || Shared::drain_queue(&worker));

        match spawned {
            Ok(handle) => *slot = Some(handle),
            Err(e) => {
                warn!(error = %e, "failed to spawn refresh worker");
                lock_or_recover(&shared.queue).running = false;
            }
        }
    }

    /// Consume the queue until it stays empty across a save
    ///
    /// `running` stays set while the cache is persisted, so a request made
    /// during the save is picked up by this worker instead of a second one.
    fn drain_queue(shared: &Arc<Shared>) {
        let catalog = &shared.catalog;

        loop {
            let next = lock_or_recover(&shared.queue).pending.pop_front();
            if let Some(record) = next {
                let (refreshed, _) = catalog.refresh_game(record, true);
                catalog.replace_in_location(&refreshed);
                let _ = shared.events.send(PipelineEvent::Refreshed {
                    identity: refreshed.identity.clone(),
                    title: refreshed.display_name(),
                });
                continue;
            }

            let saved = catalog.persist();
            {
                let mut queue = lock_or_recover(&shared.queue);
                if !queue.pending.is_empty() {
                    continue;
                }
                queue.running = false;
                if !shared.full_busy.load(Ordering::SeqCst) {
                    catalog.set_loaded(true);
                }
            }
            let _ = shared
                .events
                .send(PipelineEvent::RefreshQueueDrained { saved });
            return;
        }
    }
}
