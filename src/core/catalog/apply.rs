//! Applying completed file operations to the catalog
//!
//! Every branch re-checks the disk state it depends on and does nothing when
//! that precondition does not hold, so applying the same operation twice is
//! harmless.

use std::fs;

use tracing::{debug, info};

use super::{same_entry, Catalog};
use crate::core::record::{is_trimmed, CartridgeRecord, FileOpKind, FileOperation, Location};

/// Result of [`Catalog::apply_file_operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The catalog was updated
    Applied,
    /// Nothing to do: no completed operation, or its precondition failed
    Skipped,
    /// A file transfer is in progress
    Rejected,
}

impl Catalog {
    /// Reflect a completed file operation in the location lists, the cache
    /// and the view
    pub fn apply_file_operation(&self, record: &CartridgeRecord) -> ApplyOutcome {
        if !self.ensure_no_transfer() {
            return ApplyOutcome::Rejected;
        }

        let op = &record.file_operation;
        if !op.completed || op.kind == FileOpKind::None {
            return ApplyOutcome::Skipped;
        }

        let outcome = match op.kind {
            FileOpKind::None => ApplyOutcome::Skipped,
            FileOpKind::Copy => self.apply_copy(record, op),
            FileOpKind::Move => self.apply_move(record, op),
            FileOpKind::Delete => self.apply_delete(record),
            FileOpKind::PermanentDelete => self.apply_permanent_delete(record),
            FileOpKind::Trim => self.apply_trim(record),
        };

        if outcome == ApplyOutcome::Applied {
            info!(kind = %op.kind, game = %record.display_name(), "applied file operation");
            self.persist();
        } else {
            debug!(kind = %op.kind, game = %record.display_name(), "file operation precondition not met");
        }
        outcome
    }

    fn remove_from(&self, location: Location, record: &CartridgeRecord) -> Option<CartridgeRecord> {
        let mut list = self.lock_list(location);
        list.iter()
            .position(|r| same_entry(r, location, record))
            .map(|i| list.remove(i))
    }

    /// Add a record to its location list, replacing the entry for the same file
    fn put_in(&self, location: Location, record: &CartridgeRecord) {
        let mut list = self.lock_list(location);
        list.retain(|r| !same_entry(r, location, record));
        list.push(record.clone());
    }

    fn update_in<F>(&self, location: Location, record: &CartridgeRecord, update: F) -> Option<CartridgeRecord>
    where
        F: FnOnce(&mut CartridgeRecord),
    {
        let mut list = self.lock_list(location);
        list.iter_mut()
            .find(|r| same_entry(r, location, record))
            .map(|r| {
                update(r);
                r.clone()
            })
    }

    /// Another file in `location` with the record's identity
    fn twin_in(&self, location: Location, record: &CartridgeRecord) -> Option<CartridgeRecord> {
        if record.identity.is_unknown() {
            return None;
        }
        self.lock_list(location)
            .iter()
            .find(|r| r.identity == record.identity && r.path() != record.path())
            .cloned()
    }

    /// Build the destination record for a copy or move and refresh it
    fn arrive(&self, record: &CartridgeRecord, op: &FileOperation) -> CartridgeRecord {
        let mut dest = record.clone();
        dest.file_operation = FileOperation::default();
        dest.location = op.destination;
        dest.set_path(op.destination, op.destination_path.clone());
        dest.set_path(op.source, op.source_path.clone());
        let (dest, _) = self.refresh_game(dest, true);
        dest
    }

    fn apply_copy(&self, record: &CartridgeRecord, op: &FileOperation) -> ApplyOutcome {
        if !op.destination_path.is_file() {
            return ApplyOutcome::Skipped;
        }

        let mut dest = self.arrive(record, op);
        dest.on_pc = true;
        dest.on_sd = true;
        self.put_in(op.destination, &dest);

        let dest_path = op.destination_path.clone();
        let destination = op.destination;
        let source = self.update_in(op.source, record, |r| {
            r.on_pc = true;
            r.on_sd = true;
            r.set_path(destination, dest_path);
            r.file_operation = FileOperation::default();
        });

        self.update_cached(&dest.identity, |r| {
            r.on_pc = true;
            r.on_sd = true;
        });

        if self.view.displayed_location() == op.destination {
            self.view.add_item(&dest);
        } else {
            self.view.refresh_item(source.as_ref().unwrap_or(record));
        }
        ApplyOutcome::Applied
    }

    fn apply_move(&self, record: &CartridgeRecord, op: &FileOperation) -> ApplyOutcome {
        if !op.destination_path.is_file() || op.source_path.exists() {
            return ApplyOutcome::Skipped;
        }

        // The source list no longer holds the game once the destination is refreshed
        let source = self
            .remove_from(op.source, record)
            .unwrap_or_else(|| record.clone());

        let mut dest = self.arrive(record, op);
        dest.set_present(op.destination, true);
        dest.set_present(op.source, false);
        dest.set_path(op.source, Default::default());
        self.put_in(op.destination, &dest);

        let (source_loc, dest_loc) = (op.source, op.destination);
        self.update_cached(&dest.identity, |r| {
            r.set_present(dest_loc, true);
            r.set_present(source_loc, false);
            r.set_path(source_loc, Default::default());
        });

        if self.view.displayed_location() == op.destination {
            self.view.add_item(&dest);
        } else {
            self.view.remove_item(&source);
        }
        ApplyOutcome::Applied
    }

    fn apply_delete(&self, record: &CartridgeRecord) -> ApplyOutcome {
        if record.path().exists() {
            return ApplyOutcome::Skipped;
        }

        let location = record.location;
        let removed = self.remove_from(location, record);
        let twin = self.twin_in(location, record);
        let still_here = twin.is_some();
        let sibling = self.update_in(location.opposite(), record, |r| {
            r.set_present(location, still_here);
        });

        let still_known = still_here || sibling.is_some();
        let twin_path = twin.map(|t| t.path().to_path_buf()).unwrap_or_default();
        self.update_cached(&record.identity, |r| {
            r.set_present(location, still_here);
            if r.path_in(location) == record.path() {
                r.set_path(location, twin_path);
            }
            if !still_known {
                r.retain_in_cache = false;
            }
        });

        if self.view.displayed_location() == location {
            self.view.remove_item(removed.as_ref().unwrap_or(record));
        } else if let Some(sibling) = &sibling {
            self.view.refresh_item(sibling);
        }
        ApplyOutcome::Applied
    }

    fn apply_permanent_delete(&self, record: &CartridgeRecord) -> ApplyOutcome {
        if record.path().exists() {
            return ApplyOutcome::Skipped;
        }

        let location = record.location;
        let removed = self.remove_from(location, record);

        let still_known = self.twin_in(location, record).is_some()
            || self.contains(location.opposite(), &record.identity);
        if !still_known {
            self.update_cached(&record.identity, |r| {
                r.on_pc = false;
                r.on_sd = false;
                r.retain_in_cache = false;
            });
        }

        if self.view.displayed_location() == location {
            self.view.remove_item(removed.as_ref().unwrap_or(record));
        }
        ApplyOutcome::Applied
    }

    fn apply_trim(&self, record: &CartridgeRecord) -> ApplyOutcome {
        let Ok(meta) = fs::metadata(record.path()) else {
            return ApplyOutcome::Skipped;
        };
        let size = meta.len();

        let set_size = |r: &mut CartridgeRecord| {
            r.metadata.size = size;
            r.is_trimmed = is_trimmed(size, r.metadata.used_size);
            r.file_operation = FileOperation::default();
        };

        let location = record.location;
        let updated = self.update_in(location, record, set_size);
        self.update_cached(&record.identity, |r| {
            if r.location == location && r.path() == record.path() {
                set_size(r);
            }
        });

        if self.view.displayed_location() == location {
            if let Some(updated) = &updated {
                self.view.refresh_item(updated);
            }
        }
        ApplyOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::Fixture;
    use super::*;
    use crate::core::view::tests::{RecordingView, ViewEvent};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn loaded(fx: &Fixture, view: Location) -> (Catalog, Arc<RecordingView>) {
        let view = Arc::new(RecordingView::new(view));
        let (catalog, _) = fx.catalog(Arc::clone(&view));
        catalog.load_all(false, &AtomicBool::new(false));
        view.events.lock().unwrap().clear();
        (catalog, view)
    }

    fn with_op(
        record: &CartridgeRecord,
        kind: FileOpKind,
        destination: Location,
        destination_path: &Path,
    ) -> CartridgeRecord {
        let mut record = record.clone();
        record.file_operation = FileOperation {
            kind,
            source: record.location,
            destination,
            source_path: record.path().to_path_buf(),
            destination_path: destination_path.to_path_buf(),
            completed: true,
        };
        record
    }

    #[test]
    fn test_move_sd_to_pc() {
        let fx = Fixture::new();
        let sd_path = fx.add_sd("zelda.xci");
        fx.add_pc("mario.xci");
        let (catalog, view) = loaded(&fx, Location::Pc);
        let cached_before = catalog.cached_games().len();

        let zelda = catalog.games(Location::Sd)[0].clone();
        let pc_path = fx.pc.join("zelda.xci");
        std::fs::rename(&sd_path, &pc_path).unwrap();

        let request = with_op(&zelda, FileOpKind::Move, Location::Pc, &pc_path);
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);

        assert!(catalog.games(Location::Sd).is_empty());
        let pc = catalog.games(Location::Pc);
        assert_eq!(pc.len(), 2);
        let moved = pc.iter().find(|r| r.identity == zelda.identity).unwrap();
        assert_eq!(moved.path(), pc_path.as_path());
        assert_eq!(moved.location, Location::Pc);
        assert!(moved.on_pc);
        assert!(!moved.on_sd);
        assert!(moved.is_valid());
        assert_eq!(catalog.cached_games().len(), cached_before);

        let cached = catalog
            .cached_games()
            .into_iter()
            .find(|r| r.identity == zelda.identity)
            .unwrap();
        assert!(cached.on_pc);
        assert!(!cached.on_sd);

        assert!(view
            .events()
            .contains(&ViewEvent::Add(pc_path.display().to_string())));
    }

    #[test]
    fn test_move_precondition_is_rechecked() {
        let fx = Fixture::new();
        fx.add_sd("zelda.xci");
        let (catalog, _) = loaded(&fx, Location::Pc);
        let zelda = catalog.games(Location::Sd)[0].clone();

        // Source still exists and destination was never written
        let request = with_op(&zelda, FileOpKind::Move, Location::Pc, &fx.pc.join("zelda.xci"));
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Skipped);
        assert_eq!(catalog.games(Location::Sd).len(), 1);
        assert!(catalog.games(Location::Pc).is_empty());
    }

    #[test]
    fn test_copy_pc_to_sd() {
        let fx = Fixture::new();
        let pc_path = fx.add_pc("mario.xci");
        let (catalog, view) = loaded(&fx, Location::Pc);
        let mario = catalog.games(Location::Pc)[0].clone();
        assert!(!mario.on_sd);

        let sd_path = fx.sd.join("mario.xci");
        std::fs::copy(&pc_path, &sd_path).unwrap();

        let request = with_op(&mario, FileOpKind::Copy, Location::Sd, &sd_path);
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);

        let pc = catalog.games(Location::Pc);
        let sd = catalog.games(Location::Sd);
        assert_eq!(pc.len(), 1);
        assert_eq!(sd.len(), 1);
        assert!(pc[0].on_pc && pc[0].on_sd);
        assert!(sd[0].on_pc && sd[0].on_sd);
        assert_eq!(sd[0].path(), sd_path.as_path());
        assert!(!pc[0].file_operation.is_pending());
        assert!(!sd[0].file_operation.is_pending());
        assert_eq!(catalog.cached_games().len(), 1);

        // PC is displayed, so the source entry is refreshed in place
        assert!(view
            .events()
            .contains(&ViewEvent::Refresh(pc_path.display().to_string())));

        // Applying again does not duplicate the destination entry
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);
        assert_eq!(catalog.games(Location::Sd).len(), 1);
    }

    #[test]
    fn test_delete_from_one_location() {
        let fx = Fixture::new();
        fx.add_pc("mario.xci");
        let sd_path = fx.add_sd("mario.xci");
        let (catalog, view) = loaded(&fx, Location::Sd);
        let sd_mario = catalog.games(Location::Sd)[0].clone();

        let request = with_op(&sd_mario, FileOpKind::Delete, Location::Sd, &sd_path);
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Skipped);

        std::fs::remove_file(&sd_path).unwrap();
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);

        assert!(catalog.games(Location::Sd).is_empty());
        let pc = catalog.games(Location::Pc);
        assert!(pc[0].on_pc);
        assert!(!pc[0].on_sd);

        let cached = &catalog.cached_games()[0];
        assert!(!cached.on_sd);
        assert!(cached.retain_in_cache);
        assert!(view
            .events()
            .contains(&ViewEvent::Remove(sd_path.display().to_string())));
    }

    #[test]
    fn test_delete_one_of_two_pc_files_with_same_name() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.pc.join("a")).unwrap();
        fs::create_dir_all(fx.pc.join("b")).unwrap();
        let kept = fx.add_pc("a/mario.xci");
        let gone = fx.add_pc("b/mario.xci");
        let (catalog, _) = loaded(&fx, Location::Pc);
        assert_eq!(catalog.games(Location::Pc).len(), 2);

        let doomed = catalog
            .games(Location::Pc)
            .into_iter()
            .find(|r| r.path() == gone.as_path())
            .unwrap();
        fs::remove_file(&gone).unwrap();

        let request = with_op(&doomed, FileOpKind::Delete, Location::Pc, &gone);
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);

        let paths: Vec<_> = catalog
            .games(Location::Pc)
            .iter()
            .map(|r| r.path().to_path_buf())
            .collect();
        assert_eq!(paths, vec![kept.clone()]);

        let cached = &catalog.cached_games()[0];
        assert!(cached.on_pc);
        assert!(cached.retain_in_cache);
        assert_ne!(cached.path_in(Location::Pc), gone.as_path());
    }

    #[test]
    fn test_trim_one_of_two_pc_files_with_same_name() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.pc.join("a")).unwrap();
        fs::create_dir_all(fx.pc.join("b")).unwrap();
        let untouched = fx.add_pc("a/mario.xci");
        let target = fx.add_pc("b/mario.xci");
        let (catalog, _) = loaded(&fx, Location::Pc);

        let record = catalog
            .games(Location::Pc)
            .into_iter()
            .find(|r| r.path() == target.as_path())
            .unwrap();
        let file = fs::OpenOptions::new().write(true).open(&target).unwrap();
        file.set_len(record.metadata.used_size).unwrap();

        let request = with_op(&record, FileOpKind::Trim, Location::Pc, &target);
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);

        let pc = catalog.games(Location::Pc);
        let trimmed = pc.iter().find(|r| r.path() == target.as_path()).unwrap();
        let other = pc.iter().find(|r| r.path() == untouched.as_path()).unwrap();
        assert!(trimmed.is_trimmed);
        assert!(!other.is_trimmed);
        assert_eq!(other.metadata.size, 2048);
    }

    #[test]
    fn test_permanent_delete_prunes_cache_on_save() {
        let fx = Fixture::new();
        let doomed = fx.add_pc("doomed.xci");
        fx.add_pc("keeper.xci");
        let (catalog, _) = loaded(&fx, Location::Pc);
        let record = catalog.find_game("doomed", None).unwrap();

        std::fs::remove_file(&doomed).unwrap();
        let request = with_op(&record, FileOpKind::PermanentDelete, Location::Pc, &doomed);
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);

        assert_eq!(catalog.games(Location::Pc).len(), 1);
        let persisted = crate::core::cache::load(&fx.cache_file).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].metadata.title, "KEEPER");
    }

    #[test]
    fn test_trim_updates_size_in_place() {
        let fx = Fixture::new();
        let path = fx.add_pc("mario.xci");
        let (catalog, view) = loaded(&fx, Location::Pc);
        let mario = catalog.games(Location::Pc)[0].clone();
        assert!(!mario.is_trimmed);

        let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
        file.set_len(mario.metadata.used_size).unwrap();

        let request = with_op(&mario, FileOpKind::Trim, Location::Pc, &path);
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);

        let pc = catalog.games(Location::Pc);
        assert_eq!(pc.len(), 1);
        assert!(pc[0].is_trimmed);
        assert_eq!(pc[0].metadata.size, mario.metadata.used_size);
        assert!(catalog.cached_games()[0].is_trimmed);
        assert!(view
            .events()
            .contains(&ViewEvent::Refresh(path.display().to_string())));
    }

    #[test]
    fn test_trim_missing_file_is_noop() {
        let fx = Fixture::new();
        let path = fx.add_pc("mario.xci");
        let (catalog, _) = loaded(&fx, Location::Pc);
        let mario = catalog.games(Location::Pc)[0].clone();
        std::fs::remove_file(&path).unwrap();

        let request = with_op(&mario, FileOpKind::Trim, Location::Pc, &path);
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Skipped);
    }

    #[test]
    fn test_incomplete_operation_is_skipped() {
        let fx = Fixture::new();
        let path = fx.add_pc("mario.xci");
        let (catalog, _) = loaded(&fx, Location::Pc);
        let mario = catalog.games(Location::Pc)[0].clone();
        std::fs::remove_file(&path).unwrap();

        let mut request = with_op(&mario, FileOpKind::Delete, Location::Pc, &path);
        request.file_operation.completed = false;
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Skipped);
        assert_eq!(catalog.games(Location::Pc).len(), 1);
    }

    #[test]
    fn test_rejected_during_transfer() {
        let fx = Fixture::new();
        let path = fx.add_pc("mario.xci");
        let (catalog, _) = loaded(&fx, Location::Pc);
        let mario = catalog.games(Location::Pc)[0].clone();
        std::fs::remove_file(&path).unwrap();

        let request = with_op(&mario, FileOpKind::Delete, Location::Pc, &path);
        let guard = catalog.transfer_gate().begin().unwrap();
        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Rejected);
        assert_eq!(catalog.games(Location::Pc).len(), 1);
        drop(guard);

        assert_eq!(catalog.apply_file_operation(&request), ApplyOutcome::Applied);
        assert!(catalog.games(Location::Pc).is_empty());
    }
}
