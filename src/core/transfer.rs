//! File operation executor
//!
//! Moves bytes on disk for copy, move, delete and trim requests. Only one
//! transfer runs at a time; the [`TransferGate`] is held for its duration
//! and catalog-mutating entry points refuse to run while it is closed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info};

use crate::core::record::{CartridgeRecord, FileOpKind, FileOperation, Location};
use crate::core::xci;

/// Status text shown when a request collides with a running transfer
pub const TRANSFER_BUSY_MESSAGE: &str =
    "A file transfer is in progress. Please try again after it has finished.";

/// Errors that can occur while executing a file operation
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("A file transfer is already in progress")]
    InProgress,

    #[error("Source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("No {0} folder is configured")]
    NoDestinationRoot(Location),

    #[error("Cannot trim {path}: {reason}")]
    InvalidTrim { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Mutual exclusion for file transfers
#[derive(Debug, Default)]
pub struct TransferGate {
    active: AtomicBool,
}

impl TransferGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Close the gate, or return None if a transfer already holds it
    pub fn begin(&self) -> Option<TransferGuard<'_>> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| TransferGuard { gate: self })
    }
}

/// Reopens the gate when dropped
#[derive(Debug)]
pub struct TransferGuard<'a> {
    gate: &'a TransferGate,
}

impl Drop for TransferGuard<'_> {
    fn drop(&mut self) {
        self.gate.active.store(false, Ordering::SeqCst);
    }
}

/// Describe an operation on `record` without touching the disk
///
/// Copy and move target `destination_root` joined with the file name.
pub fn plan(
    record: &CartridgeRecord,
    kind: FileOpKind,
    destination: Location,
    destination_root: Option<&Path>,
) -> Result<FileOperation, TransferError> {
    let source_path = record.path().to_path_buf();

    let destination_path = match kind {
        FileOpKind::Copy | FileOpKind::Move => {
            let root = destination_root.ok_or(TransferError::NoDestinationRoot(destination))?;
            let name = source_path
                .file_name()
                .ok_or_else(|| TransferError::SourceMissing(source_path.clone()))?;
            root.join(name)
        }
        _ => source_path.clone(),
    };

    Ok(FileOperation {
        kind,
        source: record.location,
        destination,
        source_path,
        destination_path,
        completed: false,
    })
}

/// Execute the record's pending operation and mark it completed
///
/// Returns the number of bytes written, removed or trimmed.
pub fn execute(gate: &TransferGate, record: &mut CartridgeRecord) -> Result<u64, TransferError> {
    let _guard = gate.begin().ok_or(TransferError::InProgress)?;
    let op = record.file_operation.clone();

    let bytes = match op.kind {
        FileOpKind::None => 0,
        FileOpKind::Copy => copy_file(&op.source_path, &op.destination_path)?,
        FileOpKind::Move => move_file(&op.source_path, &op.destination_path)?,
        FileOpKind::Delete | FileOpKind::PermanentDelete => remove_file(&op.source_path)?,
        FileOpKind::Trim => {
            if !op.source_path.is_file() {
                return Err(TransferError::SourceMissing(op.source_path));
            }
            xci::trim_file(&op.source_path, record.metadata.used_size).map_err(|e| {
                TransferError::InvalidTrim {
                    path: op.source_path.clone(),
                    reason: e.to_string(),
                }
            })?
        }
    };

    record.file_operation.completed = true;
    info!(kind = %op.kind, source = %op.source_path.display(), destination = %op.destination_path.display(), bytes, "file operation completed");
    Ok(bytes)
}

fn check_copy_paths(source: &Path, destination: &Path) -> Result<(), TransferError> {
    if !source.is_file() {
        return Err(TransferError::SourceMissing(source.to_path_buf()));
    }
    if destination.exists() {
        return Err(TransferError::DestinationExists(destination.to_path_buf()));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn copy_file(source: &Path, destination: &Path) -> Result<u64, TransferError> {
    check_copy_paths(source, destination)?;
    Ok(fs::copy(source, destination)?)
}

fn move_file(source: &Path, destination: &Path) -> Result<u64, TransferError> {
    check_copy_paths(source, destination)?;
    let len = fs::metadata(source)?.len();

    // Rename fails across devices, e.g. PC disk to SD card
    if let Err(e) = fs::rename(source, destination) {
        debug!(error = %e, "rename failed, falling back to copy and delete");
        fs::copy(source, destination)?;
        fs::remove_file(source)?;
    }
    Ok(len)
}

fn remove_file(path: &Path) -> Result<u64, TransferError> {
    match fs::metadata(path) {
        Ok(meta) => {
            fs::remove_file(path)?;
            Ok(meta.len())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::CartridgeId;
    use tempfile::tempdir;

    fn record_at(path: &Path, location: Location) -> CartridgeRecord {
        CartridgeRecord::discovered(CartridgeId::new("id"), path, location)
    }

    #[test]
    fn test_gate_is_exclusive() {
        let gate = TransferGate::new();
        let guard = gate.begin().unwrap();
        assert!(gate.is_active());
        assert!(gate.begin().is_none());
        drop(guard);
        assert!(!gate.is_active());
        assert!(gate.begin().is_some());
    }

    #[test]
    fn test_plan_copy_targets_destination_root() {
        let record = record_at(Path::new("/sd/zelda.xci"), Location::Sd);
        let op = plan(&record, FileOpKind::Copy, Location::Pc, Some(Path::new("/games"))).unwrap();

        assert_eq!(op.source, Location::Sd);
        assert_eq!(op.destination, Location::Pc);
        assert_eq!(op.source_path, PathBuf::from("/sd/zelda.xci"));
        assert_eq!(op.destination_path, PathBuf::from("/games/zelda.xci"));
        assert!(!op.completed);
    }

    #[test]
    fn test_plan_move_without_root_fails() {
        let record = record_at(Path::new("/games/zelda.xci"), Location::Pc);
        let err = plan(&record, FileOpKind::Move, Location::Sd, None).unwrap_err();
        assert!(matches!(err, TransferError::NoDestinationRoot(Location::Sd)));
    }

    #[test]
    fn test_execute_move() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("sd/zelda.xci");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, vec![7u8; 64]).unwrap();

        let mut record = record_at(&source, Location::Sd);
        record.file_operation =
            plan(&record, FileOpKind::Move, Location::Pc, Some(&dir.path().join("games"))).unwrap();

        let gate = TransferGate::new();
        assert_eq!(execute(&gate, &mut record).unwrap(), 64);
        assert!(record.file_operation.completed);
        assert!(!source.exists());
        assert!(dir.path().join("games/zelda.xci").is_file());
        assert!(!gate.is_active());
    }

    #[test]
    fn test_execute_copy_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a/game.xci");
        let dest_root = dir.path().join("b");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::create_dir_all(&dest_root).unwrap();
        fs::write(&source, b"src").unwrap();
        fs::write(dest_root.join("game.xci"), b"dst").unwrap();

        let mut record = record_at(&source, Location::Pc);
        record.file_operation =
            plan(&record, FileOpKind::Copy, Location::Sd, Some(&dest_root)).unwrap();

        let err = execute(&TransferGate::new(), &mut record).unwrap_err();
        assert!(matches!(err, TransferError::DestinationExists(_)));
        assert!(!record.file_operation.completed);
    }

    #[test]
    fn test_execute_rejected_while_gate_closed() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("game.xci");
        fs::write(&source, b"x").unwrap();
        let mut record = record_at(&source, Location::Pc);
        record.file_operation =
            plan(&record, FileOpKind::Delete, Location::Pc, None).unwrap();

        let gate = TransferGate::new();
        let _held = gate.begin().unwrap();
        assert!(matches!(
            execute(&gate, &mut record),
            Err(TransferError::InProgress)
        ));
        assert!(source.exists());
    }

    #[test]
    fn test_execute_delete_missing_file_is_ok() {
        let mut record = record_at(Path::new("/nonexistent/game.xci"), Location::Pc);
        record.file_operation =
            plan(&record, FileOpKind::Delete, Location::Pc, None).unwrap();

        assert_eq!(execute(&TransferGate::new(), &mut record).unwrap(), 0);
        assert!(record.file_operation.completed);
    }
}
