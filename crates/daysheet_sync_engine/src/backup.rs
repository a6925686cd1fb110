//! Backup sinks for payloads that could not be delivered cleanly.

use crate::error::SyncResult;
use daysheet_core::{Row, SheetDate};
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;

/// Persists payloads from failed or abandoned pushes.
pub trait BackupSink: Send + Sync {
    /// Records the pre-merge payload of a push abandoned after a second
    /// conflict.
    fn record_conflict(&self, date: SheetDate, rows: &[Row]) -> SyncResult<()>;

    /// Records a payload that could not reach the server at all.
    fn record_failure(&self, date: SheetDate, rows: &[Row]) -> SyncResult<()>;
}

/// Directory-backed sink writing one pretty-JSON file per event.
///
/// Conflicts land in `conflict_backup_{date}.json`, transport failures in
/// `fail_backup_{date}.json`. A later event for the same date overwrites the
/// earlier file; the newest payload is the one worth recovering.
#[derive(Debug, Clone)]
pub struct DirBackupSink {
    dir: PathBuf,
}

impl DirBackupSink {
    /// Creates a sink writing into the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn write(&self, name: String, rows: &[Row]) -> SyncResult<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        let json = serde_json::to_vec_pretty(rows)
            .map_err(|err| crate::error::SyncError::Protocol(err.to_string()))?;
        fs::write(&path, json)?;
        tracing::info!(path = %path.display(), rows = rows.len(), "backup written");
        Ok(())
    }
}

impl BackupSink for DirBackupSink {
    fn record_conflict(&self, date: SheetDate, rows: &[Row]) -> SyncResult<()> {
        self.write(format!("conflict_backup_{date}.json"), rows)
    }

    fn record_failure(&self, date: SheetDate, rows: &[Row]) -> SyncResult<()> {
        self.write(format!("fail_backup_{date}.json"), rows)
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemoryBackupSink {
    conflicts: Mutex<Vec<(SheetDate, Vec<Row>)>>,
    failures: Mutex<Vec<(SheetDate, Vec<Row>)>>,
}

impl MemoryBackupSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded conflict payloads, in order.
    pub fn conflicts(&self) -> Vec<(SheetDate, Vec<Row>)> {
        self.conflicts.lock().clone()
    }

    /// Recorded failure payloads, in order.
    pub fn failures(&self) -> Vec<(SheetDate, Vec<Row>)> {
        self.failures.lock().clone()
    }
}

impl BackupSink for MemoryBackupSink {
    fn record_conflict(&self, date: SheetDate, rows: &[Row]) -> SyncResult<()> {
        self.conflicts.lock().push((date, rows.to_vec()));
        Ok(())
    }

    fn record_failure(&self, date: SheetDate, rows: &[Row]) -> SyncResult<()> {
        self.failures.lock().push((date, rows.to_vec()));
        Ok(())
    }
}
