//! Persisted scheduler state.

use crate::error::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Snapshot of the scheduler's observable state.
///
/// Persisted as JSON after every transition so a restarted process can
/// report when the last run happened. Transient fields (`running`,
/// `scheduled_run_at`) are cleared on load: an in-flight job does not
/// survive the process, and a stale deadline must not fire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// Last recorded edit signal.
    pub last_edit_at: Option<DateTime<Utc>>,
    /// Pending scheduled run, if armed.
    pub scheduled_run_at: Option<DateTime<Utc>>,
    /// True while the external job is in flight.
    pub running: bool,
    /// When the last run started.
    pub last_run_started_at: Option<DateTime<Utc>>,
    /// When the last run finished.
    pub last_run_finished_at: Option<DateTime<Utc>>,
    /// Exit code of the last run (absent if it never exited normally).
    pub last_run_return_code: Option<i32>,
}

impl SyncState {
    /// Clears the fields that must not survive a restart.
    pub fn reset_transient(&mut self) {
        self.running = false;
        self.scheduled_run_at = None;
    }
}

/// Destination for persisted scheduler state.
pub trait StateSink: Send + Sync {
    /// Loads the previously saved state, if any.
    fn load(&self) -> SyncResult<Option<SyncState>>;

    /// Saves the given state.
    fn save(&self, state: &SyncState) -> SyncResult<()>;
}

/// File-backed state sink writing pretty JSON.
#[derive(Debug)]
pub struct JsonStateSink {
    path: PathBuf,
}

impl JsonStateSink {
    /// Creates a sink backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StateSink for JsonStateSink {
    /// A missing file yields `None`. A corrupt file is logged and treated as
    /// missing rather than wedging startup.
    fn load(&self) -> SyncResult<Option<SyncState>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(SyncError::state(format!(
                    "read {}: {err}",
                    self.path.display()
                )))
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "discarding corrupt sync state");
                Ok(None)
            }
        }
    }

    fn save(&self, state: &SyncState) -> SyncResult<()> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|err| SyncError::state(format!("encode sync state: {err}")))?;
        let mut file = fs::File::create(&self.path)
            .map_err(|err| SyncError::state(format!("create {}: {err}", self.path.display())))?;
        file.write_all(&json)
            .map_err(|err| SyncError::state(format!("write {}: {err}", self.path.display())))?;
        Ok(())
    }
}

/// In-memory state sink for tests.
#[derive(Debug, Default)]
pub struct MemoryStateSink {
    inner: Mutex<MemorySinkInner>,
    /// When true, `save` fails with a state error.
    fail_saves: Mutex<bool>,
}

#[derive(Debug, Default)]
struct MemorySinkInner {
    state: Option<SyncState>,
    saves: u64,
}

impl MemoryStateSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink pre-seeded with a saved state.
    pub fn with_state(state: SyncState) -> Self {
        let sink = Self::default();
        sink.inner.lock().state = Some(state);
        sink
    }

    /// The most recently saved state.
    pub fn saved(&self) -> Option<SyncState> {
        self.inner.lock().state.clone()
    }

    /// How many times `save` was called.
    pub fn save_count(&self) -> u64 {
        self.inner.lock().saves
    }

    /// Makes every subsequent `save` fail.
    pub fn fail_saves(&self) {
        *self.fail_saves.lock() = true;
    }
}

impl StateSink for MemoryStateSink {
    fn load(&self) -> SyncResult<Option<SyncState>> {
        Ok(self.inner.lock().state.clone())
    }

    fn save(&self, state: &SyncState) -> SyncResult<()> {
        if *self.fail_saves.lock() {
            return Err(SyncError::state("scripted save failure"));
        }
        let mut inner = self.inner.lock();
        inner.state = Some(state.clone());
        inner.saves += 1;
        Ok(())
    }
}
