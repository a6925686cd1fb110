//! Transport seam between the producer-side pusher and the sheet server.

use crate::error::{SyncError, SyncResult};
use daysheet_core::{Applied, Row, SheetDate, SheetSnapshot, SheetStore, StoreError};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Reads and writes sheets on the authoritative server.
pub trait SheetTransport: Send + Sync {
    /// Fetches the server's current snapshot for a date.
    ///
    /// A date the server has never seen yields an empty snapshot at
    /// version 0, so the caller's retry can use the creation path.
    fn fetch(&self, date: SheetDate) -> SyncResult<SheetSnapshot>;

    /// Pushes a full replacement row set at the expected version.
    fn push(&self, date: SheetDate, expected_version: u64, rows: &[Row]) -> SyncResult<Applied>;
}

/// Transport backed by an in-process [`SheetStore`].
///
/// Used when the producer and the store share a process, and by the
/// integration tests as a faithful stand-in for the HTTP transport.
#[derive(Debug, Clone)]
pub struct StoreTransport {
    store: Arc<SheetStore>,
}

impl StoreTransport {
    /// Wraps the given store.
    pub fn new(store: Arc<SheetStore>) -> Self {
        Self { store }
    }
}

impl SheetTransport for StoreTransport {
    fn fetch(&self, date: SheetDate) -> SyncResult<SheetSnapshot> {
        match self.store.get(date) {
            Ok(snapshot) => Ok(snapshot),
            Err(StoreError::SheetNotFound { .. }) => Ok(SheetSnapshot {
                date,
                version: 0,
                content_hash: String::new(),
                updated_at: chrono::DateTime::UNIX_EPOCH,
                rows: Vec::new(),
            }),
            Err(err) => Err(SyncError::transport_fatal(err.to_string())),
        }
    }

    fn push(&self, date: SheetDate, expected_version: u64, rows: &[Row]) -> SyncResult<Applied> {
        match self.store.apply(date, expected_version, rows.to_vec()) {
            Ok(applied) => Ok(applied),
            Err(StoreError::VersionConflict { current_version }) => {
                Err(SyncError::VersionConflict { current_version })
            }
            Err(err) => Err(SyncError::transport_fatal(err.to_string())),
        }
    }
}

/// Scripted transport for resolver tests.
///
/// Push results pop from a queue in order; fetch returns a fixed snapshot.
/// Every push's arguments are recorded for assertion.
#[derive(Debug, Default)]
pub struct MockTransport {
    push_results: Mutex<VecDeque<SyncResult<Applied>>>,
    fetch_result: Mutex<Option<SyncResult<SheetSnapshot>>>,
    pushes: Mutex<Vec<RecordedPush>>,
}

/// One recorded push call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPush {
    /// Date pushed.
    pub date: SheetDate,
    /// Expected version sent.
    pub expected_version: u64,
    /// Rows sent.
    pub rows: Vec<Row>,
}

impl MockTransport {
    /// Creates an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a push result.
    pub fn push_result(&self, result: SyncResult<Applied>) {
        self.push_results.lock().push_back(result);
    }

    /// Sets the next fetch result.
    pub fn fetch_result(&self, result: SyncResult<SheetSnapshot>) {
        *self.fetch_result.lock() = Some(result);
    }

    /// All pushes seen so far, in call order.
    pub fn pushes(&self) -> Vec<RecordedPush> {
        self.pushes.lock().clone()
    }
}

impl SheetTransport for MockTransport {
    fn fetch(&self, date: SheetDate) -> SyncResult<SheetSnapshot> {
        self.fetch_result.lock().take().unwrap_or(Ok(SheetSnapshot {
            date,
            version: 0,
            content_hash: String::new(),
            updated_at: chrono::DateTime::UNIX_EPOCH,
            rows: Vec::new(),
        }))
    }

    fn push(&self, date: SheetDate, expected_version: u64, rows: &[Row]) -> SyncResult<Applied> {
        self.pushes.lock().push(RecordedPush {
            date,
            expected_version,
            rows: rows.to_vec(),
        });
        self.push_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport_retryable("unscripted push")))
    }
}
