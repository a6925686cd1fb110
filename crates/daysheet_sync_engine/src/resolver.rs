//! Conflict-resolving push with a single merge retry.

use crate::backup::BackupSink;
use crate::error::{SyncError, SyncResult};
use crate::transport::SheetTransport;
use daysheet_core::{Row, SheetDate};
use daysheet_sync_protocol::merge_rows;
use std::sync::Arc;

/// Outcome of a resolved push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    /// Version the server holds after the push.
    pub version: u64,
    /// True when the accepted payload was a merge, not the original.
    pub merged: bool,
}

/// Pushes full-sheet payloads, merging once on conflict.
///
/// On a version conflict the resolver fetches the server's rows, merges the
/// local payload under it (server wins on key collision), and retries exactly
/// once at the fetched version. A second conflict abandons the push and
/// records the original pre-merge payload to the conflict sink; any transport
/// failure records it to the failure sink.
pub struct ConflictResolver {
    transport: Arc<dyn SheetTransport>,
    backup: Arc<dyn BackupSink>,
}

impl ConflictResolver {
    /// Creates a resolver over the given transport and backup sink.
    pub fn new(transport: Arc<dyn SheetTransport>, backup: Arc<dyn BackupSink>) -> Self {
        Self { transport, backup }
    }

    /// Pushes `rows` at `expected_version`, resolving one conflict by merge.
    pub fn push_with_merge(
        &self,
        date: SheetDate,
        expected_version: u64,
        rows: &[Row],
    ) -> SyncResult<PushReport> {
        let current_version = match self.transport.push(date, expected_version, rows) {
            Ok(applied) => {
                return Ok(PushReport {
                    version: applied.version,
                    merged: false,
                })
            }
            Err(SyncError::VersionConflict { current_version }) => current_version,
            Err(err) => {
                self.record_failure(date, rows);
                return Err(err);
            }
        };

        tracing::warn!(
            %date,
            expected = expected_version,
            current = current_version,
            "push conflicted, merging against server rows"
        );

        let server = match self.transport.fetch(date) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.record_failure(date, rows);
                return Err(err);
            }
        };

        let merged = merge_rows(&server.rows, rows);
        match self.transport.push(date, server.version, &merged) {
            Ok(applied) => {
                tracing::info!(%date, version = applied.version, "merge retry accepted");
                Ok(PushReport {
                    version: applied.version,
                    merged: true,
                })
            }
            Err(SyncError::VersionConflict { current_version }) => {
                tracing::error!(%date, current = current_version, "merge retry conflicted, abandoning");
                if let Err(err) = self.backup.record_conflict(date, rows) {
                    tracing::error!(%date, %err, "conflict backup failed");
                }
                Err(SyncError::PushAbandoned { current_version })
            }
            Err(err) => {
                self.record_failure(date, rows);
                Err(err)
            }
        }
    }

    fn record_failure(&self, date: SheetDate, rows: &[Row]) {
        if let Err(err) = self.backup.record_failure(date, rows) {
            tracing::error!(%date, %err, "failure backup failed");
        }
    }
}
