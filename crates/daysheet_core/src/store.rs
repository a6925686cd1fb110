//! Versioned sheet store with compare-and-swap writes.

use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::hash::content_hash;
use crate::queue::{TaskInput, TaskQueue};
use crate::types::{
    Applied, Patched, Row, RowField, RowKey, RowPatch, SheetDate, SheetSnapshot, SyncFlag,
    SyncTask, TaskMode, TaskStatus,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Creation sentinel: an `apply` with this expected version creates the date.
pub const CREATE_VERSION: u64 = 0;

/// Stored state for one sheet day.
#[derive(Debug, Clone)]
struct SheetDayState {
    version: u64,
    rows: Vec<Row>,
    content_hash: String,
    updated_at: DateTime<Utc>,
}

/// The versioned per-date sheet store.
///
/// Each date holds a monotonically increasing version counter, an ordered row
/// set, and a content hash. Writes are compare-and-swap: they succeed only
/// when the caller presents the currently stored version, so a concurrent
/// edit is never silently overwritten.
///
/// Lock order: the sheet lock is taken before the queue lock. The queue lock
/// is only ever taken while patching a memo, which keeps row update and task
/// enqueue atomic with respect to readers.
pub struct SheetStore {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    sheets: RwLock<BTreeMap<SheetDate, SheetDayState>>,
    queue: Mutex<TaskQueue>,
}

impl std::fmt::Debug for SheetStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SheetStore {
    /// Creates a store with the default configuration and system clock.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default(), Arc::new(SystemClock::new()))
    }

    /// Creates a store with the given configuration and clock.
    pub fn with_config(config: StoreConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            sheets: RwLock::new(BTreeMap::new()),
            queue: Mutex::new(TaskQueue::default()),
        }
    }

    /// Replaces the entire row set for a date.
    ///
    /// Succeeds iff `expected_version` matches the stored version, or the
    /// date is absent and `expected_version` is [`CREATE_VERSION`]. On
    /// success the version increments by exactly 1 and the content hash is
    /// recomputed.
    ///
    /// # Errors
    ///
    /// - `VersionConflict` when the expected version is stale (for an absent
    ///   date with a nonzero expected version, `current_version` is 0)
    /// - `Validation` for duplicate row keys or an empty site
    pub fn apply(
        &self,
        date: SheetDate,
        expected_version: u64,
        rows: Vec<Row>,
    ) -> StoreResult<Applied> {
        validate_rows(&rows)?;

        let mut sheets = self.sheets.write();
        let now = self.clock.now();

        match sheets.get_mut(&date) {
            Some(state) => {
                if expected_version != state.version {
                    tracing::warn!(
                        %date,
                        expected = expected_version,
                        current = state.version,
                        "rejecting stale full write"
                    );
                    return Err(StoreError::VersionConflict {
                        current_version: state.version,
                    });
                }
                state.version += 1;
                state.content_hash = content_hash(&rows);
                state.rows = rows;
                state.updated_at = now;
                tracing::info!(%date, version = state.version, "sheet replaced");
                Ok(Applied {
                    version: state.version,
                    content_hash: state.content_hash.clone(),
                })
            }
            None => {
                if expected_version != CREATE_VERSION {
                    return Err(StoreError::VersionConflict { current_version: 0 });
                }
                let state = SheetDayState {
                    version: 1,
                    content_hash: content_hash(&rows),
                    rows,
                    updated_at: now,
                };
                let applied = Applied {
                    version: state.version,
                    content_hash: state.content_hash.clone(),
                };
                sheets.insert(date, state);
                tracing::info!(%date, "sheet created");
                Ok(applied)
            }
        }
    }

    /// Applies a partial update to a single row.
    ///
    /// Fields whose new value equals the stored value are ignored; a patch
    /// that changes nothing is a no-op (no version bump, empty
    /// `changed_fields`), so repeating an identical patch is idempotent.
    ///
    /// A real `manage_memo` change on a row whose site is not excluded
    /// enqueues a [`SyncTask`] atomically with the row update.
    pub fn patch(
        &self,
        date: SheetDate,
        expected_version: u64,
        key: &RowKey,
        patch: RowPatch,
    ) -> StoreResult<Patched> {
        let mut sheets = self.sheets.write();
        let state = sheets
            .get_mut(&date)
            .ok_or(StoreError::SheetNotFound { date })?;

        if expected_version != state.version {
            return Err(StoreError::VersionConflict {
                current_version: state.version,
            });
        }

        let row = state
            .rows
            .iter_mut()
            .find(|r| r.site == key.site && r.reservation_date == key.reservation_date)
            .ok_or_else(|| StoreError::RowNotFound {
                site: key.site.clone(),
                reservation_date: key.reservation_date.clone(),
            })?;

        let mut changed = Vec::new();
        let mut memo_task: Option<TaskInput> = None;

        if let Some(memo) = patch.manage_memo {
            if row.manage_memo != memo {
                row.manage_memo = memo;
                changed.push(RowField::ManageMemo);
                if self.config.is_excluded(&row.site) {
                    tracing::debug!(site = %row.site, "memo edit on excluded site, no task queued");
                } else {
                    memo_task = Some(TaskInput {
                        site: row.site.clone(),
                        reservation_date: row.reservation_date.clone(),
                        customer_name: row.customer_name.clone().unwrap_or_default(),
                        phone: row.phone.clone().unwrap_or_default(),
                        memo: row.manage_memo.join("\n"),
                        mode: TaskMode::Replace,
                    });
                }
            }
        }
        if let Some(status) = patch.status {
            if row.status.as_deref() != Some(status.as_str()) {
                row.status = Some(status);
                changed.push(RowField::Status);
            }
        }
        if let Some(note) = patch.request_note {
            if row.request_note.as_deref() != Some(note.as_str()) {
                row.request_note = Some(note);
                changed.push(RowField::RequestNote);
            }
        }

        if changed.is_empty() {
            return Ok(Patched {
                version: state.version,
                changed_fields: Vec::new(),
                content_hash: state.content_hash.clone(),
            });
        }

        let now = self.clock.now();
        state.version += 1;
        state.updated_at = now;
        state.content_hash = content_hash(&state.rows);

        // Queue lock taken inside the sheet write lock so the row update and
        // the task become visible together.
        if let Some(input) = memo_task {
            let task = self.queue.lock().enqueue(input, now);
            tracing::info!(%date, task_id = %task.id, "memo sync task queued");
        }

        tracing::info!(%date, version = state.version, fields = ?changed, "row patched");
        Ok(Patched {
            version: state.version,
            changed_fields: changed,
            content_hash: state.content_hash.clone(),
        })
    }

    /// Returns a snapshot of the sheet for the given date.
    pub fn get(&self, date: SheetDate) -> StoreResult<SheetSnapshot> {
        let sheets = self.sheets.read();
        let state = sheets
            .get(&date)
            .ok_or(StoreError::SheetNotFound { date })?;
        Ok(SheetSnapshot {
            date,
            version: state.version,
            content_hash: state.content_hash.clone(),
            updated_at: state.updated_at,
            rows: state.rows.clone(),
        })
    }

    /// Returns the current version for a date, 0 when absent.
    pub fn version(&self, date: SheetDate) -> u64 {
        self.sheets.read().get(&date).map_or(0, |s| s.version)
    }

    /// Returns all stored dates, newest first.
    pub fn dates(&self) -> Vec<SheetDate> {
        self.sheets.read().keys().rev().copied().collect()
    }

    /// Enqueues a sync task directly (operator/manual path).
    pub fn append_task(&self, input: TaskInput) -> StoreResult<SyncTask> {
        if input.site.trim().is_empty() || input.reservation_date.trim().is_empty() {
            return Err(StoreError::validation(
                "site and reservation_date are required",
            ));
        }
        let now = self.clock.now();
        Ok(self.queue.lock().enqueue(input, now))
    }

    /// Returns the most recently queued tasks, newest first.
    pub fn recent_tasks(&self, limit: Option<usize>) -> Vec<SyncTask> {
        let limit = limit.unwrap_or(self.config.recent_task_limit);
        self.queue.lock().recent(limit)
    }

    /// Returns all tasks still awaiting the external job.
    pub fn pending_tasks(&self) -> Vec<SyncTask> {
        self.queue.lock().pending()
    }

    /// Records the outcome of a task delivery attempt.
    pub fn set_task_status(&self, id: Uuid, status: TaskStatus) -> Option<SyncTask> {
        let now = self.clock.now();
        self.queue.lock().set_status(id, status, now)
    }

    /// Returns the current sync flag.
    pub fn sync_flag(&self) -> SyncFlag {
        self.queue.lock().flag()
    }

    /// Lowers the sync flag once the external job has drained the queue.
    pub fn clear_sync_flag(&self) {
        self.queue.lock().clear_flag();
    }
}

impl Default for SheetStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_rows(rows: &[Row]) -> StoreResult<()> {
    let mut seen = HashSet::with_capacity(rows.len());
    for row in rows {
        if row.site.trim().is_empty() {
            return Err(StoreError::validation("row with empty site"));
        }
        if !seen.insert(row.key()) {
            return Err(StoreError::validation(format!(
                "duplicate row key: {}",
                row.key()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn date(s: &str) -> SheetDate {
        s.parse().unwrap()
    }

    fn row(site: &str, resv: &str) -> Row {
        Row {
            site: site.into(),
            reservation_date: resv.into(),
            customer_name: Some("Kim".into()),
            phone: Some("010-1234-5678".into()),
            ..Row::default()
        }
    }

    fn store() -> SheetStore {
        SheetStore::with_config(StoreConfig::new(), Arc::new(ManualClock::default()))
    }

    #[test]
    fn create_with_sentinel_then_cas() {
        let store = store();
        let d = date("2025-09-28");

        let applied = store.apply(d, CREATE_VERSION, vec![row("A1", "9/28")]).unwrap();
        assert_eq!(applied.version, 1);

        let applied = store.apply(d, 1, vec![row("A1", "9/28"), row("B2", "9/28")]).unwrap();
        assert_eq!(applied.version, 2);
    }

    #[test]
    fn stale_write_is_rejected_and_state_unchanged() {
        let store = store();
        let d = date("2025-09-28");
        for v in 0..3 {
            store.apply(d, v, vec![row("A1", "9/28")]).unwrap();
        }
        assert_eq!(store.version(d), 3);

        store.apply(d, 3, vec![row("C3", "9/28")]).unwrap();

        // Second writer still carrying version 3 loses.
        let err = store.apply(d, 3, vec![row("D4", "9/28")]).unwrap_err();
        match err {
            StoreError::VersionConflict { current_version } => assert_eq!(current_version, 4),
            other => panic!("unexpected error: {other}"),
        }
        let snap = store.get(d).unwrap();
        assert_eq!(snap.version, 4);
        assert_eq!(snap.rows[0].site, "C3");
    }

    #[test]
    fn nonzero_expected_on_absent_date_conflicts_with_zero() {
        let store = store();
        let err = store
            .apply(date("2025-01-01"), 5, vec![row("A1", "1/1")])
            .unwrap_err();
        match err {
            StoreError::VersionConflict { current_version } => assert_eq!(current_version, 0),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_row_keys_rejected() {
        let store = store();
        let err = store
            .apply(date("2025-09-28"), 0, vec![row("A1", "9/28"), row("A1", "9/28")])
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn patch_changes_bump_version_and_hash() {
        let store = store();
        let d = date("2025-09-28");
        store.apply(d, 0, vec![row("A1", "9/28")]).unwrap();
        let before = store.get(d).unwrap();

        let patched = store
            .patch(
                d,
                1,
                &RowKey::new("A1", "9/28"),
                RowPatch {
                    manage_memo: Some(vec!["late arrival".into()]),
                    ..RowPatch::default()
                },
            )
            .unwrap();
        assert_eq!(patched.version, 2);
        assert_eq!(patched.changed_fields, vec![RowField::ManageMemo]);
        assert_ne!(patched.content_hash, before.content_hash);
    }

    #[test]
    fn identical_patch_twice_is_idempotent() {
        let store = store();
        let d = date("2025-09-28");
        store.apply(d, 0, vec![row("A1", "9/28")]).unwrap();
        let key = RowKey::new("A1", "9/28");
        let patch = RowPatch {
            manage_memo: Some(vec!["late arrival".into()]),
            ..RowPatch::default()
        };

        let first = store.patch(d, 1, &key, patch.clone()).unwrap();
        assert_eq!(first.version, 2);

        let second = store.patch(d, 2, &key, patch).unwrap();
        assert_eq!(second.version, 2);
        assert!(second.changed_fields.is_empty());
        // Only the first patch queued a task.
        assert_eq!(store.pending_tasks().len(), 1);
    }

    #[test]
    fn memo_patch_enqueues_task_with_row_identity() {
        let store = store();
        let d = date("2025-09-28");
        store.apply(d, 0, vec![row("A1", "9/28")]).unwrap();

        store
            .patch(
                d,
                1,
                &RowKey::new("A1", "9/28"),
                RowPatch {
                    manage_memo: Some(vec!["first".into(), "second".into()]),
                    ..RowPatch::default()
                },
            )
            .unwrap();

        let tasks = store.pending_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].site, "A1");
        assert_eq!(tasks[0].memo, "first\nsecond");
        assert_eq!(tasks[0].mode, TaskMode::Replace);
        assert!(store.sync_flag().sync_required);
    }

    #[test]
    fn excluded_site_never_enqueues() {
        let config = StoreConfig::new().with_excluded_site("E10");
        let store = SheetStore::with_config(config, Arc::new(ManualClock::default()));
        let d = date("2025-09-28");
        store.apply(d, 0, vec![row("E10", "9/28")]).unwrap();

        let patched = store
            .patch(
                d,
                1,
                &RowKey::new("E10", "9/28"),
                RowPatch {
                    manage_memo: Some(vec!["memo".into()]),
                    ..RowPatch::default()
                },
            )
            .unwrap();

        // The row still changes, only the queue is skipped.
        assert_eq!(patched.changed_fields, vec![RowField::ManageMemo]);
        assert!(store.pending_tasks().is_empty());
        assert!(!store.sync_flag().sync_required);
    }

    #[test]
    fn patch_missing_row_and_missing_date() {
        let store = store();
        let d = date("2025-09-28");
        let key = RowKey::new("A1", "9/28");

        let err = store.patch(d, 1, &key, RowPatch::default()).unwrap_err();
        assert!(matches!(err, StoreError::SheetNotFound { .. }));

        store.apply(d, 0, vec![row("B2", "9/28")]).unwrap();
        let err = store.patch(d, 1, &key, RowPatch::default()).unwrap_err();
        assert!(matches!(err, StoreError::RowNotFound { .. }));
    }

    #[test]
    fn stale_patch_reports_current_version() {
        let store = store();
        let d = date("2025-09-28");
        store.apply(d, 0, vec![row("A1", "9/28")]).unwrap();
        store.apply(d, 1, vec![row("A1", "9/28")]).unwrap();

        let err = store
            .patch(d, 1, &RowKey::new("A1", "9/28"), RowPatch::default())
            .unwrap_err();
        match err {
            StoreError::VersionConflict { current_version } => assert_eq!(current_version, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dates_listed_newest_first() {
        let store = store();
        store.apply(date("2025-09-27"), 0, vec![]).unwrap();
        store.apply(date("2025-09-29"), 0, vec![]).unwrap();
        store.apply(date("2025-09-28"), 0, vec![]).unwrap();
        assert_eq!(
            store.dates(),
            vec![date("2025-09-29"), date("2025-09-28"), date("2025-09-27")]
        );
    }

    #[test]
    fn manual_task_append_requires_identity() {
        let store = store();
        let err = store
            .append_task(TaskInput {
                site: " ".into(),
                reservation_date: "9/7".into(),
                customer_name: String::new(),
                phone: String::new(),
                memo: "m".into(),
                mode: TaskMode::Append,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }
}
