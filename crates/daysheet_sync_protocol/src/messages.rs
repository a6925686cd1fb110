//! Wire payloads for the sheet and sync endpoints.
//!
//! These are the JSON bodies exchanged with the editor frontend and the
//! producer; the HTTP layer that carries them lives outside this workspace.

use crate::error::ProtocolResult;
use crate::patch::row_patch_from_update;
use chrono::{DateTime, NaiveDate, Utc};
use daysheet_core::{Row, RowField, RowKey, RowPatch, SyncTask, TaskMode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Full-sheet replacement request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetWriteRequest {
    /// Sheet date.
    pub date: NaiveDate,
    /// The version the writer last observed.
    pub version: u64,
    /// Complete replacement row set.
    pub rows: Vec<Row>,
}

/// Successful full-sheet write response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetWriteResponse {
    /// Always true.
    pub ok: bool,
    /// Version after the write.
    pub version: u64,
    /// Content hash after the write.
    pub content_hash: String,
}

impl SheetWriteResponse {
    /// Creates a success response.
    pub fn ok(version: u64, content_hash: impl Into<String>) -> Self {
        Self {
            ok: true,
            version,
            content_hash: content_hash.into(),
        }
    }
}

/// Body returned when a write loses the version race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictBody {
    /// Human-readable reason.
    pub error: String,
    /// The version currently stored; retry with this after reloading.
    pub current_version: u64,
}

impl ConflictBody {
    /// Creates a conflict body for the given stored version.
    pub fn conflict(current_version: u64) -> Self {
        Self {
            error: "version mismatch: another writer saved first".into(),
            current_version,
        }
    }
}

/// Single-row patch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPatchRequest {
    /// Sheet date.
    pub date: NaiveDate,
    /// The version the editor last observed.
    pub version: u64,
    /// Key of the row to patch.
    pub key: RowKey,
    /// Field updates; unknown fields are rejected.
    pub update: Map<String, Value>,
}

impl RowPatchRequest {
    /// Converts the wire update map into a typed patch.
    pub fn patch(&self) -> ProtocolResult<RowPatch> {
        row_patch_from_update(&self.update)
    }
}

/// Single-row patch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowPatchResponse {
    /// Always true.
    pub ok: bool,
    /// Version after the patch (unchanged for a no-op).
    pub version: u64,
    /// Fields whose stored values changed; empty for a no-op.
    pub changed_fields: Vec<RowField>,
    /// Content hash after the patch.
    pub content_hash: String,
}

impl RowPatchResponse {
    /// Creates a patch response.
    pub fn ok(version: u64, changed_fields: Vec<RowField>, content_hash: impl Into<String>) -> Self {
        Self {
            ok: true,
            version,
            changed_fields,
            content_hash: content_hash.into(),
        }
    }
}

/// Response to an edit signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchResponse {
    /// Always true.
    pub ok: bool,
    /// When the edit was recorded.
    pub last_edit_at: DateTime<Utc>,
    /// When the reconciliation job is scheduled to fire. Absent while a job
    /// is already running; the next cycle needs a fresh edit signal.
    pub scheduled_run_at: Option<DateTime<Utc>>,
}

/// Sync status readout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
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

/// Response to a forced run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForceRunResponse {
    /// Always true.
    pub ok: bool,
    /// Always true; distinguishes forced runs in logs.
    pub forced: bool,
}

impl ForceRunResponse {
    /// Creates a forced-run acknowledgement.
    pub fn ok() -> Self {
        Self {
            ok: true,
            forced: true,
        }
    }
}

/// Manual task enqueue request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAppendRequest {
    /// Site of the target row.
    pub site: String,
    /// Reservation date text of the target row.
    pub reservation_date: String,
    /// Customer name for the external lookup.
    #[serde(default)]
    pub customer_name: String,
    /// Phone number for the external lookup.
    #[serde(default)]
    pub phone: String,
    /// Memo text.
    #[serde(default)]
    pub memo: String,
    /// Apply mode; defaults to replace.
    #[serde(default = "default_mode")]
    pub mode: TaskMode,
}

fn default_mode() -> TaskMode {
    TaskMode::Replace
}

/// Manual task enqueue response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAppendResponse {
    /// Always true.
    pub ok: bool,
    /// ID of the queued task.
    pub id: Uuid,
}

/// Task queue listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListResponse {
    /// Queued tasks, newest first.
    pub queue: Vec<SyncTask>,
}
