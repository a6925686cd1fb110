//! Data model for daily sheets.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The calendar date keying one sheet.
pub type SheetDate = NaiveDate;

/// Identifies a unique row within one sheet day.
///
/// `reservation_date` is free-form display text (e.g. `"9/7 ~ 9/9"`), not a
/// calendar date; the pair is unique per sheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey {
    /// Site identifier.
    pub site: String,
    /// Reservation date range text.
    pub reservation_date: String,
}

impl RowKey {
    /// Creates a new row key.
    pub fn new(site: impl Into<String>, reservation_date: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            reservation_date: reservation_date.into(),
        }
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}|{}", self.site, self.reservation_date)
    }
}

/// One reservation row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Site identifier (required, part of the row key).
    pub site: String,
    /// Reservation date range text (part of the row key).
    #[serde(default)]
    pub reservation_date: String,
    /// Reservation status display text.
    #[serde(default)]
    pub status: Option<String>,
    /// Customer name.
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Contact phone number.
    #[serde(default)]
    pub phone: Option<String>,
    /// Head count display text.
    #[serde(default)]
    pub people: Option<String>,
    /// Vehicle display text.
    #[serde(default)]
    pub car: Option<String>,
    /// On-site payment amount (display text).
    #[serde(default)]
    pub onsite_amount: Option<String>,
    /// Prepaid amount (display text).
    #[serde(default)]
    pub prepaid_amount: Option<String>,
    /// Total fee (display text).
    #[serde(default)]
    pub total_amount: Option<String>,
    /// Management memo lines.
    #[serde(default)]
    pub manage_memo: Vec<String>,
    /// Customer request note.
    #[serde(default)]
    pub request_note: Option<String>,
    /// Cell-circling marks.
    #[serde(default)]
    pub circled: Value,
    /// Sites that arrived together.
    #[serde(default)]
    pub together_sites: Vec<String>,
    /// Editor-defined field overrides.
    #[serde(default)]
    pub custom: Value,
    /// Original field values before editor overrides.
    #[serde(default)]
    pub original: Value,
    /// Structured edit history.
    #[serde(default)]
    pub history: Value,
}

impl Row {
    /// Returns the key identifying this row within its sheet.
    pub fn key(&self) -> RowKey {
        RowKey::new(self.site.clone(), self.reservation_date.clone())
    }
}

/// A patchable row field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowField {
    /// `manage_memo`.
    ManageMemo,
    /// `status`.
    Status,
    /// `request_note`.
    RequestNote,
}

impl RowField {
    /// The wire-side field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RowField::ManageMemo => "manage_memo",
            RowField::Status => "status",
            RowField::RequestNote => "request_note",
        }
    }
}

impl std::fmt::Display for RowField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed partial update for a single row.
///
/// Absent fields are left untouched. A patch whose present fields all equal
/// the stored values is a no-op.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowPatch {
    /// Replacement memo lines (already normalized).
    pub manage_memo: Option<Vec<String>>,
    /// Replacement status text.
    pub status: Option<String>,
    /// Replacement request note.
    pub request_note: Option<String>,
}

impl RowPatch {
    /// Returns true if the patch carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.manage_memo.is_none() && self.status.is_none() && self.request_note.is_none()
    }
}

/// Result of a successful full-sheet write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// New sheet version.
    pub version: u64,
    /// Content hash after the write.
    pub content_hash: String,
}

/// Result of a row patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patched {
    /// Sheet version after the patch (unchanged for a no-op).
    pub version: u64,
    /// Fields whose stored values actually changed.
    pub changed_fields: Vec<RowField>,
    /// Content hash after the patch.
    pub content_hash: String,
}

/// A point-in-time copy of one sheet day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    /// Sheet date.
    pub date: SheetDate,
    /// Current version.
    pub version: u64,
    /// Content hash over the canonical row serialization.
    pub content_hash: String,
    /// Time of the last accepted write.
    pub updated_at: DateTime<Utc>,
    /// Rows in stored order.
    pub rows: Vec<Row>,
}

/// Side-effect task queued by a memo edit, consumed by the external job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTask {
    /// Task ID.
    pub id: Uuid,
    /// Site of the edited row.
    pub site: String,
    /// Reservation date text of the edited row.
    pub reservation_date: String,
    /// Customer name carried for the external system's lookup.
    pub customer_name: String,
    /// Phone number carried for the external system's lookup.
    pub phone: String,
    /// Memo text, newline-joined.
    pub memo: String,
    /// How the external system should apply the memo.
    pub mode: TaskMode,
    /// Task lifecycle status.
    pub status: TaskStatus,
    /// Number of delivery attempts made by the external job.
    pub tries: u32,
    /// When the task was enqueued.
    pub added_at: DateTime<Utc>,
    /// Last status change, if any.
    pub updated_at: Option<DateTime<Utc>>,
    /// Completion time, if finished.
    pub completed_at: Option<DateTime<Utc>>,
}

/// How the external system should apply a queued memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Append to the remote memo.
    Append,
    /// Replace the remote memo.
    Replace,
}

/// Lifecycle status of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Waiting for the external job.
    Pending,
    /// Delivered successfully.
    Done,
    /// Delivery failed.
    Failed,
}

/// Process-wide flag telling the external job that edits await reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncFlag {
    /// True while at least one edit awaits reconciliation.
    pub sync_required: bool,
    /// When the flag was last raised.
    pub requested_at: Option<DateTime<Utc>>,
}
