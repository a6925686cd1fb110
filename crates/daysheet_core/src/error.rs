//! Error types for the sheet store.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in sheet store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The expected version did not match the stored version.
    ///
    /// The caller must reload the sheet and retry with the reported version;
    /// the store never silently overwrites a concurrent write.
    #[error("version conflict: current version is {current_version}")]
    VersionConflict {
        /// The version currently stored (0 for an absent date).
        current_version: u64,
    },

    /// The requested sheet date is not stored.
    #[error("sheet not found for {date}")]
    SheetNotFound {
        /// The date that was looked up.
        date: chrono::NaiveDate,
    },

    /// No row with the given key exists within the sheet.
    #[error("row not found: site={site}, reservation_date={reservation_date}")]
    RowNotFound {
        /// Site part of the row key.
        site: String,
        /// Reservation-date part of the row key.
        reservation_date: String,
    },

    /// The write payload is malformed.
    #[error("invalid payload: {message}")]
    Validation {
        /// Description of the problem.
        message: String,
    },
}

impl StoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Returns true if the caller can recover by reloading and retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}
