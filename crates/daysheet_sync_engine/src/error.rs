//! Error types for the sync engine.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or spawn failure reaching a collaborator.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether a later attempt could succeed.
        retryable: bool,
    },

    /// The server rejected a write because the expected version was stale.
    #[error("version conflict: server is at version {current_version}")]
    VersionConflict {
        /// The version the server reported.
        current_version: u64,
    },

    /// The merge retry conflicted again; the push was abandoned and the
    /// pre-merge payload persisted to the conflict sink.
    #[error("push abandoned after merge retry: server is at version {current_version}")]
    PushAbandoned {
        /// The version the server reported on the second conflict.
        current_version: u64,
    },

    /// A backup sink could not persist a payload.
    #[error("backup sink error: {0}")]
    Backup(#[from] std::io::Error),

    /// The state sink could not load or save sync state.
    #[error("state sink error: {message}")]
    State {
        /// Description of the failure.
        message: String,
    },

    /// A worker thread or child process could not be started.
    #[error("spawn failed: {message}")]
    Spawn {
        /// Description of the failure.
        message: String,
    },

    /// Malformed payload or collaborator response.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a state sink error.
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Returns true for a version conflict (recoverable by reload-and-retry).
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::VersionConflict { .. })
    }
}
