//! # Daysheet Sync Engine
//!
//! Producer-side conflict resolution and the debounced reconciliation
//! scheduler for daysheet.
//!
//! This crate provides:
//! - `ConflictResolver`: full-sheet push with a single server-wins merge
//!   retry, spilling unrecoverable payloads to backup sinks
//! - `Scheduler`: debounced singleton runner for the external
//!   reconciliation job, with persisted observable state
//! - Trait seams (`SheetTransport`, `BackupSink`, `StateSink`,
//!   `JobLauncher`) with production and in-memory test implementations
//!
//! ## Key Invariants
//!
//! - A conflicting push is retried at most once, against freshly fetched
//!   server rows, with server values winning on key collision
//! - At most one reconciliation job is in flight at any time
//! - Every edit signal re-arms the single deadline; a fire with a recent
//!   edit defers instead of running
//! - Abandoned and undeliverable payloads are always persisted before the
//!   error is surfaced

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod config;
mod error;
mod launcher;
mod resolver;
mod scheduler;
mod state;
mod transport;

pub use backup::{BackupSink, DirBackupSink, MemoryBackupSink};
pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use launcher::{JobLauncher, JobOutcome, ProcessLauncher, ScriptedLauncher};
pub use resolver::{ConflictResolver, PushReport};
pub use scheduler::{RunDecision, Scheduler, TouchReceipt};
pub use state::{JsonStateSink, MemoryStateSink, StateSink, SyncState};
pub use transport::{MockTransport, RecordedPush, SheetTransport, StoreTransport};
