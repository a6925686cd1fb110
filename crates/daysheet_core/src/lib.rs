//! # Daysheet Core
//!
//! Versioned per-date sheet store with compare-and-swap writes.
//!
//! This crate provides:
//! - `SheetStore`: CAS `apply`/`patch`/`get` over per-date row sets
//! - Deterministic content hashing over canonical row serialization
//! - Atomic memo sync-task queueing alongside row patches
//! - An injectable `Clock` for deterministic tests
//!
//! ## Key Invariants
//!
//! - A sheet's version strictly increases on every accepted content change,
//!   never decreases and is never reused
//! - The (site, reservation_date) pair is unique within one sheet day
//! - Conflicting writes are always surfaced with the current version,
//!   never silently overwritten
//! - A memo patch and its queued sync task commit together

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod error;
mod hash;
mod queue;
mod store;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use hash::content_hash;
pub use queue::TaskInput;
pub use store::{SheetStore, CREATE_VERSION};
pub use types::{
    Applied, Patched, Row, RowField, RowKey, RowPatch, SheetDate, SheetSnapshot, SyncFlag,
    SyncTask, TaskMode, TaskStatus,
};
