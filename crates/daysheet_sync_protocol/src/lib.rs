//! # Daysheet Sync Protocol
//!
//! Wire payload types and the deterministic row merge for daysheet.
//!
//! This crate provides:
//! - JSON request/response payloads for sheet writes, patches, edit
//!   signals, status reads and task queue access
//! - Normalization of editor-side update maps into typed patches
//! - The server-wins row merge used after a producer's version conflict
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod merge;
mod messages;
mod patch;

pub use error::{ProtocolError, ProtocolResult};
pub use merge::merge_rows;
pub use messages::{
    ConflictBody, ForceRunResponse, RowPatchRequest, RowPatchResponse, SheetWriteRequest,
    SheetWriteResponse, StatusResponse, TaskAppendRequest, TaskAppendResponse, TaskListResponse,
    TouchResponse,
};
pub use patch::{normalize_memo, row_patch_from_update};
