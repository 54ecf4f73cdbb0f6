//! Domain types for the OrderSync offline synchronization queue.
//!
//! This crate holds the plain data types shared by every layer: queued
//! operations and their lifecycle states, conflict records, the fixed
//! kind→priority table, the retry backoff schedule, and the error type
//! used across the workspace. It deliberately has no I/O dependencies.

pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use constants::{priority_for_kind, BACKOFF_SCHEDULE, DEFAULT_ATTEMPT_LIMIT, DEFAULT_PRIORITY};
pub use errors::{OrderSyncError, Result};
pub use types::{
    ConflictChoice, ConflictRecord, NewConflict, NewOperation, OperationState, QueuedOperation,
    SyncEvent,
};
