//! Core data types for the synchronization queue.

use serde::{Deserialize, Serialize};

use crate::constants::{priority_for_kind, DEFAULT_ATTEMPT_LIMIT};
use crate::impl_status_conversions;

/// Lifecycle state of a queued operation.
///
/// `pending → in_flight → (deleted on success | pending with attempt+1 |
/// failed)`. `failed` is terminal until an operator resets the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Pending,
    InFlight,
    Failed,
}

impl_status_conversions!(OperationState {
    Pending => "pending",
    InFlight => "in_flight",
    Failed => "failed",
});

/// A single pending remote mutation, persisted until confirmed remotely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedOperation {
    /// Assigned by the store (AUTOINCREMENT); monotonic, never reused.
    pub id: i64,
    /// Business-intent tag (`completion`, `status_change`, `waste`,
    /// `attachment`, `note`, or an unrecognized tag at default priority).
    pub kind: String,
    pub method: String,
    pub target_url: String,
    /// Opaque JSON document; the queue never interprets it.
    pub payload_json: String,
    /// Lower value serviced first; fixed at enqueue time.
    pub priority: i32,
    /// Enqueue timestamp, epoch milliseconds. FIFO tie-break within a
    /// priority tier.
    pub created_at: i64,
    /// Count of prior failed attempts.
    pub attempt: i32,
    pub attempt_limit: i32,
    pub state: OperationState,
    pub last_error: Option<String>,
}

/// Fields the enqueue API supplies; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewOperation {
    pub kind: String,
    pub method: String,
    pub target_url: String,
    pub payload_json: String,
    pub priority: i32,
    pub created_at: i64,
    pub attempt_limit: i32,
}

impl NewOperation {
    /// Build a new operation with priority resolved from the kind table
    /// and the default attempt limit.
    pub fn new(
        kind: impl Into<String>,
        method: impl Into<String>,
        target_url: impl Into<String>,
        payload_json: impl Into<String>,
        created_at: i64,
    ) -> Self {
        let kind = kind.into();
        let priority = priority_for_kind(&kind);
        Self {
            kind,
            method: method.into(),
            target_url: target_url.into(),
            payload_json: payload_json.into(),
            priority,
            created_at,
            attempt_limit: DEFAULT_ATTEMPT_LIMIT,
        }
    }
}

/// Snapshot pair captured when the remote rejects a write for version
/// mismatch. Holds enough of the original operation to re-enqueue a
/// corrected one after resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConflictRecord {
    pub id: i64,
    /// Business entity the operation targeted.
    pub entity_id: String,
    pub kind: String,
    pub method: String,
    pub target_url: String,
    pub local_version: i64,
    pub local_payload: String,
    pub remote_version: i64,
    pub remote_payload: String,
    /// Detection timestamp, epoch milliseconds.
    pub detected_at: i64,
}

/// Conflict fields before the inbox assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewConflict {
    pub entity_id: String,
    pub kind: String,
    pub method: String,
    pub target_url: String,
    pub local_version: i64,
    pub local_payload: String,
    pub remote_version: i64,
    pub remote_payload: String,
    pub detected_at: i64,
}

/// User- or policy-selected conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictChoice {
    /// Re-enqueue the local payload with `version = remote + 1`.
    UseLocal,
    /// Accept the server payload as the new local baseline.
    UseServer,
    /// Shallow field merge, local fields winning on overlap.
    Merge,
}

impl_status_conversions!(ConflictChoice {
    UseLocal => "use-local",
    UseServer => "use-server",
    Merge => "merge",
});

/// Notifications surfaced to UI toasts or logs. Outputs only; consumers
/// never feed these back into queue behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// An operation exhausted its attempt limit.
    TerminalFailure { operation_id: i64, kind: String, error: String },
    /// A version mismatch moved an operation into the conflict inbox.
    ConflictDetected { conflict_id: i64, entity_id: String },
    /// A drain pass finished.
    DrainCompleted { attempted: usize, delivered: usize, retried: usize, conflicts: usize, failed: usize },
}
