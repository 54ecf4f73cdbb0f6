//! Port interfaces for sync operations.
//!
//! All adapters (SQLite store, HTTP transport, network signal, credential
//! provider, telemetry sink) are injected through these traits; nothing in
//! the dispatcher reaches for an ambient singleton.

use async_trait::async_trait;
use ordersync_domain::{
    ConflictRecord, NewConflict, NewOperation, OperationState, QueuedOperation, Result, SyncEvent,
};

use crate::sync::transport::{RemoteRequest, RemoteResponse, TransportError};

/// Durable store for queued operations. `state` must be indexed so a drain
/// can pull the pending set cheaply.
#[async_trait]
pub trait OperationQueue: Send + Sync {
    /// Persist a new operation and return its assigned id.
    async fn insert(&self, op: &NewOperation) -> Result<i64>;

    /// Fetch a single operation.
    async fn get(&self, id: i64) -> Result<Option<QueuedOperation>>;

    /// All operations currently in `state`, in store order.
    async fn list_by_state(&self, state: OperationState) -> Result<Vec<QueuedOperation>>;

    /// Transition a pending operation to in-flight.
    async fn mark_in_flight(&self, id: i64) -> Result<()>;

    /// Return all in-flight rows to `pending` and report how many were
    /// touched. A row can only be stranded in-flight by a crash between
    /// dispatch and its outcome landing, so this runs at the start of a
    /// drain pass, where the single-flight guard guarantees nothing is
    /// genuinely in flight.
    async fn recover_in_flight(&self) -> Result<u64>;

    /// Record a failed attempt and return the row to `pending`.
    async fn record_retry(&self, id: i64, attempt: i32, last_error: &str) -> Result<()>;

    /// Move an operation to terminal `failed`.
    async fn mark_failed(&self, id: i64, error: &str) -> Result<()>;

    /// Operator retry: reset a failed row to `pending` with `attempt = 0`.
    async fn reset_for_retry(&self, id: i64) -> Result<()>;

    /// Remove a delivered (or resolved-away) operation.
    async fn delete(&self, id: i64) -> Result<()>;

    /// Count operations in `state`.
    async fn count_by_state(&self, state: OperationState) -> Result<u64>;

    /// Administrative wipe of the queue.
    async fn clear(&self) -> Result<()>;
}

/// Durable inbox of detected version conflicts awaiting a decision.
#[async_trait]
pub trait ConflictInbox: Send + Sync {
    /// Persist a detected conflict and return its assigned id.
    async fn insert(&self, conflict: &NewConflict) -> Result<i64>;

    /// Fetch a single conflict.
    async fn get(&self, id: i64) -> Result<Option<ConflictRecord>>;

    /// All unresolved conflicts, oldest first.
    async fn list(&self) -> Result<Vec<ConflictRecord>>;

    /// Remove a resolved or discarded conflict.
    async fn delete(&self, id: i64) -> Result<()>;

    /// Administrative wipe of the inbox.
    async fn clear(&self) -> Result<()>;
}

/// Executes one remote mutation. Timeouts are the transport's concern; the
/// dispatcher never cancels an in-flight call.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn execute(
        &self,
        request: &RemoteRequest,
    ) -> std::result::Result<RemoteResponse, TransportError>;
}

/// Connectivity signal consumed by the dispatcher. The online transition
/// itself arrives through `SyncDispatcher::notify_online`; this trait only
/// answers the synchronous "are we offline right now" check.
pub trait NetworkMonitor: Send + Sync {
    fn is_offline(&self) -> bool;
}

/// Async credential lookup for the transport's bearer token.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Telemetry sink for terminal failures, conflict detections, and drain
/// summaries. Infallible by construction so a misbehaving consumer can
/// never throw back into the drain loop.
pub trait SyncEventSink: Send + Sync {
    fn notify(&self, event: SyncEvent);
}
