//! Core ports and pure policies for the OrderSync queue.
//!
//! The sync module defines the trait seams every adapter implements
//! (store, transport, network signal, credentials, telemetry) plus the two
//! pieces of pure logic the dispatcher applies: the fixed retry/backoff
//! policy and the shallow conflict merge.

pub mod sync;

pub use sync::merge::shallow_merge;
pub use sync::ports::{
    AccessTokenProvider, ConflictInbox, NetworkMonitor, OperationQueue, RemoteTransport,
    SyncEventSink,
};
pub use sync::retry::{RetryDecision, RetryPolicy};
pub use sync::transport::{
    ConflictBody, FailureClass, RemoteRequest, RemoteResponse, TransportError,
};
