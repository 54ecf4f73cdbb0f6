//! Infrastructure adapters for the OrderSync queue.
//!
//! Implements the `ordersync-core` ports: a rusqlite-backed durable store,
//! a reqwest-backed remote transport, and the dispatcher that drains the
//! queue, applies the retry policy, and routes version conflicts to the
//! inbox.

pub mod database;
pub mod errors;
pub mod http;
pub mod sync;

pub use database::{DbManager, SqliteConflictInbox, SqliteOperationQueue};
pub use errors::InfraError;
pub use http::{HttpTransport, HttpTransportConfig, StaticTokenProvider};
pub use sync::{DispatcherConfig, DrainReport, NetworkState, SyncDispatcher, TracingEventSink};
