//! Dispatcher, drain loop, and sync collaborators.

mod dispatcher;
mod network;
mod telemetry;

pub use dispatcher::{DispatcherConfig, DrainReport, SyncDispatcher};
pub use network::NetworkState;
pub use telemetry::TracingEventSink;
