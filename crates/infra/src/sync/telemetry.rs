//! Log-backed event sink.

use ordersync_core::SyncEventSink;
use ordersync_domain::SyncEvent;
use tracing::{info, warn};

/// Default sink that turns queue events into structured log lines. UI
/// layers substitute their own toast-backed sink through the same port.
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

impl SyncEventSink for TracingEventSink {
    fn notify(&self, event: SyncEvent) {
        match event {
            SyncEvent::TerminalFailure { operation_id, kind, error } => {
                warn!(operation_id, kind = %kind, error = %error, "operation failed terminally");
            }
            SyncEvent::ConflictDetected { conflict_id, entity_id } => {
                warn!(conflict_id, entity_id = %entity_id, "version conflict detected");
            }
            SyncEvent::DrainCompleted { attempted, delivered, retried, conflicts, failed } => {
                info!(attempted, delivered, retried, conflicts, failed, "drain pass completed");
            }
        }
    }
}
