//! Sync dispatcher: enqueue API, single-flight drain loop, retry
//! scheduling, and conflict routing.
//!
//! One dispatcher owns the drain over a store. All collaborators are
//! injected ports, so the same wiring runs against SQLite plus HTTP in
//! production and against scripted fakes in tests. The dispatcher is
//! cheaply cloneable; clones share the store handles and the single-flight
//! guard, which is how spawned backoff callbacks re-enter `drain`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ordersync_core::{
    shallow_merge, ConflictInbox, FailureClass, NetworkMonitor, OperationQueue, RemoteRequest,
    RemoteTransport, RetryDecision, RetryPolicy, SyncEventSink, TransportError,
};
use ordersync_domain::{
    ConflictChoice, ConflictRecord, NewConflict, NewOperation, OperationState, OrderSyncError,
    QueuedOperation, Result, SyncEvent,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::errors::InfraError;

/// Terminal diagnostic written when the attempt limit is reached.
const MAX_ATTEMPTS_MSG: &str = "max attempts exceeded";

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Backoff policy applied to retryable and fatal failures.
    pub retry: RetryPolicy,
    /// Whether a successful enqueue requests a drain. Tests that assert
    /// exact transport call counts disable this and drain explicitly.
    pub drain_on_enqueue: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { retry: RetryPolicy::default(), drain_on_enqueue: true }
    }
}

/// Summary of one `drain` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    /// False when the pass was skipped (guard held by another caller, or
    /// the network was offline). All counts are zero in that case.
    pub ran: bool,
    pub attempted: usize,
    pub delivered: usize,
    pub retried: usize,
    pub conflicts: usize,
    pub failed: usize,
}

impl DrainReport {
    fn skipped() -> Self {
        Self::default()
    }
}

/// Outcome of processing a single queued operation.
enum OpOutcome {
    Delivered,
    Retried,
    Conflict,
    Failed,
}

/// Clears the single-flight flag on every exit path, including unwinds
/// out of storage or transport calls.
struct DrainGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Priority-ordered, retrying delivery pipeline over a durable store.
#[derive(Clone)]
pub struct SyncDispatcher {
    queue: Arc<dyn OperationQueue>,
    conflicts: Arc<dyn ConflictInbox>,
    transport: Arc<dyn RemoteTransport>,
    network: Arc<dyn NetworkMonitor>,
    events: Arc<dyn SyncEventSink>,
    config: DispatcherConfig,
    draining: Arc<AtomicBool>,
}

impl SyncDispatcher {
    /// Wire a dispatcher over the given ports.
    pub fn new(
        queue: Arc<dyn OperationQueue>,
        conflicts: Arc<dyn ConflictInbox>,
        transport: Arc<dyn RemoteTransport>,
        network: Arc<dyn NetworkMonitor>,
        events: Arc<dyn SyncEventSink>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            queue,
            conflicts,
            transport,
            network,
            events,
            config,
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record a local mutation intent. Returns once the row is durably
    /// persisted; the follow-up drain request is best-effort and its
    /// failure never surfaces here.
    #[instrument(skip(self, body))]
    pub async fn enqueue(
        &self,
        kind: &str,
        method: &str,
        url: &str,
        body: &Value,
    ) -> Result<i64> {
        validate_enqueue(kind, method, url)?;

        let op =
            NewOperation::new(kind, method.to_uppercase(), url, body.to_string(), now_ms());
        let id = self.queue.insert(&op).await?;

        debug!(operation_id = id, kind, priority = op.priority, "operation enqueued");

        if self.config.drain_on_enqueue {
            self.trigger_drain("enqueue");
        }
        Ok(id)
    }

    /// One pass over the pending set. Safe to call from any number of
    /// triggers concurrently: the single-flight guard turns overlapping
    /// calls into no-ops rather than queued second runs.
    #[instrument(skip(self))]
    pub async fn drain(&self) -> Result<DrainReport> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("drain already in progress");
            return Ok(DrainReport::skipped());
        }
        let _guard = DrainGuard { flag: Arc::clone(&self.draining) };

        if self.network.is_offline() {
            debug!("offline, drain deferred to the next online signal");
            return Ok(DrainReport::skipped());
        }

        // Nothing is genuinely in flight while we hold the guard, so any
        // in-flight row was stranded by a crash mid-delivery. Put it back.
        let recovered = self.queue.recover_in_flight().await?;
        if recovered > 0 {
            warn!(recovered, "recovered stranded in-flight operations");
        }

        let mut pending = self.queue.list_by_state(OperationState::Pending).await?;
        pending.sort_by(|a, b| {
            (a.priority, a.created_at, a.id).cmp(&(b.priority, b.created_at, b.id))
        });

        let mut report = DrainReport { ran: true, attempted: pending.len(), ..Default::default() };

        for op in pending {
            let (id, kind) = (op.id, op.kind.clone());
            // A store error on one record must not abort the pass; the
            // remaining records still get their attempt.
            match self.process_one(op).await {
                Ok(OpOutcome::Delivered) => report.delivered += 1,
                Ok(OpOutcome::Retried) => report.retried += 1,
                Ok(OpOutcome::Conflict) => report.conflicts += 1,
                Ok(OpOutcome::Failed) => report.failed += 1,
                Err(err) => {
                    warn!(operation_id = id, kind = %kind, error = %err, "store error during drain");
                    report.failed += 1;
                }
            }
        }

        self.events.notify(SyncEvent::DrainCompleted {
            attempted: report.attempted,
            delivered: report.delivered,
            retried: report.retried,
            conflicts: report.conflicts,
            failed: report.failed,
        });

        Ok(report)
    }

    /// Inbound online transition; used only as a drain trigger.
    pub fn notify_online(&self) {
        self.trigger_drain("network-online");
    }

    /// Operator retry of a terminal-failed operation: back to `pending`
    /// with a fresh attempt budget.
    #[instrument(skip(self))]
    pub async fn retry_failed(&self, id: i64) -> Result<()> {
        self.queue.reset_for_retry(id).await?;
        info!(operation_id = id, "failed operation reset for retry");
        self.trigger_drain("operator-retry");
        Ok(())
    }

    /// Apply a three-way decision to a detected conflict. Re-enqueues the
    /// corrected operation, removes the conflict record, and requests a
    /// drain. Returns the new operation id.
    #[instrument(skip(self))]
    pub async fn resolve_conflict(&self, conflict_id: i64, choice: ConflictChoice) -> Result<i64> {
        let conflict = self.require_conflict(conflict_id).await?;

        let local: Value =
            serde_json::from_str(&conflict.local_payload).map_err(InfraError::from)?;
        let remote: Value =
            serde_json::from_str(&conflict.remote_payload).map_err(InfraError::from)?;

        // A 409 without a server snapshot stores `null` as the remote side;
        // there is nothing to take or merge from it.
        if remote.is_null() && choice != ConflictChoice::UseLocal {
            return Err(OrderSyncError::InvalidInput(format!(
                "conflict {conflict_id} carries no server snapshot; only use-local or discard applies"
            )));
        }

        let (mut payload, version) = match choice {
            ConflictChoice::UseLocal => (local, conflict.remote_version + 1),
            ConflictChoice::UseServer => (remote, conflict.remote_version),
            ConflictChoice::Merge => {
                (shallow_merge(&local, &remote), conflict.remote_version + 1)
            }
        };
        if let Value::Object(map) = &mut payload {
            map.insert("version".to_string(), Value::from(version));
        }

        let op = NewOperation::new(
            conflict.kind.clone(),
            conflict.method.clone(),
            conflict.target_url.clone(),
            payload.to_string(),
            now_ms(),
        );
        let id = self.queue.insert(&op).await?;
        self.conflicts.delete(conflict_id).await?;

        info!(conflict_id, operation_id = id, choice = %choice, "conflict resolved");
        self.trigger_drain("conflict-resolved");
        Ok(id)
    }

    /// Drop a conflict without re-enqueueing anything.
    #[instrument(skip(self))]
    pub async fn discard_conflict(&self, conflict_id: i64) -> Result<()> {
        self.require_conflict(conflict_id).await?;
        self.conflicts.delete(conflict_id).await?;
        info!(conflict_id, "conflict discarded");
        Ok(())
    }

    /// Unresolved conflicts awaiting a decision.
    pub async fn conflicts(&self) -> Result<Vec<ConflictRecord>> {
        self.conflicts.list().await
    }

    /// Operations waiting for delivery.
    pub async fn pending_count(&self) -> Result<u64> {
        self.queue.count_by_state(OperationState::Pending).await
    }

    /// Operations parked as terminal-failed.
    pub async fn failed_count(&self) -> Result<u64> {
        self.queue.count_by_state(OperationState::Failed).await
    }

    /// True while a drain pass is active.
    pub fn is_syncing(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    async fn require_conflict(&self, conflict_id: i64) -> Result<ConflictRecord> {
        self.conflicts
            .get(conflict_id)
            .await?
            .ok_or_else(|| OrderSyncError::NotFound(format!("conflict {conflict_id}")))
    }

    async fn process_one(&self, op: QueuedOperation) -> Result<OpOutcome> {
        self.queue.mark_in_flight(op.id).await?;

        let request = RemoteRequest {
            method: op.method.clone(),
            url: op.target_url.clone(),
            payload_json: op.payload_json.clone(),
        };

        match self.transport.execute(&request).await {
            Ok(response) => {
                debug!(operation_id = op.id, status = response.status, "operation delivered");
                self.queue.delete(op.id).await?;
                Ok(OpOutcome::Delivered)
            }
            Err(err) => match err.classify() {
                FailureClass::Conflict => {
                    self.record_conflict(&op, err).await?;
                    Ok(OpOutcome::Conflict)
                }
                // Fatal client errors take the same bookkeeping as
                // retryable ones; the attempt limit parks them quickly.
                FailureClass::Retryable | FailureClass::Fatal => {
                    self.handle_failure(&op, &err).await
                }
            },
        }
    }

    async fn handle_failure(
        &self,
        op: &QueuedOperation,
        err: &TransportError,
    ) -> Result<OpOutcome> {
        let attempt = op.attempt + 1;

        match self.config.retry.decide(attempt, op.attempt_limit) {
            RetryDecision::GiveUp => {
                self.queue.mark_failed(op.id, MAX_ATTEMPTS_MSG).await?;
                warn!(operation_id = op.id, kind = %op.kind, attempt, "operation failed terminally");
                self.events.notify(SyncEvent::TerminalFailure {
                    operation_id: op.id,
                    kind: op.kind.clone(),
                    error: format!("{MAX_ATTEMPTS_MSG}: {err}"),
                });
                Ok(OpOutcome::Failed)
            }
            RetryDecision::RetryAfter(delay) => {
                let last_error = format!(
                    "{err}; next retry in {delay:?} (attempt {attempt}/{limit})",
                    limit = op.attempt_limit
                );
                self.queue.record_retry(op.id, attempt, &last_error).await?;
                debug!(operation_id = op.id, attempt, ?delay, "retry scheduled");
                self.schedule_redrain(delay);
                Ok(OpOutcome::Retried)
            }
        }
    }

    /// A version mismatch moves the operation out of the active queue and
    /// into the conflict inbox; `attempt` is never touched on this path.
    async fn record_conflict(&self, op: &QueuedOperation, err: TransportError) -> Result<()> {
        let local: Value = serde_json::from_str(&op.payload_json).unwrap_or(Value::Null);
        let local_version = local.get("version").and_then(Value::as_i64).unwrap_or(0);

        // Servers should attach their snapshot to the 409; when they do
        // not, keep the local side and record the remote side as unknown.
        let (entity_id, remote_version, remote_payload) = match err.into_conflict_body() {
            Some(body) => (body.entity_id, body.remote_version, body.remote_payload.to_string()),
            None => (fallback_entity_id(&local, &op.target_url), local_version, Value::Null.to_string()),
        };

        let conflict = NewConflict {
            entity_id: entity_id.clone(),
            kind: op.kind.clone(),
            method: op.method.clone(),
            target_url: op.target_url.clone(),
            local_version,
            local_payload: op.payload_json.clone(),
            remote_version,
            remote_payload,
            detected_at: now_ms(),
        };

        let conflict_id = self.conflicts.insert(&conflict).await?;
        self.queue.delete(op.id).await?;

        warn!(operation_id = op.id, conflict_id, entity_id = %entity_id, "version conflict recorded");
        self.events.notify(SyncEvent::ConflictDetected { conflict_id, entity_id });
        Ok(())
    }

    /// Deferred re-drain after a backoff delay. The callback checks the
    /// connectivity flag at fire time so no attempt is wasted while
    /// disconnected; the next online transition covers the record anyway.
    fn schedule_redrain(&self, delay: Duration) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if this.network.is_offline() {
                debug!("scheduled retry skipped while offline");
                return;
            }
            if let Err(err) = this.drain().await {
                warn!(error = %err, "scheduled re-drain failed");
            }
        });
    }

    fn trigger_drain(&self, reason: &'static str) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.drain().await {
                warn!(reason, error = %err, "triggered drain failed");
            }
        });
    }
}

/// Programmer errors are rejected here, before anything is persisted.
fn validate_enqueue(kind: &str, method: &str, url: &str) -> Result<()> {
    if kind.trim().is_empty() {
        return Err(OrderSyncError::InvalidInput("operation kind must not be empty".into()));
    }
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(OrderSyncError::InvalidInput(format!("invalid HTTP method: {method:?}")));
    }
    if url.trim().is_empty() {
        return Err(OrderSyncError::InvalidInput("target url must not be empty".into()));
    }
    Ok(())
}

fn fallback_entity_id(local: &Value, target_url: &str) -> String {
    local
        .get("entity_id")
        .or_else(|| local.get("id"))
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| target_url.to_string())
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
