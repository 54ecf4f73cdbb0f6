//! Shared fixtures for the infra integration tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ordersync_core::{
    ConflictInbox, NetworkMonitor, OperationQueue, RemoteRequest, RemoteResponse, RemoteTransport,
    SyncEventSink, TransportError,
};
use ordersync_domain::SyncEvent;
use ordersync_infra::{
    DbManager, DispatcherConfig, NetworkState, SqliteConflictInbox, SqliteOperationQueue,
    SyncDispatcher,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

static TRACING: std::sync::Once = std::sync::Once::new();

/// Install a test subscriber once per binary. `RUST_LOG` overrides the
/// default `info` filter.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with the schema applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("ordersync.db");

        let manager = Arc::new(DbManager::new(&db_path, 4).expect("db manager should be created"));
        manager.run_migrations().expect("migrations should apply");

        Self { manager, _temp_dir: temp_dir }
    }

    /// Reopen the same database file with a fresh pool, simulating a
    /// process restart.
    pub fn reopen(&self) -> Arc<DbManager> {
        let manager =
            Arc::new(DbManager::new(self.manager.path(), 4).expect("db manager should reopen"));
        manager.run_migrations().expect("migrations should be idempotent");
        manager
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport double with a scripted response queue. Once the script is
/// exhausted every call succeeds with a 200. All calls are recorded in
/// order.
pub struct RecordingTransport {
    responses: Mutex<VecDeque<Result<RemoteResponse, TransportError>>>,
    calls: Mutex<Vec<RemoteRequest>>,
}

impl RecordingTransport {
    pub fn new(responses: Vec<Result<RemoteResponse, TransportError>>) -> Self {
        Self { responses: Mutex::new(responses.into()), calls: Mutex::new(Vec::new()) }
    }

    pub fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn called_urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl RemoteTransport for RecordingTransport {
    async fn execute(&self, request: &RemoteRequest) -> Result<RemoteResponse, TransportError> {
        self.calls.lock().push(request.clone());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(RemoteResponse { status: 200, body: "{}".to_string() }))
    }
}

/// Scripted response helpers.
pub fn ok_response() -> Result<RemoteResponse, TransportError> {
    Ok(RemoteResponse { status: 200, body: "{}".to_string() })
}

pub fn server_error() -> Result<RemoteResponse, TransportError> {
    Err(TransportError::Status { code: 500, message: "internal error".to_string(), conflict: None })
}

/// Event sink that records everything it is told.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().clone()
    }
}

impl SyncEventSink for CollectingSink {
    fn notify(&self, event: SyncEvent) {
        self.events.lock().push(event);
    }
}

/// Dispatcher plus every injected collaborator, for assertions.
pub struct TestHarness {
    pub dispatcher: SyncDispatcher,
    pub queue: Arc<SqliteOperationQueue>,
    pub inbox: Arc<SqliteConflictInbox>,
    pub network: Arc<NetworkState>,
    pub sink: Arc<CollectingSink>,
    pub db: TestDatabase,
}

/// Wire a dispatcher over a fresh database and the given transport.
pub fn harness(transport: Arc<dyn RemoteTransport>, config: DispatcherConfig) -> TestHarness {
    init_tracing();
    let db = TestDatabase::new();
    harness_over(db, transport, config)
}

/// Wire a dispatcher over an existing database, e.g. after `reopen`.
pub fn harness_over(
    db: TestDatabase,
    transport: Arc<dyn RemoteTransport>,
    config: DispatcherConfig,
) -> TestHarness {
    let queue = Arc::new(SqliteOperationQueue::new(Arc::clone(&db.manager)));
    let inbox = Arc::new(SqliteConflictInbox::new(Arc::clone(&db.manager)));
    let network = Arc::new(NetworkState::new(true));
    let sink = Arc::new(CollectingSink::default());

    let dispatcher = SyncDispatcher::new(
        Arc::clone(&queue) as Arc<dyn OperationQueue>,
        Arc::clone(&inbox) as Arc<dyn ConflictInbox>,
        transport,
        Arc::clone(&network) as Arc<dyn NetworkMonitor>,
        Arc::clone(&sink) as Arc<dyn SyncEventSink>,
        config,
    );

    TestHarness { dispatcher, queue, inbox, network, sink, db }
}

/// Manual-drain configuration: no enqueue trigger, backoff long enough
/// that scheduled callbacks never fire inside a test.
pub fn manual_config() -> DispatcherConfig {
    DispatcherConfig {
        retry: ordersync_core::RetryPolicy::with_schedule(vec![Duration::from_secs(60)]),
        drain_on_enqueue: false,
    }
}
