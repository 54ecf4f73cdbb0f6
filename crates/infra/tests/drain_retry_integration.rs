//! Integration tests for drain failure handling and retry scheduling.
//!
//! **Coverage:**
//! - One failing operation never blocks the rest of the pass
//! - Scheduled backoff callbacks drive redelivery to completion
//! - A callback firing while offline wastes no attempt
//! - Fatal client errors exhaust the attempt limit and park terminally

#![allow(dead_code)]

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use ordersync_core::{OperationQueue, RemoteTransport, RetryPolicy, TransportError};
use ordersync_domain::{OperationState, SyncEvent};
use ordersync_infra::DispatcherConfig;
use serde_json::json;
use support::{harness, manual_config, server_error, RecordingTransport};

fn fast_retry_config() -> DispatcherConfig {
    DispatcherConfig {
        retry: RetryPolicy::with_schedule(vec![Duration::from_millis(20)]),
        drain_on_enqueue: false,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn one_failure_does_not_block_the_pass() {
    // second response fails, first and third succeed
    let transport = Arc::new(RecordingTransport::new(vec![
        support::ok_response(),
        server_error(),
        support::ok_response(),
    ]));
    let h = harness(Arc::clone(&transport) as Arc<dyn RemoteTransport>, manual_config());

    let first =
        h.dispatcher.enqueue("note", "POST", "/note-1", &json!({})).await.expect("enqueue");
    let second =
        h.dispatcher.enqueue("note", "POST", "/note-2", &json!({})).await.expect("enqueue");
    let third =
        h.dispatcher.enqueue("note", "POST", "/note-3", &json!({})).await.expect("enqueue");

    let report = h.dispatcher.drain().await.expect("drain");
    assert_eq!(report.attempted, 3);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.retried, 1);
    assert_eq!(transport.call_count(), 3);

    // delivered rows are gone, the failed one is pending with attempt 1
    assert!(h.queue.get(first).await.expect("get").is_none());
    assert!(h.queue.get(third).await.expect("get").is_none());
    let failed = h.queue.get(second).await.expect("get").expect("row retained");
    assert_eq!(failed.state, OperationState::Pending);
    assert_eq!(failed.attempt, 1);

    let summary = h
        .sink
        .events()
        .into_iter()
        .find(|e| matches!(e, SyncEvent::DrainCompleted { .. }))
        .expect("drain summary emitted");
    assert_eq!(
        summary,
        SyncEvent::DrainCompleted { attempted: 3, delivered: 2, retried: 1, conflicts: 0, failed: 0 }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn backoff_callbacks_drive_redelivery() {
    // two transient failures, then success
    let transport = Arc::new(RecordingTransport::new(vec![server_error(), server_error()]));
    let h = harness(Arc::clone(&transport) as Arc<dyn RemoteTransport>, fast_retry_config());

    h.dispatcher.enqueue("completion", "POST", "/orders/1/complete", &json!({})).await.expect("enqueue");
    h.dispatcher.drain().await.expect("drain");

    // callbacks at +20ms and +40ms finish the job without further input
    let mut delivered = false;
    for _ in 0..200 {
        if h.dispatcher.pending_count().await.expect("count") == 0 {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(delivered, "timed out waiting for scheduled retries to deliver");
    assert_eq!(transport.call_count(), 3);
    assert_eq!(h.dispatcher.failed_count().await.expect("count"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_callback_wastes_no_attempt() {
    let transport = Arc::new(RecordingTransport::new(vec![server_error()]));
    let config = DispatcherConfig {
        retry: RetryPolicy::with_schedule(vec![Duration::from_millis(50)]),
        drain_on_enqueue: false,
    };
    let h = harness(Arc::clone(&transport) as Arc<dyn RemoteTransport>, config);

    let id =
        h.dispatcher.enqueue("note", "POST", "/orders/2/note", &json!({})).await.expect("enqueue");
    h.dispatcher.drain().await.expect("drain");
    assert_eq!(transport.call_count(), 1);

    // connectivity drops before the callback fires
    h.network.set_offline();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(transport.call_count(), 1, "no attempt while offline");
    let op = h.queue.get(id).await.expect("get").expect("row retained");
    assert_eq!(op.state, OperationState::Pending);
    assert_eq!(op.attempt, 1);

    // the online transition picks the record back up
    h.network.set_online();
    h.dispatcher.notify_online();

    let mut delivered = false;
    for _ in 0..200 {
        if h.dispatcher.pending_count().await.expect("count") == 0 {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(delivered, "timed out waiting for post-online delivery");
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn fatal_client_errors_exhaust_and_park() {
    let not_found = || {
        Err(TransportError::Status {
            code: 404,
            message: "no such order".to_string(),
            conflict: None,
        })
    };
    let transport =
        Arc::new(RecordingTransport::new(vec![not_found(), not_found(), not_found()]));
    let h = harness(Arc::clone(&transport) as Arc<dyn RemoteTransport>, manual_config());

    let id = h
        .dispatcher
        .enqueue("attachment", "POST", "/orders/9/attachment", &json!({}))
        .await
        .expect("enqueue");

    for _ in 0..3 {
        h.dispatcher.drain().await.expect("drain");
    }

    let op = h.queue.get(id).await.expect("get").expect("row retained");
    assert_eq!(op.state, OperationState::Failed);
    assert_eq!(op.attempt, 3);
    assert_eq!(op.last_error.as_deref(), Some("max attempts exceeded"));
    assert_eq!(transport.call_count(), 3);

    assert!(h.sink.events().iter().any(|e| matches!(
        e,
        SyncEvent::TerminalFailure { operation_id, .. } if *operation_id == id
    )));

    // terminal rows are invisible to further drains
    let report = h.dispatcher.drain().await.expect("drain");
    assert_eq!(report.attempted, 0);
    assert_eq!(h.dispatcher.failed_count().await.expect("count"), 1);
}
