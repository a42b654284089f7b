//! End-to-end behaviour of the polling loop, dispatcher and acknowledger.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use queue_dispatch::consumer::{
    shutdown_channel, Acknowledger, DispatchOutcome, PollingMode, QueuePoller, ShutdownSignal,
};
use queue_dispatch::messaging::{
    InMemoryTransport, Message, QueueTransport, ReceiveRequest, SendMessageRequest,
};
use queue_dispatch::registry::{HandlerRegistry, MessageHandler, QueueBinding};

fn registry_with(queue_id: &str, handler: Arc<ScriptedHandler>) -> Arc<HandlerRegistry> {
    Arc::new(
        HandlerRegistry::builder()
            .register_arc(QueueBinding::new(queue_id), handler as Arc<dyn MessageHandler>)
            .build()
            .expect("valid registry"),
    )
}

#[tokio::test]
async fn test_single_message_receive_invoke_delete() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    transport.seed("Q1", &["a"]).await;
    let handler = Arc::new(ScriptedHandler::new());

    let poller = QueuePoller::new(
        registry_with("Q1", handler.clone()),
        transport.clone(),
        fast_consumer_config(),
    );
    let report = poller
        .poll_queue_once("Q1", &ShutdownSignal::never())
        .await
        .expect("one batch dispatched");

    assert_eq!(transport.receive_count(), 1);
    assert_eq!(handler.calls(), vec!["a".to_string()]);
    assert_eq!(transport.delete_calls().len(), 1);
    assert_eq!(report.acknowledged(), 1);
    assert_eq!(transport.inner.queue_length("Q1"), 0);
}

#[tokio::test]
async fn test_receive_uses_reference_parameters() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    let handler = Arc::new(ScriptedHandler::new());
    let poller = QueuePoller::new(
        registry_with("Q1", handler),
        transport.clone(),
        fast_consumer_config(),
    );

    poller.poll_queue_once("Q1", &ShutdownSignal::never()).await;

    let requests = transport.receive_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].queue_id, "Q1");
    assert_eq!(requests[0].max_messages, 10);
    assert_eq!(requests[0].attribute_names, vec!["All".to_string()]);
    assert_eq!(requests[0].wait_time, fast_consumer_config().wait_time);
}

#[tokio::test]
async fn test_failure_on_second_message_leaves_only_it() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    transport.seed("Q1", &["one", "fail-two", "three"]).await;
    let handler = Arc::new(ScriptedHandler::new());

    let poller = QueuePoller::new(
        registry_with("Q1", handler.clone()),
        transport.clone(),
        fast_consumer_config(),
    );
    let report = poller
        .poll_queue_once("Q1", &ShutdownSignal::never())
        .await
        .expect("batch dispatched");

    assert_eq!(handler.calls(), vec!["one", "fail-two", "three"]);
    assert_eq!(report.acknowledged(), 2);
    assert_eq!(report.count(DispatchOutcome::HandlerError), 1);
    assert_eq!(transport.delete_calls().len(), 2);
    assert_eq!(transport.inner.message_bodies("Q1"), vec!["fail-two"]);
}

#[tokio::test]
async fn test_panicking_handler_does_not_stop_batch() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    transport.seed("Q1", &["panic-first", "second"]).await;
    let handler = Arc::new(ScriptedHandler::new());

    let poller = QueuePoller::new(
        registry_with("Q1", handler.clone()),
        transport.clone(),
        fast_consumer_config(),
    );
    let report = poller
        .poll_queue_once("Q1", &ShutdownSignal::never())
        .await
        .expect("batch dispatched");

    assert_eq!(handler.call_count(), 2);
    let outcomes: Vec<_> = report.outcomes.iter().map(|o| o.outcome).collect();
    assert_eq!(
        outcomes,
        vec![DispatchOutcome::HandlerError, DispatchOutcome::Acknowledged]
    );
    assert_eq!(transport.inner.message_bodies("Q1"), vec!["panic-first"]);
}

#[tokio::test]
async fn test_declined_message_is_not_deleted() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    transport.seed("Q1", &["false-not-yet"]).await;
    let handler = Arc::new(ScriptedHandler::new());

    let poller = QueuePoller::new(
        registry_with("Q1", handler),
        transport.clone(),
        fast_consumer_config(),
    );
    let report = poller
        .poll_queue_once("Q1", &ShutdownSignal::never())
        .await
        .expect("batch dispatched");

    assert_eq!(report.count(DispatchOutcome::LeftForRedelivery), 1);
    assert!(transport.delete_calls().is_empty());
    assert_eq!(transport.inner.queue_length("Q1"), 1);
}

#[tokio::test]
async fn test_unconfirmed_delete_is_not_retried() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    transport.seed("Q1", &["a", "b"]).await;
    transport.set_delete_status(500);
    let handler = Arc::new(ScriptedHandler::new());

    let poller = QueuePoller::new(
        registry_with("Q1", handler.clone()),
        transport.clone(),
        fast_consumer_config(),
    );
    let report = poller
        .poll_queue_once("Q1", &ShutdownSignal::never())
        .await
        .expect("batch dispatched");

    // One delete attempt per successful message, no retries
    assert_eq!(transport.delete_calls().len(), 2);
    assert_eq!(report.count(DispatchOutcome::AcknowledgeFailed), 2);
    assert!(report.outcomes.iter().all(|o| o.outcome.is_success()));
    assert_eq!(poller.stats().snapshot().acknowledge_failures, 2);
    assert_eq!(transport.inner.queue_length("Q1"), 2);
}

#[tokio::test]
async fn test_delete_errors_keep_loop_running() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    transport.seed("Q1", &["a"]).await;
    transport.fail_deletes();
    let handler = Arc::new(ScriptedHandler::new());

    let handle = QueuePoller::new(
        registry_with("Q1", handler.clone()),
        transport.clone(),
        fast_consumer_config(),
    )
    .spawn();

    assert!(wait_until(Duration::from_secs(2), || transport.delete_calls().len() == 1).await);
    let receives_after_failure = transport.receive_count();
    assert!(
        wait_until(Duration::from_secs(2), || transport.receive_count() > receives_after_failure)
            .await,
        "loop keeps polling after a failed delete"
    );
    assert!(!handle.is_finished());

    let stats = handle.shutdown().await.expect("clean shutdown");
    assert_eq!(stats.acknowledge_failures, 1);
}

#[tokio::test]
async fn test_shutdown_is_not_blocked_by_hung_delete() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    transport.seed("Q1", &["a"]).await;
    transport.hang_deletes();
    let handler = Arc::new(ScriptedHandler::new());

    let handle = QueuePoller::new(
        registry_with("Q1", handler.clone()),
        transport.clone(),
        fast_consumer_config(),
    )
    .spawn();

    assert!(wait_until(Duration::from_secs(2), || transport.delete_calls().len() == 1).await);

    let stats = tokio::time::timeout(Duration::from_secs(3), handle.shutdown())
        .await
        .expect("shutdown finishes after the delete grace period")
        .expect("poller task joined");

    assert_eq!(handler.call_count(), 1);
    assert_eq!(stats.acknowledge_failures, 1);
    assert_eq!(stats.messages_acknowledged, 0);
    assert_eq!(transport.inner.queue_length("Q1"), 1);
}

#[tokio::test]
async fn test_acknowledging_twice_is_harmless() {
    let transport = Arc::new(InMemoryTransport::with_queues(&["Q1"]));
    transport
        .send_message(SendMessageRequest {
            queue_id: "Q1".into(),
            body: "a".into(),
            group_id: None,
            deduplication_id: None,
        })
        .await
        .unwrap();
    let received = transport
        .receive_messages(ReceiveRequest::new("Q1").with_wait_time(Duration::ZERO))
        .await
        .unwrap();

    let acknowledger = Acknowledger::new(transport.clone());
    let receipt = &received[0].receipt_handle;
    assert!(acknowledger.acknowledge("Q1", receipt).await);
    assert!(acknowledger.acknowledge("Q1", receipt).await);
}

#[tokio::test]
async fn test_shutdown_interrupts_long_poll_and_stops_receiving() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    let handler = Arc::new(ScriptedHandler::new());
    let mut config = fast_consumer_config();
    config.wait_time = Duration::from_secs(20);

    let handle = QueuePoller::new(registry_with("Q1", handler), transport.clone(), config).spawn();
    assert!(wait_until(Duration::from_secs(1), || transport.receive_count() == 1).await);

    tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
        .await
        .expect("long poll abandoned on shutdown")
        .expect("poller task joined");

    let receives_at_shutdown = transport.receive_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.receive_count(), receives_at_shutdown);
}

#[tokio::test]
async fn test_no_receive_after_shutdown_signal() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    let handler = Arc::new(ScriptedHandler::new());
    let poller = QueuePoller::new(
        registry_with("Q1", handler),
        transport.clone(),
        fast_consumer_config(),
    );

    let (trigger, signal) = shutdown_channel();
    trigger.trigger();
    poller.run(signal).await;

    assert_eq!(transport.receive_count(), 0);
}

#[tokio::test]
async fn test_no_bindings_ticks_without_receiving() {
    let transport = Arc::new(RecordingTransport::with_queues(&["Q1"]));
    let handle = QueuePoller::new(
        Arc::new(HandlerRegistry::empty()),
        transport.clone(),
        fast_consumer_config(),
    )
    .spawn();

    tokio::time::sleep(Duration::from_millis(60)).await;
    let stats = handle.shutdown().await.expect("clean shutdown");

    assert!(stats.polling_cycles >= 2, "loop kept ticking: {stats:?}");
    assert_eq!(stats.receive_calls, 0);
    assert_eq!(transport.receive_count(), 0);
}

#[tokio::test]
async fn test_receive_failure_is_isolated_to_its_queue() {
    let transport = Arc::new(RecordingTransport::with_queues(&["broken", "healthy"]));
    transport.fail_receives_for("broken");
    transport.seed("healthy", &["a"]).await;

    let handler = Arc::new(ScriptedHandler::new());
    let registry = HandlerRegistry::builder()
        .register_arc(QueueBinding::new("broken"), handler.clone())
        .register_arc(QueueBinding::new("healthy"), handler.clone())
        .build()
        .unwrap();
    let poller = QueuePoller::new(Arc::new(registry), transport.clone(), fast_consumer_config());

    let reports = poller.poll_all_once(&ShutdownSignal::never()).await;

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].queue_id, "healthy");
    assert_eq!(transport.receive_count_for("broken"), 1);
    assert_eq!(poller.stats().snapshot().receive_errors, 1);
    assert_eq!(handler.calls(), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_declined_message_is_redelivered_until_accepted() {
    let transport = Arc::new(InMemoryTransport::new());
    transport.create_queue_with_visibility_timeout("Q1", Duration::from_millis(30));
    transport
        .send_message(SendMessageRequest {
            queue_id: "Q1".into(),
            body: "retry-me".into(),
            group_id: None,
            deduplication_id: None,
        })
        .await
        .unwrap();

    let registry = HandlerRegistry::builder()
        .register_fn(QueueBinding::new("Q1"), |_scope, message: Message| async move {
            // Accept on the third delivery
            Ok(message.receive_count().unwrap_or(0) >= 3)
        })
        .build()
        .unwrap();
    let handle = QueuePoller::new(Arc::new(registry), transport.clone(), fast_consumer_config())
        .spawn();

    assert!(wait_until(Duration::from_secs(3), || transport.queue_length("Q1") == 0).await);
    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.messages_acknowledged, 1);
    assert_eq!(stats.messages_left_for_redelivery, 2);
}

#[tokio::test]
async fn test_per_queue_mode_processes_every_queue() {
    let transport = Arc::new(RecordingTransport::with_queues(&["a", "b", "c"]));
    for queue in ["a", "b", "c"] {
        transport.seed(queue, &["x", "y"]).await;
    }
    let handler = Arc::new(ScriptedHandler::new());
    let registry = ["a", "b", "c"]
        .into_iter()
        .fold(HandlerRegistry::builder(), |builder, queue| {
            builder.register_arc(QueueBinding::new(queue), handler.clone())
        })
        .build()
        .unwrap();

    let mut config = fast_consumer_config();
    config.polling_mode = PollingMode::PerQueue;
    let handle = QueuePoller::new(Arc::new(registry), transport.clone(), config).spawn();

    assert!(wait_until(Duration::from_secs(2), || handler.call_count() == 6).await);
    let stats = handle.shutdown().await.unwrap();
    assert_eq!(stats.messages_acknowledged, 6);
    for queue in ["a", "b", "c"] {
        assert_eq!(transport.inner.queue_length(queue), 0);
    }
}

#[tokio::test]
async fn test_fifo_group_is_processed_in_order() {
    let transport = Arc::new(InMemoryTransport::with_queues(&["ledger.fifo"]));
    let producer = queue_dispatch::messaging::QueueProducer::new(transport.clone());
    let bodies: Vec<String> = (0..25).map(|i| format!("entry-{i}")).collect();
    assert_eq!(
        producer
            .send_message_batch("ledger.fifo", &bodies, Some("account-1"))
            .await,
        Ok(true)
    );

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let recorder = seen.clone();
    let registry = HandlerRegistry::builder()
        .register_fn(
            QueueBinding::new("ledger.fifo").with_max_messages(4),
            move |_scope, message: Message| {
                let recorder = recorder.clone();
                async move {
                    recorder.lock().push(message.body.clone());
                    Ok(true)
                }
            },
        )
        .build()
        .unwrap();
    let handle = QueuePoller::new(Arc::new(registry), transport.clone(), fast_consumer_config())
        .spawn();

    assert!(wait_until(Duration::from_secs(3), || seen.lock().len() == 25).await);
    handle.shutdown().await.unwrap();
    assert_eq!(*seen.lock(), bodies);
}
