use actor_runtime::mock::MockMailbox;
use async_trait::async_trait;
use order_pipeline::clients::{QueueClient, RouterClient};
use order_pipeline::config::{ConsumerConfig, FailureMode, QueueConfig};
use order_pipeline::model::{Order, OrderId, OrderItem, ORDER_PROCESSED};
use order_pipeline::processor::{HandlerError, OrderHandler, OrderProcessor};
use order_pipeline::queue_actor::{self, QueueContext};
use order_pipeline::router_actor::RouterRequest;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Validates like the default handler and counts how often business effects were applied.
#[derive(Clone, Default)]
struct CountingHandler {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl OrderHandler for CountingHandler {
    async fn handle(&self, order: &Order) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        order.validate()?;
        Ok(())
    }
}

fn order(id: &str) -> Order {
    let item = OrderItem {
        product_id: "PROD-1".into(),
        quantity: 1,
        price: 29.99,
    };
    Order::new(id, "CUST-123", vec![item], 29.99)
}

fn spawn_queue() -> QueueClient {
    let (actor, queue) = queue_actor::new(QueueConfig::new("OrderProcessingQueue"));
    tokio::spawn(actor.run(QueueContext::default()));
    queue
}

fn expect_event(mock: &MockMailbox<RouterRequest>, label: &'static str) {
    mock.expect(label, |request| match request {
        RouterRequest::PutEvents { events, respond_to } => {
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].detail_type, ORDER_PROCESSED);
            let _ = respond_to.send(1);
        }
        other => panic!("Expected PutEvents, got {other:?}"),
    });
}

/// Real queue actor with a mocked router.
///
/// The first attempt applies the effects and then fails to emit. The retry must only emit:
/// the handler is not run a second time.
#[tokio::test]
async fn test_emit_failure_is_retried_without_reapplying_effects() {
    let router_mock = MockMailbox::<RouterRequest>::new();
    router_mock.expect("router unavailable", |request| match request {
        // Dropping the reply channel looks like a crashed router
        RouterRequest::PutEvents { respond_to, .. } => drop(respond_to),
        other => panic!("Expected PutEvents, got {other:?}"),
    });
    expect_event(&router_mock, "router back");

    let queue = spawn_queue();
    let handler = CountingHandler::default();
    let config = ConsumerConfig {
        failure_mode: FailureMode::ReleaseImmediately,
        ..ConsumerConfig::default()
    };
    let processor = OrderProcessor::new(
        queue.clone(),
        RouterClient::new(router_mock.mailbox()),
        handler.clone(),
        config,
    );

    let id = queue.send(order("ORD-001").to_body()).await.unwrap();

    let batch = queue.receive_batch(10, Duration::ZERO).await.unwrap();
    let response = processor.process_batch(batch).await;
    assert!(response.failed(&id));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

    let marker = processor
        .idempotency()
        .get(&OrderId::from("ORD-001"))
        .await
        .unwrap();
    assert!(marker.effects_applied);
    assert!(marker.emitted_event.is_none());

    // Released immediately, so it is receivable again without waiting for the lease
    let batch = queue.receive_batch(10, Duration::ZERO).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].receive_count, 2);
    let response = processor.process_batch(batch).await;
    assert!(response.is_success());
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(queue.attributes().await.unwrap().total(), 0);

    router_mock.verify();
}

#[tokio::test]
async fn test_duplicate_order_emits_once() {
    let router_mock = MockMailbox::<RouterRequest>::new();
    expect_event(&router_mock, "first copy");

    let queue = spawn_queue();
    let handler = CountingHandler::default();
    let processor = OrderProcessor::new(
        queue.clone(),
        RouterClient::new(router_mock.mailbox()),
        handler.clone(),
        ConsumerConfig::default(),
    );

    let body = order("ORD-002").to_body();
    queue
        .send_batch(vec![body.clone(), body])
        .await
        .unwrap();

    let batch = queue.receive_batch(10, Duration::ZERO).await.unwrap();
    assert_eq!(batch.len(), 2);
    let response = processor.process_batch(batch).await;
    assert!(response.is_success());

    let stats = processor.stats().snapshot();
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(queue.attributes().await.unwrap().total(), 0);

    router_mock.verify();
}

/// Only the two reported items come back once their leases expire.
#[tokio::test(start_paused = true)]
async fn test_partial_failures_only_report_failed_items() {
    let router_mock = MockMailbox::<RouterRequest>::new();
    for _ in 0..8 {
        expect_event(&router_mock, "valid order");
    }

    let queue = spawn_queue();
    let processor = OrderProcessor::new(
        queue.clone(),
        RouterClient::new(router_mock.mailbox()),
        CountingHandler::default(),
        ConsumerConfig::default(),
    );

    let bodies = (0..10)
        .map(|n| match n {
            3 => "{\"orderId\": \"ORD-003\"".to_string(),
            7 => Order::new("ORD-007", "CUST-1", vec![], 10.0).to_body(),
            n => order(&format!("ORD-{n:03}")).to_body(),
        })
        .collect();
    let ids = queue.send_batch(bodies).await.unwrap();

    let batch = queue.receive_batch(10, Duration::ZERO).await.unwrap();
    assert_eq!(batch.len(), 10);
    let response = processor.process_batch(batch).await;

    assert_eq!(response.batch_item_failures, vec![ids[3], ids[7]]);
    let attributes = queue.attributes().await.unwrap();
    assert_eq!(attributes.in_flight, 2);
    assert_eq!(attributes.visible, 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    let mut redelivered = queue.receive_batch(10, Duration::ZERO).await.unwrap();
    redelivered.sort_by_key(|m| ids.iter().position(|id| *id == m.id));
    let redelivered_ids: Vec<_> = redelivered.iter().map(|m| m.id).collect();
    assert_eq!(redelivered_ids, vec![ids[3], ids[7]]);
    assert!(redelivered.iter().all(|m| m.receive_count == 2));
    assert_eq!(queue.attributes().await.unwrap().total(), 2);

    router_mock.verify();
}

#[tokio::test]
async fn test_without_item_reporting_one_failure_fails_the_batch() {
    let router_mock = MockMailbox::<RouterRequest>::new();
    expect_event(&router_mock, "valid order");

    let queue = spawn_queue();
    let config = ConsumerConfig {
        report_batch_item_failures: false,
        ..ConsumerConfig::default()
    };
    let processor = OrderProcessor::new(
        queue.clone(),
        RouterClient::new(router_mock.mailbox()),
        CountingHandler::default(),
        config,
    );

    queue
        .send_batch(vec![
            order("ORD-010").to_body(),
            Order::new("ORD-011", "CUST-1", vec![], 10.0).to_body(),
        ])
        .await
        .unwrap();

    let batch = queue.receive_batch(10, Duration::ZERO).await.unwrap();
    let response = processor.process_batch(batch).await;
    assert_eq!(response.batch_item_failures.len(), 2);
    // Nothing was acknowledged
    assert_eq!(queue.attributes().await.unwrap().in_flight, 2);

    router_mock.verify();
}

#[tokio::test]
async fn test_run_until_shutdown() {
    let router_mock = MockMailbox::<RouterRequest>::new();
    for _ in 0..3 {
        expect_event(&router_mock, "order");
    }

    let queue = spawn_queue();
    let config = ConsumerConfig {
        max_batching_window: Duration::from_millis(50),
        ..ConsumerConfig::default()
    };
    let processor = OrderProcessor::new(
        queue.clone(),
        RouterClient::new(router_mock.mailbox()),
        CountingHandler::default(),
        config,
    );
    let stats = processor.stats();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(processor.run(shutdown_rx));

    for n in 0..3 {
        queue.send(order(&format!("ORD-{n:03}")).to_body()).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while stats.snapshot().succeeded < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Orders were not processed in time");

    shutdown.send(true).unwrap();
    let final_stats = handle.await.unwrap();
    assert_eq!(final_stats.succeeded, 3);
    assert_eq!(final_stats.failed, 0);
    assert_eq!(queue.attributes().await.unwrap().total(), 0);

    router_mock.verify();
}
