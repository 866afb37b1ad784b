use order_pipeline::clients::{QueueClient, RouterClient, TopicClient};
use order_pipeline::config::{QueueConfig, RouterConfig};
use order_pipeline::lifecycle::order_processed_pattern;
use order_pipeline::model::{DomainEvent, ORDER_PROCESSED, ORDER_SERVICE_SOURCE};
use order_pipeline::queue_actor::{self, QueueContext};
use order_pipeline::router_actor::{self, EventPattern, RouterError, RuleId, RuleTarget};
use order_pipeline::topic_actor::{self, ChannelEndpoint};
use serde_json::json;
use std::sync::Arc;

fn spawn_router() -> RouterClient {
    let (actor, router) = router_actor::new(RouterConfig::default());
    tokio::spawn(actor.run(()));
    router
}

fn spawn_queue(name: &str) -> QueueClient {
    let (actor, queue) = queue_actor::new(QueueConfig::new(name));
    tokio::spawn(actor.run(QueueContext::default()));
    queue
}

fn spawn_topic() -> TopicClient {
    let (actor, topic) = topic_actor::new("OrderEvents");
    tokio::spawn(actor.run(()));
    topic
}

/// A queue whose actor is gone: every send fails.
fn dead_queue(name: &str) -> QueueClient {
    let (actor, queue) = queue_actor::new(QueueConfig::new(name));
    drop(actor);
    queue
}

fn processed(order_id: &str) -> DomainEvent {
    DomainEvent::new(
        ORDER_SERVICE_SOURCE,
        ORDER_PROCESSED,
        json!({ "orderId": order_id, "status": "processed", "total": 10.0 }),
    )
}

async fn order_rule(router: &RouterClient, targets: Vec<RuleTarget>) -> RuleId {
    let rule_id = router
        .put_rule("OrderProcessedRule", order_processed_pattern())
        .await
        .unwrap();
    router.put_targets(rule_id, targets).await.unwrap();
    rule_id
}

#[tokio::test]
async fn test_event_reaches_every_target_of_a_matching_rule() {
    let router = spawn_router();
    let topic = spawn_topic();
    let audit = spawn_queue("OrderAuditQueue");
    let (endpoint, mut inbox) = ChannelEndpoint::new("watcher", 4);
    topic.subscribe(Arc::new(endpoint), None).await.unwrap();

    order_rule(
        &router,
        vec![
            RuleTarget::topic("notify", topic.clone()),
            RuleTarget::queue("audit", audit.clone()),
        ],
    )
    .await;

    assert_eq!(router.put_event(processed("ORD-1")).await.unwrap(), 1);
    router.flush().await.unwrap();
    topic.flush().await.unwrap();

    let notification = inbox.recv().await.unwrap();
    assert_eq!(notification.subject, "Order ORD-1 - PROCESSED");

    let entries = audit.peek(10).await.unwrap();
    assert_eq!(entries.len(), 1);
    let stored: DomainEvent = serde_json::from_str(&entries[0].body).unwrap();
    assert_eq!(stored.detail_str("orderId"), Some("ORD-1"));
}

#[tokio::test]
async fn test_non_matching_event_reaches_no_target() {
    let router = spawn_router();
    let audit = spawn_queue("OrderAuditQueue");
    order_rule(&router, vec![RuleTarget::queue("audit", audit.clone())]).await;

    let foreign = DomainEvent::new("inventory.service", ORDER_PROCESSED, json!({}));
    let other_type = DomainEvent::new(ORDER_SERVICE_SOURCE, "ORDER_CANCELLED", json!({}));
    assert_eq!(router.put_events(vec![foreign, other_type]).await.unwrap(), 0);
    router.flush().await.unwrap();

    assert_eq!(audit.depth().await.unwrap(), 0);
}

/// One broken target exhausts its retries; its sibling still gets the event once.
#[tokio::test(start_paused = true)]
async fn test_failing_target_does_not_affect_siblings() {
    let router = spawn_router();
    let audit = spawn_queue("OrderAuditQueue");
    order_rule(
        &router,
        vec![
            RuleTarget::queue("broken", dead_queue("Gone")),
            RuleTarget::queue("audit", audit.clone()),
        ],
    )
    .await;

    router.put_event(processed("ORD-2")).await.unwrap();
    router.flush().await.unwrap();

    assert_eq!(audit.depth().await.unwrap(), 1);
    let stats = router.target_stats().await.unwrap();
    let broken = stats.iter().find(|s| s.target == "broken").unwrap();
    assert_eq!((broken.delivered, broken.retried, broken.exhausted), (0, 2, 1));
    let healthy = stats.iter().find(|s| s.target == "audit").unwrap();
    assert_eq!((healthy.delivered, healthy.retried, healthy.exhausted), (1, 0, 0));
    assert_eq!(healthy.destination, "OrderAuditQueue");
}

#[tokio::test]
async fn test_rule_management() {
    let router = spawn_router();
    let audit = spawn_queue("OrderAuditQueue");

    let first = order_rule(&router, vec![RuleTarget::queue("audit", audit.clone())]).await;
    let again = router
        .put_rule("OrderProcessedRule", order_processed_pattern())
        .await
        .unwrap();
    assert_eq!(first, again);

    // Same name, new pattern: updated in place
    let widened = EventPattern::new().source(ORDER_SERVICE_SOURCE);
    assert_eq!(
        router.put_rule("OrderProcessedRule", widened.clone()).await.unwrap(),
        first
    );
    let rules = router.list_rules().await.unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].pattern, widened);
    assert_eq!(rules[0].target_ids, vec!["audit".to_string()]);

    let removed = router
        .remove_targets(first, vec!["audit".into(), "missing".into()])
        .await
        .unwrap();
    assert_eq!(removed, 1);

    router.delete_rule(first).await.unwrap();
    assert!(matches!(
        router.delete_rule(first).await,
        Err(RouterError::RuleNotFound(id)) if id == first
    ));
    assert!(matches!(
        router.put_rule("  ", order_processed_pattern()).await,
        Err(RouterError::EmptyRuleName)
    ));
}
