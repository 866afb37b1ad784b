//! [`ActorBehavior`] implementation for [`TopicState`].
//!
//! Deliveries run in their own tasks, tracked by a `JoinSet`, so a slow or broken endpoint
//! never holds up the topic or the other subscribers. Each subscription counts its own
//! outcomes.

use super::{Endpoint, PublishReceipt, TopicError, TopicRequest};
use crate::model::{FilterPolicy, Notification, Subscription, SubscriptionId, SubscriptionStatus};
use actor_runtime::ActorBehavior;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct DeliveryCounters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug)]
struct SubscriptionEntry {
    id: SubscriptionId,
    endpoint: Arc<dyn Endpoint>,
    confirmed: bool,
    filter_policy: Option<FilterPolicy>,
    counters: Arc<DeliveryCounters>,
}

/// The state owned by one topic actor.
pub struct TopicState {
    name: String,
    subscriptions: Vec<SubscriptionEntry>,
    pending_tokens: HashMap<String, SubscriptionId>,
    deliveries: JoinSet<()>,
}

impl TopicState {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriptions: Vec::new(),
            pending_tokens: HashMap::new(),
            deliveries: JoinSet::new(),
        }
    }

    fn reap_finished(&mut self) {
        while self.deliveries.try_join_next().is_some() {}
    }

    async fn drain(&mut self) {
        while self.deliveries.join_next().await.is_some() {}
    }

    fn subscribe(
        &mut self,
        endpoint: Arc<dyn Endpoint>,
        filter_policy: Option<FilterPolicy>,
    ) -> (SubscriptionId, SubscriptionStatus) {
        let protocol = endpoint.protocol();
        let address = endpoint.address();

        // Subscribing the same endpoint twice yields the existing subscription
        if let Some(existing) = self
            .subscriptions
            .iter_mut()
            .find(|s| s.endpoint.protocol() == protocol && s.endpoint.address() == address)
        {
            existing.filter_policy = filter_policy;
            let status = if existing.confirmed {
                SubscriptionStatus::Confirmed
            } else {
                SubscriptionStatus::PendingConfirmation
            };
            return (existing.id, status);
        }

        let id = SubscriptionId::new();
        let confirmed = !protocol.requires_confirmation();
        if !confirmed {
            let token = Uuid::new_v4().simple().to_string();
            self.pending_tokens.insert(token.clone(), id);
            let handshake = Notification::confirmation(&self.name, token);
            let endpoint = Arc::clone(&endpoint);
            let topic = self.name.clone();
            self.deliveries.spawn(async move {
                if let Err(e) = endpoint.deliver(&handshake).await {
                    warn!(topic = %topic, subscription = %id, error = %e, "Confirmation request failed");
                }
            });
        }

        info!(topic = %self.name, subscription = %id, %protocol, endpoint = %address, confirmed, "Subscribed");
        self.subscriptions.push(SubscriptionEntry {
            id,
            endpoint,
            confirmed,
            filter_policy,
            counters: Arc::default(),
        });
        let status = if confirmed {
            SubscriptionStatus::Confirmed
        } else {
            SubscriptionStatus::PendingConfirmation
        };
        (id, status)
    }

    fn confirm(&mut self, token: &str) -> Result<SubscriptionId, TopicError> {
        let id = self
            .pending_tokens
            .remove(token)
            .ok_or(TopicError::InvalidToken)?;
        let entry = self
            .subscriptions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(TopicError::SubscriptionNotFound(id))?;
        entry.confirmed = true;
        info!(topic = %self.name, subscription = %id, "Subscription confirmed");
        Ok(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> Result<(), TopicError> {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        if self.subscriptions.len() == before {
            return Err(TopicError::SubscriptionNotFound(id));
        }
        self.pending_tokens.retain(|_, pending| *pending != id);
        info!(topic = %self.name, subscription = %id, "Unsubscribed");
        Ok(())
    }

    fn list(&self) -> Vec<Subscription> {
        self.subscriptions
            .iter()
            .map(|s| Subscription {
                id: s.id,
                topic: self.name.clone(),
                protocol: s.endpoint.protocol(),
                endpoint: s.endpoint.address(),
                confirmed: s.confirmed,
                filter_policy: s.filter_policy.clone(),
                delivered: s.counters.delivered.load(Ordering::Relaxed),
                failed: s.counters.failed.load(Ordering::Relaxed),
            })
            .collect()
    }

    fn publish(&mut self, mut notification: Notification) -> PublishReceipt {
        notification.topic = self.name.clone();
        let mut receipt = PublishReceipt {
            message_id: notification.message_id,
            dispatched: 0,
            withheld: 0,
            filtered: 0,
        };

        for entry in &self.subscriptions {
            if !entry.confirmed {
                receipt.withheld += 1;
                continue;
            }
            if let Some(policy) = &entry.filter_policy {
                if !notification.matches(policy) {
                    receipt.filtered += 1;
                    continue;
                }
            }
            receipt.dispatched += 1;

            let endpoint = Arc::clone(&entry.endpoint);
            let counters = Arc::clone(&entry.counters);
            let notification = notification.clone();
            let subscription = entry.id;
            self.deliveries.spawn(async move {
                match endpoint.deliver(&notification).await {
                    Ok(()) => {
                        counters.delivered.fetch_add(1, Ordering::Relaxed);
                        debug!(%subscription, message_id = %notification.message_id, "Delivered");
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        warn!(%subscription, message_id = %notification.message_id, error = %e, "Delivery failed");
                    }
                }
            });
        }

        info!(
            topic = %self.name,
            message_id = %receipt.message_id,
            subject = %notification.subject,
            dispatched = receipt.dispatched,
            withheld = receipt.withheld,
            filtered = receipt.filtered,
            "Published"
        );
        receipt
    }
}

#[async_trait]
impl ActorBehavior for TopicState {
    type Request = TopicRequest;
    type Context = ();

    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&mut self, request: TopicRequest, _ctx: &()) {
        self.reap_finished();
        match request {
            TopicRequest::Subscribe {
                endpoint,
                filter_policy,
                respond_to,
            } => {
                let _ = respond_to.send(self.subscribe(endpoint, filter_policy));
            }
            TopicRequest::ConfirmSubscription { token, respond_to } => {
                let _ = respond_to.send(self.confirm(&token));
            }
            TopicRequest::Unsubscribe { id, respond_to } => {
                let _ = respond_to.send(self.unsubscribe(id));
            }
            TopicRequest::ListSubscriptions { respond_to } => {
                let _ = respond_to.send(self.list());
            }
            TopicRequest::Publish {
                notification,
                respond_to,
            } => {
                let _ = respond_to.send(self.publish(notification));
            }
            TopicRequest::Flush { respond_to } => {
                self.drain().await;
                let _ = respond_to.send(());
            }
        }
    }

    async fn on_stop(&mut self, _ctx: &()) {
        self.drain().await;
        info!(topic = %self.name, subscriptions = self.subscriptions.len(), "Topic stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::TopicClient;
    use crate::model::{NotificationKind, Protocol};
    use crate::topic_actor::{self, ChannelEndpoint, EndpointError};
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    /// Email-like endpoint that records what it receives.
    #[derive(Debug)]
    struct Inbox(mpsc::UnboundedSender<Notification>);

    #[async_trait]
    impl Endpoint for Inbox {
        fn protocol(&self) -> Protocol {
            Protocol::Email
        }
        fn address(&self) -> String {
            "ops@example.com".into()
        }
        async fn deliver(&self, n: &Notification) -> Result<(), EndpointError> {
            let _ = self.0.send(n.clone());
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Broken;

    #[async_trait]
    impl Endpoint for Broken {
        fn protocol(&self) -> Protocol {
            Protocol::Http
        }
        fn address(&self) -> String {
            "http://broken.invalid".into()
        }
        async fn deliver(&self, _n: &Notification) -> Result<(), EndpointError> {
            Err(EndpointError::new("http://broken.invalid", "connection refused"))
        }
    }

    fn spawn() -> TopicClient {
        let (actor, client) = topic_actor::new("TestTopic");
        tokio::spawn(actor.run(()));
        client
    }

    fn note(status: &str) -> Notification {
        Notification::new(
            "",
            "subject",
            "{}",
            BTreeMap::from([("status".to_string(), status.to_string())]),
        )
    }

    #[tokio::test]
    async fn test_confirmation_handshake_gates_delivery() {
        let topic = spawn();
        let (tx, mut inbox) = mpsc::unbounded_channel();
        let (id, status) = topic.subscribe(Arc::new(Inbox(tx)), None).await.unwrap();
        assert_eq!(status, SubscriptionStatus::PendingConfirmation);

        let handshake = inbox.recv().await.unwrap();
        let NotificationKind::SubscriptionConfirmation { token } = handshake.kind else {
            panic!("expected a confirmation request");
        };

        let receipt = topic.publish(note("processed")).await.unwrap();
        assert_eq!(receipt.withheld, 1);
        assert_eq!(receipt.dispatched, 0);

        assert_eq!(topic.confirm_subscription(&token).await.unwrap(), id);
        assert_eq!(
            topic.confirm_subscription(&token).await,
            Err(TopicError::InvalidToken)
        );

        topic.publish(note("processed")).await.unwrap();
        let delivered = inbox.recv().await.unwrap();
        assert_eq!(delivered.kind, NotificationKind::Notification);
        assert_eq!(delivered.topic, "TestTopic");
    }

    #[tokio::test]
    async fn test_broken_endpoint_does_not_block_others() {
        let topic = spawn();
        let (tx, mut inbox) = mpsc::unbounded_channel();
        let (_, _) = topic.subscribe(Arc::new(Broken), None).await.unwrap();
        let (first, mut first_rx) = ChannelEndpoint::new("first", 4);
        let (second, mut second_rx) = ChannelEndpoint::new("second", 4);
        topic.subscribe(Arc::new(first), None).await.unwrap();
        topic.subscribe(Arc::new(second), None).await.unwrap();
        let (inbox_id, _) = topic.subscribe(Arc::new(Inbox(tx)), None).await.unwrap();

        // Confirm both human endpoints; the broken one never saw its handshake
        let NotificationKind::SubscriptionConfirmation { token } = inbox.recv().await.unwrap().kind
        else {
            panic!("expected a confirmation request");
        };
        topic.confirm_subscription(&token).await.unwrap();
        let broken = topic
            .list_subscriptions()
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.protocol == Protocol::Http)
            .unwrap();
        assert!(!broken.confirmed);

        let receipt = topic.publish(note("processed")).await.unwrap();
        assert_eq!(receipt.dispatched, 3);
        assert!(first_rx.recv().await.is_some());
        assert!(second_rx.recv().await.is_some());
        assert!(inbox.recv().await.is_some());

        topic.flush().await.unwrap();
        let subs = topic.list_subscriptions().await.unwrap();
        let inbox_sub = subs.iter().find(|s| s.id == inbox_id).unwrap();
        assert_eq!(inbox_sub.delivered, 1);
        assert_eq!(inbox_sub.failed, 0);
    }

    #[tokio::test]
    async fn test_failures_are_counted_per_subscription() {
        #[derive(Debug)]
        struct BrokenChannel;

        #[async_trait]
        impl Endpoint for BrokenChannel {
            fn protocol(&self) -> Protocol {
                Protocol::Channel
            }
            fn address(&self) -> String {
                "broken".into()
            }
            async fn deliver(&self, _n: &Notification) -> Result<(), EndpointError> {
                Err(EndpointError::new("broken", "closed"))
            }
        }

        let topic = spawn();
        let (broken_id, _) = topic.subscribe(Arc::new(BrokenChannel), None).await.unwrap();
        let (healthy, mut rx) = ChannelEndpoint::new("healthy", 4);
        let (healthy_id, _) = topic.subscribe(Arc::new(healthy), None).await.unwrap();

        topic.publish(note("processed")).await.unwrap();
        topic.publish(note("processed")).await.unwrap();
        topic.flush().await.unwrap();
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());

        let subs = topic.list_subscriptions().await.unwrap();
        let broken = subs.iter().find(|s| s.id == broken_id).unwrap();
        let healthy = subs.iter().find(|s| s.id == healthy_id).unwrap();
        assert_eq!((broken.delivered, broken.failed), (0, 2));
        assert_eq!((healthy.delivered, healthy.failed), (2, 0));
    }

    #[tokio::test]
    async fn test_filter_policy_skips_without_failing() {
        let topic = spawn();
        let (shipped_only, mut rx) = ChannelEndpoint::new("shipping", 4);
        let policy = FilterPolicy::from([("status".to_string(), vec!["shipped".to_string()])]);
        let (id, _) = topic
            .subscribe(Arc::new(shipped_only), Some(policy))
            .await
            .unwrap();

        let receipt = topic.publish(note("processed")).await.unwrap();
        assert_eq!(receipt.filtered, 1);
        topic.publish(note("shipped")).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().attributes["status"], "shipped");

        topic.flush().await.unwrap();
        let sub = &topic.list_subscriptions().await.unwrap()[0];
        assert_eq!(sub.id, id);
        assert_eq!((sub.delivered, sub.failed), (1, 0));
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent_and_unsubscribe_removes() {
        let topic = spawn();
        let (endpoint, _rx) = ChannelEndpoint::new("audit", 4);
        let endpoint = Arc::new(endpoint);
        let (a, _) = topic.subscribe(endpoint.clone(), None).await.unwrap();
        let (b, _) = topic.subscribe(endpoint, None).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(topic.list_subscriptions().await.unwrap().len(), 1);

        topic.unsubscribe(a).await.unwrap();
        assert!(topic.list_subscriptions().await.unwrap().is_empty());
        assert_eq!(
            topic.unsubscribe(a).await,
            Err(TopicError::SubscriptionNotFound(a))
        );
    }
}
