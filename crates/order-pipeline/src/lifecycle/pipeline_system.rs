use super::{poll_until_ready, PipelineError, ReadinessPolicy};
use crate::audit::AuditLog;
use crate::clients::{MonitorClient, QueueClient, RouterClient, TopicClient};
use crate::config::PipelineConfig;
use crate::model::{
    DeadLetteredMessage, MessageId, Order, Subscription, SubscriptionStatus, ORDER_PROCESSED,
    ORDER_SERVICE_SOURCE,
};
use crate::monitor_actor::{self, AlarmState, MonitorContext};
use crate::processor::{
    IdempotencyStore, OrderHandler, OrderProcessor, ProcessorStats, StatsSnapshot,
    ValidatingHandler,
};
use crate::queue_actor::{self, QueueAttributes, QueueContext};
use crate::router_actor::{self, EventPattern, RuleId, RuleTarget, TargetStats};
use crate::topic_actor::{self, LoggingEndpoint};
use actor_runtime::{Actor, ActorBehavior};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

pub const ORDER_RULE_NAME: &str = "OrderProcessedRule";
pub const TOPIC_TARGET_ID: &str = "OrderNotificationTarget";
pub const AUDIT_TARGET_ID: &str = "OrderAuditTarget";

/// How often `settle` re-checks the ingestion queue.
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

type ActorHandles = Vec<(&'static str, JoinHandle<()>)>;

/// Matches the processor's `ORDER_PROCESSED` events.
pub fn order_processed_pattern() -> EventPattern {
    EventPattern::new()
        .source(ORDER_SERVICE_SOURCE)
        .detail_type(ORDER_PROCESSED)
}

/// Point-in-time view of the whole pipeline.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub processor: StatsSnapshot,
    pub ingestion: QueueAttributes,
    pub dead_letters: Vec<DeadLetteredMessage>,
    pub audit_entries: usize,
    pub alarm: AlarmState,
    pub subscriptions: Vec<Subscription>,
    pub targets: Vec<TargetStats>,
}

/// What `teardown` removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub rules_deleted: usize,
    pub subscriptions_removed: usize,
    pub messages_purged: usize,
}

/// The runtime orchestrator for the order pipeline.
///
/// `PipelineSystem` is responsible for:
/// - **Provisioning**: spawning every actor with its dependencies injected, in dependency order
/// - **Readiness**: polling each component until it answers before wiring the next one
/// - **Reconciliation**: creating the routing rule only if it is missing or differs
/// - **Rollback**: aborting already spawned components when a later step fails
/// - **Shutdown**: stopping the processor, then letting every actor drain
///
/// # Example
///
/// ```rust,no_run
/// use order_pipeline::config::PipelineConfig;
/// use order_pipeline::lifecycle::PipelineSystem;
/// use order_pipeline::model::{Order, OrderItem};
/// use std::time::Duration;
///
/// # async fn demo() -> Result<(), order_pipeline::lifecycle::PipelineError> {
/// let system = PipelineSystem::start(PipelineConfig::default()).await?;
/// let item = OrderItem { product_id: "PROD-1".into(), quantity: 2, price: 29.99 };
/// system.submit(&Order::new("ORD-001", "CUST-123", vec![item], 59.98)).await?;
/// system.settle(Duration::from_secs(10)).await?;
/// system.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct PipelineSystem {
    pub config: PipelineConfig,
    pub ingestion: QueueClient,
    pub dead_letter: QueueClient,
    pub audit_queue: QueueClient,
    pub topic: TopicClient,
    pub router: RouterClient,
    pub monitor: MonitorClient,
    pub rule_id: RuleId,
    stats: Arc<ProcessorStats>,
    shutdown: watch::Sender<bool>,
    processor: JoinHandle<StatsSnapshot>,
    actors: ActorHandles,
}

fn spawn_actor<B: ActorBehavior>(
    actors: &mut ActorHandles,
    name: &'static str,
    actor: Actor<B>,
    context: B::Context,
) {
    actors.push((name, tokio::spawn(actor.run(context))));
}

async fn queue_ready(name: &str, queue: &QueueClient) -> Result<(), PipelineError> {
    poll_until_ready(name, ReadinessPolicy::default(), || {
        let queue = queue.clone();
        async move { queue.attributes().await.is_ok() }
    })
    .await
}

/// Aborts spawned components, newest first.
fn rollback(actors: ActorHandles) {
    for (name, handle) in actors.into_iter().rev() {
        handle.abort();
        warn!(component = name, "Rolled back");
    }
}

impl PipelineSystem {
    /// Provisions the pipeline with the validating order handler.
    pub async fn start(config: PipelineConfig) -> Result<Self, PipelineError> {
        Self::start_with_handler(config, ValidatingHandler).await
    }

    /// Provisions every component and starts consuming.
    ///
    /// On failure, whatever was already spawned is aborted before the error is returned.
    pub async fn start_with_handler<H: OrderHandler>(
        config: PipelineConfig,
        handler: H,
    ) -> Result<Self, PipelineError> {
        config.validate().map_err(PipelineError::Config)?;
        info!(region = %config.region, "Provisioning order pipeline");

        let mut actors = ActorHandles::new();
        match Self::provision(config, handler, &mut actors).await {
            Ok(system) => Ok(system),
            Err(e) => {
                error!(error = %e, "Provisioning failed");
                rollback(actors);
                Err(e)
            }
        }
    }

    async fn provision<H: OrderHandler>(
        config: PipelineConfig,
        handler: H,
        actors: &mut ActorHandles,
    ) -> Result<Self, PipelineError> {
        // Leaves first: each component only starts once its dependencies answer
        let (dlq_actor, dead_letter) = queue_actor::new(config.dead_letter.clone());
        spawn_actor(actors, "dead-letter-queue", dlq_actor, QueueContext::default());
        queue_ready(&config.dead_letter.name, &dead_letter).await?;

        let (ingestion_actor, ingestion) = queue_actor::new(config.ingestion.clone());
        let ingestion_context = QueueContext {
            dead_letter: Some(dead_letter.clone()),
        };
        spawn_actor(actors, "ingestion-queue", ingestion_actor, ingestion_context);
        queue_ready(&config.ingestion.name, &ingestion).await?;

        let (audit_actor, audit_queue) = queue_actor::new(config.audit.clone());
        spawn_actor(actors, "audit-queue", audit_actor, QueueContext::default());
        queue_ready(&config.audit.name, &audit_queue).await?;

        let (topic_actor, topic) = topic_actor::new(&config.topic_name);
        spawn_actor(actors, "topic", topic_actor, ());
        poll_until_ready(&config.topic_name, ReadinessPolicy::default(), || {
            let topic = topic.clone();
            async move { topic.list_subscriptions().await.is_ok() }
        })
        .await?;
        if let Some(email) = &config.notification_email {
            let (id, status) = topic
                .subscribe(Arc::new(LoggingEndpoint::email(email.as_str())), None)
                .await?;
            if status == SubscriptionStatus::PendingConfirmation {
                info!(subscription = %id, %email, "Email subscription pending confirmation");
            }
        }

        let (router_actor, router) = router_actor::new(config.router.clone());
        spawn_actor(actors, "router", router_actor, ());
        poll_until_ready(&config.router.bus_name, ReadinessPolicy::default(), || {
            let router = router.clone();
            async move { router.list_rules().await.is_ok() }
        })
        .await?;
        let rule_id = Self::reconcile_rule(&router).await?;
        router
            .put_targets(
                rule_id,
                vec![
                    RuleTarget::topic(TOPIC_TARGET_ID, topic.clone()),
                    RuleTarget::queue(AUDIT_TARGET_ID, audit_queue.clone()),
                ],
            )
            .await?;

        let (monitor_actor, monitor) = monitor_actor::new(config.monitor.clone());
        let monitor_context = MonitorContext {
            dead_letter: dead_letter.clone(),
            alarm_topic: Some(topic.clone()),
        };
        spawn_actor(actors, "monitor", monitor_actor, monitor_context);
        poll_until_ready(&config.monitor.alarm_name, ReadinessPolicy::default(), || {
            let monitor = monitor.clone();
            async move { monitor.status().await.is_ok() }
        })
        .await?;

        let processor = OrderProcessor::new(
            ingestion.clone(),
            router.clone(),
            handler,
            config.consumer.clone(),
        )
        .with_idempotency(IdempotencyStore::with_ttl(config.ingestion.retention_period));
        let stats = processor.stats();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let processor = tokio::spawn(processor.run(shutdown_rx));

        info!(rule_id = %rule_id, "Order pipeline running");
        Ok(Self {
            config,
            ingestion,
            dead_letter,
            audit_queue,
            topic,
            router,
            monitor,
            rule_id,
            stats,
            shutdown,
            processor,
            actors: std::mem::take(actors),
        })
    }

    /// Creates the order rule unless one with the same name and pattern already exists.
    async fn reconcile_rule(router: &RouterClient) -> Result<RuleId, PipelineError> {
        let pattern = order_processed_pattern();
        let existing = router
            .list_rules()
            .await?
            .into_iter()
            .find(|r| r.name == ORDER_RULE_NAME);
        match existing {
            Some(rule) if rule.pattern == pattern => {
                info!(rule_id = %rule.id, "Routing rule already in place");
                Ok(rule.id)
            }
            _ => Ok(router.put_rule(ORDER_RULE_NAME, pattern).await?),
        }
    }

    /// Enqueues an order on the ingestion queue.
    pub async fn submit(&self, order: &Order) -> Result<MessageId, PipelineError> {
        Ok(self.ingestion.send(order.to_body()).await?)
    }

    /// Waits until the ingestion queue is empty and every routed delivery has finished.
    ///
    /// Poison messages count as settled once they reach the dead-letter queue.
    pub async fn settle(&self, timeout: Duration) -> Result<(), PipelineError> {
        let deadline = Instant::now() + timeout;
        loop {
            let attributes = self.ingestion.attributes().await?;
            if attributes.total() == 0 {
                break;
            }
            if Instant::now() >= deadline {
                return Err(PipelineError::SettleTimeout(timeout));
            }
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        }
        self.router.flush().await?;
        self.topic.flush().await?;
        // Refresh the alarm instead of waiting for the next scheduled sample
        self.monitor.sample_now().await?;
        Ok(())
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn audit_log(&self) -> AuditLog {
        AuditLog::new(self.audit_queue.clone())
    }

    pub async fn report(&self) -> Result<PipelineReport, PipelineError> {
        let dead_letters = self
            .dead_letter
            .peek(usize::MAX)
            .await?
            .iter()
            .filter_map(|m| m.as_dead_lettered())
            .collect();
        Ok(PipelineReport {
            processor: self.stats(),
            ingestion: self.ingestion.attributes().await?,
            dead_letters,
            audit_entries: self.audit_log().len().await?,
            alarm: self.monitor.state(),
            subscriptions: self.topic.list_subscriptions().await?,
            targets: self.router.target_stats().await?,
        })
    }

    /// Removes what provisioning created: the routing rule, all subscriptions and every
    /// queued message. The components keep running until [`PipelineSystem::shutdown`].
    pub async fn teardown(&self) -> Result<TeardownReport, PipelineError> {
        let mut report = TeardownReport::default();
        for rule in self.router.list_rules().await? {
            self.router.delete_rule(rule.id).await?;
            report.rules_deleted += 1;
        }
        for subscription in self.topic.list_subscriptions().await? {
            self.topic.unsubscribe(subscription.id).await?;
            report.subscriptions_removed += 1;
        }
        for queue in [&self.ingestion, &self.dead_letter, &self.audit_queue] {
            report.messages_purged += queue.purge().await?;
        }
        info!(?report, "Teardown complete");
        Ok(report)
    }

    /// Gracefully shuts down the entire system.
    ///
    /// The processor stops pulling and finishes its batches. Dropping the clients then closes
    /// every mailbox; actors holding clients of other actors in their context release them as
    /// they stop, so the shutdown cascades down the (acyclic) dependency graph.
    pub async fn shutdown(self) -> Result<StatsSnapshot, PipelineError> {
        info!("Shutting down pipeline...");
        let Self {
            ingestion,
            dead_letter,
            audit_queue,
            topic,
            router,
            monitor,
            shutdown,
            processor,
            actors,
            ..
        } = self;

        // Receivers see the flag, and a dropped sender also reads as a stop
        let _ = shutdown.send(true);
        let stats = processor.await.map_err(|e| PipelineError::TaskFailed {
            name: "processor".to_string(),
            reason: e.to_string(),
        })?;

        drop(ingestion);
        drop(dead_letter);
        drop(audit_queue);
        drop(topic);
        drop(router);
        drop(monitor);

        let mut first_failure = None;
        for (name, handle) in actors {
            if let Err(e) = handle.await {
                error!(component = name, error = %e, "Actor task failed");
                first_failure.get_or_insert(PipelineError::TaskFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                });
            }
        }
        if let Some(e) = first_failure {
            return Err(e);
        }

        info!(?stats, "Pipeline shutdown complete");
        Ok(stats)
    }
}
