//! Rule targets and their delivery loop.

use super::RouterError;
use crate::clients::{QueueClient, TopicClient};
use crate::config::RouterConfig;
use crate::model::DomainEvent;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Clone, Debug)]
pub enum TargetKind {
    /// Publishes the event as a notification.
    Topic(TopicClient),
    /// Sends the event, serialized as JSON, as a queue message.
    Queue(QueueClient),
}

#[derive(Clone, Debug)]
pub struct RuleTarget {
    /// Unique within a rule. Putting a target with an existing id replaces it.
    pub id: String,
    pub kind: TargetKind,
}

impl RuleTarget {
    pub fn topic(id: impl Into<String>, topic: TopicClient) -> Self {
        Self {
            id: id.into(),
            kind: TargetKind::Topic(topic),
        }
    }

    pub fn queue(id: impl Into<String>, queue: QueueClient) -> Self {
        Self {
            id: id.into(),
            kind: TargetKind::Queue(queue),
        }
    }

    /// Name of the component behind the target.
    pub fn destination(&self) -> &str {
        match &self.kind {
            TargetKind::Topic(topic) => topic.name(),
            TargetKind::Queue(queue) => queue.name(),
        }
    }

    /// One delivery attempt.
    pub async fn deliver(&self, event: &DomainEvent) -> Result<(), RouterError> {
        let failed = |reason: String| RouterError::DeliveryFailed {
            target: self.id.clone(),
            reason,
        };
        match &self.kind {
            TargetKind::Topic(topic) => topic
                .publish_event(event)
                .await
                .map(|_| ())
                .map_err(|e| failed(e.to_string())),
            TargetKind::Queue(queue) => {
                let body = serde_json::to_string(event).map_err(|e| failed(e.to_string()))?;
                queue
                    .send(body)
                    .await
                    .map(|_| ())
                    .map_err(|e| failed(e.to_string()))
            }
        }
    }
}

/// Per-target delivery counters, shared with the delivery tasks.
#[derive(Debug, Default)]
pub struct TargetCounters {
    pub delivered: AtomicU64,
    pub retried: AtomicU64,
    pub exhausted: AtomicU64,
}

/// Snapshot of [`TargetCounters`] for one target of one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetStats {
    pub rule: String,
    pub target: String,
    pub destination: String,
    pub delivered: u64,
    pub retried: u64,
    pub exhausted: u64,
}

/// Delivers one event to one target, retrying with exponential backoff.
///
/// Runs in its own task. Returns whether the event was eventually accepted.
pub async fn deliver_with_retry(
    target: RuleTarget,
    event: Arc<DomainEvent>,
    policy: RouterConfig,
    counters: Arc<TargetCounters>,
) -> bool {
    let mut backoff = policy.initial_backoff;
    for attempt in 1..=policy.max_delivery_attempts {
        match target.deliver(&event).await {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                debug!(target_id = %target.id, event_id = %event.event_id, attempt, "Event delivered");
                return true;
            }
            Err(e) if attempt < policy.max_delivery_attempts => {
                counters.retried.fetch_add(1, Ordering::Relaxed);
                warn!(target_id = %target.id, event_id = %event.event_id, attempt, error = %e, ?backoff, "Delivery failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
            Err(e) => {
                counters.exhausted.fetch_add(1, Ordering::Relaxed);
                error!(target_id = %target.id, event_id = %event.event_id, attempt, error = %e, "Delivery attempts exhausted");
            }
        }
    }
    false
}
