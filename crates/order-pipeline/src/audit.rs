//! # Audit Log
//!
//! Read side of the audit sink. The router writes every processed-order event into the audit
//! queue as JSON; [`AuditLog`] turns those entries back into [`DomainEvent`]s for compliance
//! and replay tooling. The order processor never reads this queue.

use crate::clients::QueueClient;
use crate::model::{DomainEvent, MessageId};
use crate::queue_actor::{QueueError, MAX_BATCH_SIZE};
use std::time::Duration;
use tracing::{info, warn};

/// Result of draining the audit queue.
#[derive(Debug, Default)]
pub struct AuditReplay {
    pub events: Vec<DomainEvent>,
    /// Entries that are not events. They stay in the queue.
    pub skipped: Vec<MessageId>,
}

#[derive(Debug, Clone)]
pub struct AuditLog {
    queue: QueueClient,
}

impl AuditLog {
    pub fn new(queue: QueueClient) -> Self {
        Self { queue }
    }

    pub async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.queue.attributes().await?.total())
    }

    /// Reads visible entries without consuming them.
    pub async fn peek(&self, max: usize) -> Result<Vec<DomainEvent>, QueueError> {
        Ok(self
            .queue
            .peek(max)
            .await?
            .iter()
            .filter_map(|m| serde_json::from_str(&m.body).ok())
            .collect())
    }

    /// Consumes up to `max` entries and returns them as events, oldest first.
    pub async fn replay(&self, max: usize) -> Result<AuditReplay, QueueError> {
        let mut replay = AuditReplay::default();
        while replay.events.len() < max {
            let want = (max - replay.events.len()).min(MAX_BATCH_SIZE);
            let batch = self.queue.receive_batch(want, Duration::ZERO).await?;
            if batch.is_empty() {
                break;
            }
            for message in batch {
                match serde_json::from_str::<DomainEvent>(&message.body) {
                    Ok(event) => {
                        self.queue.acknowledge(message.receipt()?).await?;
                        replay.events.push(event);
                    }
                    Err(e) => {
                        warn!(message_id = %message.id, error = %e, "Audit entry is not an event");
                        replay.skipped.push(message.id);
                    }
                }
            }
        }
        replay.events.sort_by_key(|e| e.timestamp);
        info!(
            replayed = replay.events.len(),
            skipped = replay.skipped.len(),
            "Audit replay complete"
        );
        Ok(replay)
    }
}
