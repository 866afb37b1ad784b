//! [`ActorBehavior`] implementation for [`QueueState`].
//!
//! A message is either *visible* (its id sits in the `visible` deque and it has no lease) or
//! *in flight* (leased until a deadline). Expired leases are reaped by [`QueueState::sweep`],
//! which runs before every request and on every tick. Reaping is also where redrive happens:
//! a message whose lease expires after its last allowed receive is counted as received once
//! more and handed to the dead-letter queue instead of becoming visible again.

use super::{QueueAttributes, QueueError, QueueRequest, MAX_MESSAGE_BYTES};
use crate::clients::QueueClient;
use crate::config::QueueConfig;
use crate::model::{
    DeadLetterInfo, DeadLetteredMessage, MessageId, OrderMessage, ReceiptHandle,
    ReceivedMessage,
};
use actor_runtime::ActorBehavior;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Dependencies injected when the queue starts.
#[derive(Clone, Debug, Default)]
pub struct QueueContext {
    /// Where exhausted messages go. Only set for queues with a redrive policy.
    pub dead_letter: Option<QueueClient>,
}

#[derive(Debug, Clone, Copy)]
struct Lease {
    deadline: Instant,
    receipt: ReceiptHandle,
}

#[derive(Debug)]
struct StoredMessage {
    message: OrderMessage,
    lease: Option<Lease>,
    last_failure: Option<String>,
    dead_letter: Option<DeadLetterInfo>,
    arrived_at: Instant,
}

impl StoredMessage {
    fn new(message: OrderMessage, dead_letter: Option<DeadLetterInfo>) -> Self {
        Self {
            message,
            lease: None,
            last_failure: None,
            dead_letter,
            arrived_at: Instant::now(),
        }
    }

    fn view(&self) -> ReceivedMessage {
        ReceivedMessage {
            id: self.message.id,
            body: self.message.body.clone(),
            enqueue_time: self.message.enqueue_time,
            receive_count: self.message.receive_count,
            visibility_deadline: self.lease.map(|l| l.deadline),
            receipt_handle: self.lease.map(|l| l.receipt),
            dead_letter: self.dead_letter.clone(),
        }
    }
}

/// The state owned by one queue actor.
#[derive(Debug)]
pub struct QueueState {
    config: QueueConfig,
    visible: VecDeque<MessageId>,
    messages: HashMap<MessageId, StoredMessage>,
    arrivals: Arc<Notify>,
}

impl QueueState {
    pub fn new(config: QueueConfig, arrivals: Arc<Notify>) -> Self {
        Self {
            config,
            visible: VecDeque::new(),
            messages: HashMap::new(),
            arrivals,
        }
    }

    fn in_flight(&self) -> usize {
        self.messages.len() - self.visible.len()
    }

    fn make_visible(&mut self, id: MessageId) {
        self.visible.push_back(id);
        self.arrivals.notify_waiters();
    }

    fn send(&mut self, message: OrderMessage) -> Result<MessageId, QueueError> {
        if message.body.len() > MAX_MESSAGE_BYTES {
            return Err(QueueError::MessageTooLarge {
                size: message.body.len(),
                limit: MAX_MESSAGE_BYTES,
            });
        }
        let id = message.id;
        if self.messages.contains_key(&id) {
            debug!(queue = %self.config.name, message_id = %id, "Duplicate send ignored");
            return Ok(id);
        }
        self.messages.insert(id, StoredMessage::new(message, None));
        self.make_visible(id);
        Ok(id)
    }

    fn receive(&mut self, max_messages: usize) -> Vec<ReceivedMessage> {
        let deadline = Instant::now() + self.config.visibility_timeout;
        let mut batch = Vec::with_capacity(max_messages.min(self.visible.len()));
        while batch.len() < max_messages {
            let Some(id) = self.visible.pop_front() else {
                break;
            };
            let Some(stored) = self.messages.get_mut(&id) else {
                continue;
            };
            stored.message.receive_count += 1;
            stored.lease = Some(Lease {
                deadline,
                receipt: ReceiptHandle::issue(id),
            });
            batch.push(stored.view());
        }
        batch
    }

    /// The stored message and its lease, provided `receipt` is the handle of that lease.
    fn leased_mut(
        &mut self,
        receipt: ReceiptHandle,
    ) -> Result<(&mut StoredMessage, Lease), QueueError> {
        let id = receipt.message_id;
        let stored = self
            .messages
            .get_mut(&id)
            .ok_or(QueueError::MessageNotFound(id))?;
        match stored.lease {
            None => Err(QueueError::MessageNotInFlight(id)),
            Some(lease) if lease.receipt != receipt => Err(QueueError::StaleLease(id)),
            Some(lease) => Ok((stored, lease)),
        }
    }

    fn acknowledge(&mut self, receipt: ReceiptHandle) -> Result<(), QueueError> {
        self.leased_mut(receipt)?;
        self.messages.remove(&receipt.message_id);
        Ok(())
    }

    fn change_visibility(
        &mut self,
        receipt: ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        let (stored, lease) = self.leased_mut(receipt)?;
        if timeout.is_zero() {
            stored.lease = None;
            self.make_visible(receipt.message_id);
        } else {
            stored.lease = Some(Lease {
                deadline: Instant::now() + timeout,
                ..lease
            });
        }
        Ok(())
    }

    fn extend_visibility(&mut self, receipt: ReceiptHandle, by: Duration) -> Result<(), QueueError> {
        let (stored, lease) = self.leased_mut(receipt)?;
        stored.lease = Some(Lease {
            deadline: lease.deadline + by,
            ..lease
        });
        Ok(())
    }

    fn record_failure(&mut self, receipt: ReceiptHandle, reason: String) -> Result<(), QueueError> {
        let (stored, _) = self.leased_mut(receipt)?;
        stored.last_failure = Some(reason);
        Ok(())
    }

    fn accept_dead_letter(&mut self, dead: DeadLetteredMessage) -> Result<MessageId, QueueError> {
        let id = dead.message.id;
        if self.messages.contains_key(&id) {
            return Ok(id);
        }
        self.messages
            .insert(id, StoredMessage::new(dead.message, Some(dead.info)));
        self.make_visible(id);
        Ok(id)
    }

    fn peek(&self, max_messages: usize) -> Vec<ReceivedMessage> {
        self.visible
            .iter()
            .filter_map(|id| self.messages.get(id))
            .take(max_messages)
            .map(StoredMessage::view)
            .collect()
    }

    fn attributes(&self) -> QueueAttributes {
        QueueAttributes {
            name: self.config.name.clone(),
            visible: self.visible.len(),
            in_flight: self.in_flight(),
            visibility_timeout: self.config.visibility_timeout,
            retention_period: self.config.retention_period,
            redrive_policy: self.config.redrive_policy.clone(),
        }
    }

    fn purge(&mut self) -> usize {
        let removed = self.messages.len();
        self.messages.clear();
        self.visible.clear();
        info!(queue = %self.config.name, removed, "Queue purged");
        removed
    }

    /// Drops messages that outlived the retention period, visible or not.
    fn expire_retained(&mut self, now: Instant) {
        let retention = self.config.retention_period;
        let before = self.messages.len();
        self.messages
            .retain(|_, stored| now.duration_since(stored.arrived_at) < retention);
        let expired = before - self.messages.len();
        if expired > 0 {
            let messages = &self.messages;
            self.visible.retain(|id| messages.contains_key(id));
            info!(queue = %self.config.name, expired, "Retention period elapsed");
        }
    }

    /// Returns expired leases to the visible set, redirecting exhausted messages.
    pub async fn sweep(&mut self, ctx: &QueueContext) {
        let now = Instant::now();
        self.expire_retained(now);

        let mut expired: Vec<(MessageId, Instant)> = self
            .messages
            .iter()
            .filter_map(|(id, stored)| {
                stored
                    .lease
                    .map(|l| l.deadline)
                    .filter(|d| *d <= now)
                    .map(|d| (*id, d))
            })
            .collect();
        if expired.is_empty() {
            return;
        }
        // Oldest deadline first keeps redelivery roughly in expiry order
        expired.sort_by_key(|(_, deadline)| *deadline);

        for (id, _) in expired {
            let exhausted = match (&self.config.redrive_policy, self.messages.get(&id)) {
                (Some(policy), Some(stored)) => {
                    stored.message.receive_count >= policy.max_receive_count
                }
                _ => false,
            };
            if exhausted && self.redrive(id, ctx).await {
                continue;
            }
            if let Some(stored) = self.messages.get_mut(&id) {
                stored.lease = None;
                debug!(
                    queue = %self.config.name,
                    message_id = %id,
                    receive_count = stored.message.receive_count,
                    "Lease expired, message visible again"
                );
                self.make_visible(id);
            }
        }
    }

    /// Moves one message to the dead-letter queue. On failure the message stays here.
    async fn redrive(&mut self, id: MessageId, ctx: &QueueContext) -> bool {
        let Some(dlq) = &ctx.dead_letter else {
            warn!(queue = %self.config.name, message_id = %id, "Redrive policy set but no dead-letter queue wired");
            return false;
        };
        let Some(stored) = self.messages.get(&id) else {
            return false;
        };

        let mut message = stored.message.clone();
        message.receive_count += 1;
        let failure_reason = stored.last_failure.clone().unwrap_or_else(|| {
            format!(
                "visibility timeout expired after {} receives",
                stored.message.receive_count
            )
        });
        let dead = DeadLetteredMessage {
            message,
            info: DeadLetterInfo {
                failure_reason,
                original_queue: self.config.name.clone(),
                dead_lettered_at: Utc::now(),
            },
        };
        let receive_count = dead.message.receive_count;

        match dlq.dead_letter(dead).await {
            Ok(_) => {
                self.messages.remove(&id);
                warn!(
                    queue = %self.config.name,
                    dead_letter_queue = %dlq.name(),
                    message_id = %id,
                    receive_count,
                    "Message moved to dead-letter queue"
                );
                true
            }
            Err(e) => {
                error!(queue = %self.config.name, message_id = %id, error = %e, "Redrive failed, keeping message");
                false
            }
        }
    }
}

#[async_trait]
impl ActorBehavior for QueueState {
    type Request = QueueRequest;
    type Context = QueueContext;

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn handle(&mut self, request: QueueRequest, ctx: &QueueContext) {
        self.sweep(ctx).await;

        // A dropped receiver means the caller gave up; there is nobody left to tell
        match request {
            QueueRequest::Send {
                message,
                respond_to,
            } => {
                let _ = respond_to.send(self.send(message));
            }
            QueueRequest::Receive {
                max_messages,
                respond_to,
            } => {
                let _ = respond_to.send(self.receive(max_messages));
            }
            QueueRequest::Acknowledge {
                receipt,
                respond_to,
            } => {
                let _ = respond_to.send(self.acknowledge(receipt));
            }
            QueueRequest::ChangeVisibility {
                receipt,
                timeout,
                respond_to,
            } => {
                let _ = respond_to.send(self.change_visibility(receipt, timeout));
            }
            QueueRequest::ExtendVisibility {
                receipt,
                by,
                respond_to,
            } => {
                let _ = respond_to.send(self.extend_visibility(receipt, by));
            }
            QueueRequest::RecordFailure {
                receipt,
                reason,
                respond_to,
            } => {
                let _ = respond_to.send(self.record_failure(receipt, reason));
            }
            QueueRequest::DeadLetter {
                message,
                respond_to,
            } => {
                let _ = respond_to.send(self.accept_dead_letter(message));
            }
            QueueRequest::Peek {
                max_messages,
                respond_to,
            } => {
                let _ = respond_to.send(self.peek(max_messages));
            }
            QueueRequest::Attributes { respond_to } => {
                let _ = respond_to.send(self.attributes());
            }
            QueueRequest::Purge { respond_to } => {
                let _ = respond_to.send(self.purge());
            }
        }
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.config.sweep_interval)
    }

    async fn on_tick(&mut self, ctx: &QueueContext) {
        self.sweep(ctx).await;
    }

    async fn on_stop(&mut self, _ctx: &QueueContext) {
        info!(
            queue = %self.config.name,
            visible = self.visible.len(),
            in_flight = self.in_flight(),
            "Queue stopped"
        );
    }
}
