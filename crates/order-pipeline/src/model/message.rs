//! Queue message types.
//!
//! An [`OrderMessage`] is what producers submit. The queue hands it out as a
//! [`ReceivedMessage`], which adds the lease deadline and, for messages sitting in a
//! dead-letter queue, the [`DeadLetterInfo`] describing why they were moved.

use crate::queue_actor::QueueError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tokio::time::Instant;
use uuid::Uuid;

/// Type-safe identifier for queue messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "msg_{}", self.0.simple())
    }
}

/// Proof of one particular lease on a message.
///
/// Every receive issues a fresh handle. Once the lease lapses and the message is received
/// again, the old handle no longer acknowledges, releases or extends anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiptHandle {
    pub message_id: MessageId,
    lease: Uuid,
}

impl ReceiptHandle {
    pub fn issue(message_id: MessageId) -> Self {
        Self {
            message_id,
            lease: Uuid::new_v4(),
        }
    }
}

impl Display for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.message_id, self.lease.simple())
    }
}

/// A message as stored by a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMessage {
    pub id: MessageId,
    /// Opaque payload. For the ingestion queue this is the JSON order document.
    pub body: String,
    pub enqueue_time: DateTime<Utc>,
    /// Times delivered without acknowledgment.
    pub receive_count: u32,
}

impl OrderMessage {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            body: body.into(),
            enqueue_time: Utc::now(),
            receive_count: 0,
        }
    }
}

/// Why and from where a message was dead-lettered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterInfo {
    pub failure_reason: String,
    pub original_queue: String,
    pub dead_lettered_at: DateTime<Utc>,
}

/// A message redirected out of its source queue after exhausting its retry budget.
///
/// `message.receive_count` is frozen at the value it had when it was redirected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetteredMessage {
    pub message: OrderMessage,
    pub info: DeadLetterInfo,
}

/// A message handed out by `receive` or `peek`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub id: MessageId,
    pub body: String,
    pub enqueue_time: DateTime<Utc>,
    pub receive_count: u32,
    /// Until this instant no other receiver can obtain the message. `None` for peeked
    /// messages, which are not leased.
    pub visibility_deadline: Option<Instant>,
    /// Handle of the lease granted by this receive. `None` for peeked messages.
    pub receipt_handle: Option<ReceiptHandle>,
    pub dead_letter: Option<DeadLetterInfo>,
}

impl ReceivedMessage {
    /// The handle needed to acknowledge or change the visibility of this delivery.
    pub fn receipt(&self) -> Result<ReceiptHandle, QueueError> {
        self.receipt_handle
            .ok_or(QueueError::MessageNotInFlight(self.id))
    }

    /// Rebuilds the dead-lettered view of a message read from a dead-letter queue.
    pub fn as_dead_lettered(&self) -> Option<DeadLetteredMessage> {
        self.dead_letter.clone().map(|info| DeadLetteredMessage {
            message: OrderMessage {
                id: self.id,
                body: self.body.clone(),
                enqueue_time: self.enqueue_time,
                receive_count: self.receive_count,
            },
            info,
        })
    }
}
