//! Requests understood by the Queue actor.
//!
//! Every variant carries its own [`Response`] sender. The queue answers each one before it
//! looks at the next, which is what makes receive/acknowledge/redirect atomic with respect to
//! concurrent receivers.

use super::QueueError;
use crate::config::RedrivePolicy;
use crate::model::{DeadLetteredMessage, MessageId, OrderMessage, ReceiptHandle, ReceivedMessage};
use actor_runtime::Response;
use std::time::Duration;

#[derive(Debug)]
pub enum QueueRequest {
    /// Enqueues a message and makes it visible.
    Send {
        message: OrderMessage,
        respond_to: Response<Result<MessageId, QueueError>>,
    },
    /// Leases up to `max_messages` visible messages. Never waits; long-polling lives in the
    /// client.
    Receive {
        max_messages: usize,
        respond_to: Response<Vec<ReceivedMessage>>,
    },
    /// Deletes an in-flight message. The handle must belong to the current lease.
    Acknowledge {
        receipt: ReceiptHandle,
        respond_to: Response<Result<(), QueueError>>,
    },
    /// Restarts the lease of an in-flight message with a new timeout. Zero releases it.
    ChangeVisibility {
        receipt: ReceiptHandle,
        timeout: Duration,
        respond_to: Response<Result<(), QueueError>>,
    },
    /// Pushes the current lease deadline further out.
    ExtendVisibility {
        receipt: ReceiptHandle,
        by: Duration,
        respond_to: Response<Result<(), QueueError>>,
    },
    /// Remembers why the last processing attempt failed, for the dead-letter record.
    RecordFailure {
        receipt: ReceiptHandle,
        reason: String,
        respond_to: Response<Result<(), QueueError>>,
    },
    /// Accepts a message redirected from another queue.
    DeadLetter {
        message: DeadLetteredMessage,
        respond_to: Response<Result<MessageId, QueueError>>,
    },
    /// Lists visible messages without leasing them.
    Peek {
        max_messages: usize,
        respond_to: Response<Vec<ReceivedMessage>>,
    },
    Attributes {
        respond_to: Response<QueueAttributes>,
    },
    /// Drops every message. Answers with the number removed.
    Purge { respond_to: Response<usize> },
}

/// Point-in-time view of a queue's settings and counts.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueAttributes {
    pub name: String,
    pub visible: usize,
    pub in_flight: usize,
    pub visibility_timeout: Duration,
    pub retention_period: Duration,
    pub redrive_policy: Option<RedrivePolicy>,
}

impl QueueAttributes {
    pub fn total(&self) -> usize {
        self.visible + self.in_flight
    }
}
