//! # Queue Client
//!
//! Provides a high-level API for interacting with a Queue actor.
//! It wraps a `Mailbox<QueueRequest>` and adds long-polling on top of the actor's
//! non-blocking receive.
use crate::model::{DeadLetteredMessage, MessageId, OrderMessage, ReceiptHandle, ReceivedMessage};
use crate::queue_actor::{QueueAttributes, QueueError, QueueRequest, MAX_BATCH_SIZE};
use actor_runtime::{ActorClient, ActorError, Mailbox};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, instrument};

/// Client for interacting with a Queue actor.
#[derive(Clone)]
pub struct QueueClient {
    name: Arc<str>,
    mailbox: Mailbox<QueueRequest>,
    arrivals: Arc<Notify>,
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl ActorClient for QueueClient {
    type Request = QueueRequest;
    type Error = QueueError;

    fn mailbox(&self) -> &Mailbox<QueueRequest> {
        &self.mailbox
    }

    fn map_error(e: ActorError) -> Self::Error {
        QueueError::from(e)
    }
}

fn check_batch_size(requested: usize) -> Result<(), QueueError> {
    if (1..=MAX_BATCH_SIZE).contains(&requested) {
        Ok(())
    } else {
        Err(QueueError::InvalidBatchSize {
            requested,
            max: MAX_BATCH_SIZE,
        })
    }
}

impl QueueClient {
    pub fn new(name: String, mailbox: Mailbox<QueueRequest>, arrivals: Arc<Notify>) -> Self {
        Self {
            name: name.into(),
            mailbox,
            arrivals,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueues a payload and returns the new message id.
    #[instrument(skip(self, body), fields(queue = %self.name))]
    pub async fn send(&self, body: impl Into<String> + Send) -> Result<MessageId, QueueError> {
        self.send_message(OrderMessage::new(body)).await
    }

    /// Enqueues a prepared message, keeping its id and receive count.
    pub async fn send_message(&self, message: OrderMessage) -> Result<MessageId, QueueError> {
        self.request(|respond_to| QueueRequest::Send {
            message,
            respond_to,
        })
        .await?
    }

    /// Enqueues up to ten payloads. Stops at the first rejected payload.
    #[instrument(skip(self, bodies), fields(queue = %self.name))]
    pub async fn send_batch(&self, bodies: Vec<String>) -> Result<Vec<MessageId>, QueueError> {
        check_batch_size(bodies.len())?;
        let mut ids = Vec::with_capacity(bodies.len());
        for body in bodies {
            ids.push(self.send(body).await?);
        }
        Ok(ids)
    }

    /// Leases up to `max_messages` messages, waiting at most `wait` for the first to arrive.
    ///
    /// Returns as soon as any message is available; an empty batch means the wait elapsed.
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn receive_batch(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        check_batch_size(max_messages)?;
        let deadline = Instant::now() + wait;
        loop {
            // Register before asking so an arrival between the two is not missed
            let notified = self.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self
                .request(move |respond_to| QueueRequest::Receive {
                    max_messages,
                    respond_to,
                })
                .await?;
            if !batch.is_empty() || Instant::now() >= deadline {
                debug!(received = batch.len(), "Receive complete");
                return Ok(batch);
            }

            tokio::select! {
                _ = &mut notified => {}
                _ = sleep_until(deadline) => {}
            }
        }
    }

    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn acknowledge(&self, receipt: ReceiptHandle) -> Result<(), QueueError> {
        self.request(move |respond_to| QueueRequest::Acknowledge {
            receipt,
            respond_to,
        })
        .await?
    }

    /// Restarts the lease with `timeout`. `Duration::ZERO` makes the message receivable now.
    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn change_visibility(
        &self,
        receipt: ReceiptHandle,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        self.request(move |respond_to| QueueRequest::ChangeVisibility {
            receipt,
            timeout,
            respond_to,
        })
        .await?
    }

    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn extend_visibility(
        &self,
        receipt: ReceiptHandle,
        by: Duration,
    ) -> Result<(), QueueError> {
        self.request(move |respond_to| QueueRequest::ExtendVisibility {
            receipt,
            by,
            respond_to,
        })
        .await?
    }

    /// Remembers why the delivery behind `receipt` failed, for the dead-letter record.
    pub async fn record_failure(
        &self,
        receipt: ReceiptHandle,
        reason: impl Into<String> + Send,
    ) -> Result<(), QueueError> {
        let reason = reason.into();
        self.request(move |respond_to| QueueRequest::RecordFailure {
            receipt,
            reason,
            respond_to,
        })
        .await?
    }

    /// Hands a redirected message to this (dead-letter) queue.
    pub async fn dead_letter(&self, message: DeadLetteredMessage) -> Result<MessageId, QueueError> {
        self.request(|respond_to| QueueRequest::DeadLetter {
            message,
            respond_to,
        })
        .await?
    }

    pub async fn peek(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>, QueueError> {
        self.request(move |respond_to| QueueRequest::Peek {
            max_messages,
            respond_to,
        })
        .await
    }

    pub async fn attributes(&self) -> Result<QueueAttributes, QueueError> {
        self.request(|respond_to| QueueRequest::Attributes { respond_to })
            .await
    }

    /// Approximate number of visible messages.
    pub async fn depth(&self) -> Result<usize, QueueError> {
        Ok(self.attributes().await?.visible)
    }

    /// Approximate number of messages held, visible or in flight.
    pub async fn approximate_depth(&self) -> Result<usize, QueueError> {
        Ok(self.attributes().await?.total())
    }

    #[instrument(skip(self), fields(queue = %self.name))]
    pub async fn purge(&self) -> Result<usize, QueueError> {
        self.request(|respond_to| QueueRequest::Purge { respond_to })
            .await
    }

    /// Moves up to `max` messages from this queue to `target` with a fresh receive count.
    ///
    /// This is the operator's redrive-back action for a dead-letter queue. Each message is
    /// acknowledged here only after `target` accepted it.
    #[instrument(skip(self, target), fields(queue = %self.name, destination = %target.name))]
    pub async fn replay_to(&self, target: &QueueClient, max: usize) -> Result<usize, QueueError> {
        let mut moved = 0;
        while moved < max {
            let batch = self
                .receive_batch((max - moved).min(MAX_BATCH_SIZE), Duration::ZERO)
                .await?;
            if batch.is_empty() {
                break;
            }
            for message in batch {
                target
                    .send_message(OrderMessage {
                        id: message.id,
                        body: message.body.clone(),
                        enqueue_time: message.enqueue_time,
                        receive_count: 0,
                    })
                    .await?;
                self.acknowledge(message.receipt()?).await?;
                moved += 1;
            }
        }
        info!(moved, "Replayed messages");
        Ok(moved)
    }
}
