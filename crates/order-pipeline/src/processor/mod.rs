//! # Order Processor
//!
//! The consumer side of the ingestion queue. It pulls batches, processes every message
//! independently and reports per-message outcomes:
//!
//! 1. decode the order document
//! 2. apply business effects through the [`OrderHandler`] (skipped if already applied)
//! 3. emit one `ORDER_PROCESSED` event to the router (skipped if already emitted)
//! 4. acknowledge
//!
//! A failure anywhere before step 4 leaves the message leased. It becomes receivable again
//! when the lease expires, or at once under [`FailureMode::ReleaseImmediately`]; the queue's
//! redrive policy bounds the number of attempts. Only failed messages are reported in the
//! [`BatchResponse`]; the rest of the batch is acknowledged.
//!
//! ## Concurrency
//!
//! [`OrderProcessor::run`] keeps at most `max_concurrency` batches in flight, each in its own
//! task, gated by a semaphore. Messages for the same order id are serialized by the
//! [`IdempotencyStore`].

pub mod batch;
pub mod error;
pub mod handler;
pub mod idempotency;

pub use batch::*;
pub use error::*;
pub use handler::*;
pub use idempotency::*;

use crate::clients::{QueueClient, RouterClient};
use crate::config::{ConsumerConfig, FailureMode};
use crate::model::{DomainEvent, Order, ReceivedMessage, ORDER_PROCESSED, ORDER_SERVICE_SOURCE};
use crate::queue_actor::QueueError;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Pause after a failed receive before polling again.
const RECEIVE_ERROR_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
pub struct ProcessorStats {
    batches: AtomicU64,
    received: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    duplicates: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub batches: u64,
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Messages whose order was already fully processed.
    pub duplicates: u64,
}

impl ProcessorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }
}

enum Outcome {
    Processed,
    Duplicate,
}

pub struct OrderProcessor<H: OrderHandler> {
    queue: QueueClient,
    router: RouterClient,
    handler: Arc<H>,
    idempotency: IdempotencyStore,
    config: ConsumerConfig,
    stats: Arc<ProcessorStats>,
}

impl<H: OrderHandler> OrderProcessor<H> {
    pub fn new(
        queue: QueueClient,
        router: RouterClient,
        handler: H,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            router,
            handler: Arc::new(handler),
            idempotency: IdempotencyStore::new(),
            config,
            stats: Arc::default(),
        }
    }

    /// Shares an existing marker store, e.g. between processor instances.
    pub fn with_idempotency(mut self, store: IdempotencyStore) -> Self {
        self.idempotency = store;
        self
    }

    pub fn stats(&self) -> Arc<ProcessorStats> {
        Arc::clone(&self.stats)
    }

    pub fn idempotency(&self) -> &IdempotencyStore {
        &self.idempotency
    }

    /// Pulls and processes batches until `shutdown` turns true (or its sender is dropped).
    ///
    /// A pull already waiting is allowed to finish so no lease is abandoned; batches in
    /// flight are always completed before this returns.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> StatsSnapshot {
        let this = Arc::new(self);
        let permits = Arc::new(Semaphore::new(this.config.max_concurrency.max(1)));
        let mut in_flight = JoinSet::new();
        info!(
            queue = %this.queue.name(),
            batch_size = this.config.batch_size,
            max_concurrency = this.config.max_concurrency,
            "Processor started"
        );

        loop {
            while in_flight.try_join_next().is_some() {}
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                permit = Arc::clone(&permits).acquire_owned() => permit,
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            };
            // The semaphore is never closed
            let Ok(permit) = permit else { break };

            let batch = match this
                .queue
                .receive_batch(this.config.batch_size, this.config.max_batching_window)
                .await
            {
                Ok(batch) => batch,
                Err(QueueError::ActorCommunicationError(e)) => {
                    error!(error = %e, "Ingestion queue is gone, stopping");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "Receive failed");
                    tokio::time::sleep(RECEIVE_ERROR_BACKOFF).await;
                    continue;
                }
            };
            if batch.is_empty() {
                continue;
            }

            let worker = Arc::clone(&this);
            let span = info_span!("batch", size = batch.len());
            in_flight.spawn(
                async move {
                    let _permit = permit;
                    worker.process_batch(batch).await
                }
                .instrument(span),
            );
        }

        while in_flight.join_next().await.is_some() {}
        let stats = this.stats.snapshot();
        info!(?stats, "Processor stopped");
        stats
    }

    /// Processes one batch and acknowledges what succeeded.
    ///
    /// With `report_batch_item_failures` off, one failure fails the whole batch: nothing is
    /// acknowledged and every message is reported.
    pub async fn process_batch(&self, batch: Vec<ReceivedMessage>) -> BatchResponse {
        self.stats.batches.fetch_add(1, Ordering::Relaxed);
        self.stats
            .received
            .fetch_add(batch.len() as u64, Ordering::Relaxed);

        let mut succeeded = Vec::with_capacity(batch.len());
        let mut failed = Vec::new();
        for message in &batch {
            match self.process_message(message).await {
                Ok(outcome) => {
                    if let Outcome::Duplicate = outcome {
                        self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                    }
                    succeeded.push(message);
                }
                Err(e) => {
                    warn!(
                        message_id = %message.id,
                        receive_count = message.receive_count,
                        error = %e,
                        "Message failed"
                    );
                    let recorded = match message.receipt() {
                        Ok(receipt) => self.queue.record_failure(receipt, e.to_string()).await,
                        Err(e) => Err(e),
                    };
                    if let Err(e) = recorded {
                        debug!(message_id = %message.id, error = %e, "Could not record failure reason");
                    }
                    failed.push(message);
                }
            }
        }

        let failures = if failed.is_empty() || self.config.report_batch_item_failures {
            for message in succeeded {
                let acked = match message.receipt() {
                    Ok(receipt) => self.queue.acknowledge(receipt).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = acked {
                    // The lease ran out mid-batch; the marker makes the redelivery a no-op
                    warn!(message_id = %message.id, error = %e, "Acknowledge failed");
                }
            }
            failed
        } else {
            batch.iter().collect()
        };

        if self.config.failure_mode == FailureMode::ReleaseImmediately {
            for message in &failures {
                let released = match message.receipt() {
                    Ok(receipt) => self.queue.change_visibility(receipt, Duration::ZERO).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = released {
                    warn!(message_id = %message.id, error = %e, "Release failed");
                }
            }
        }
        let failures: Vec<_> = failures.iter().map(|m| m.id).collect();

        self.stats
            .succeeded
            .fetch_add((batch.len() - failures.len()) as u64, Ordering::Relaxed);
        self.stats
            .failed
            .fetch_add(failures.len() as u64, Ordering::Relaxed);
        info!(
            successful = batch.len() - failures.len(),
            failed = failures.len(),
            "Batch complete"
        );
        BatchResponse {
            batch_item_failures: failures,
        }
    }

    async fn process_message(&self, message: &ReceivedMessage) -> Result<Outcome, ProcessorError> {
        let order =
            Order::from_body(&message.body).map_err(|e| ProcessorError::Decode(e.to_string()))?;
        let mut marker = self.idempotency.lock(&order.order_id).await;
        if marker.is_complete() {
            info!(order_id = %order.order_id, message_id = %message.id, "Order already processed, skipping");
            return Ok(Outcome::Duplicate);
        }

        if !marker.effects_applied {
            self.handler.handle(&order).await?;
            marker.effects_applied = true;
        }

        if marker.emitted_event.is_none() {
            let event = DomainEvent::new(
                ORDER_SERVICE_SOURCE,
                ORDER_PROCESSED,
                order.processed_detail(),
            );
            let event_id = event.event_id;
            let matched = self.router.put_event(event).await?;
            marker.emitted_event = Some(event_id);
            debug!(order_id = %order.order_id, %event_id, matched, "Event emitted");
        }

        info!(
            order_id = %order.order_id,
            message_id = %message.id,
            receive_count = message.receive_count,
            "Order processed"
        );
        Ok(Outcome::Processed)
    }
}
