//! Per-order idempotency markers.
//!
//! A marker records two facts about an order id: its business effects were applied, and the
//! id of the event emitted for it. Each fact is written right after the step it describes
//! succeeds, so a redelivery resumes where the previous attempt stopped.
//!
//! The marker of an order is guarded by its own async lock for the whole processing step.
//! Two messages carrying the same order id, processed by concurrent batches, therefore run
//! one after the other instead of both applying effects.
//!
//! Markers expire a ttl after their last use. The pipeline sets the ttl to the ingestion
//! queue's retention period; no redelivery arrives later than that.

use crate::model::{EventId, OrderId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

/// Four days, the default retention of the ingestion queue.
pub const DEFAULT_MARKER_TTL: Duration = Duration::from_secs(4 * 24 * 60 * 60);

/// Upper bound on how often `lock` scans for expired markers.
const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdempotencyRecord {
    pub effects_applied: bool,
    pub emitted_event: Option<EventId>,
}

impl IdempotencyRecord {
    pub fn is_complete(&self) -> bool {
        self.effects_applied && self.emitted_event.is_some()
    }
}

#[derive(Debug)]
struct Marker {
    record: Arc<AsyncMutex<IdempotencyRecord>>,
    last_used: Instant,
}

#[derive(Debug, Default)]
struct Markers {
    entries: HashMap<OrderId, Marker>,
    last_prune: Option<Instant>,
}

impl Markers {
    /// Drops expired markers nobody is holding.
    fn prune(&mut self, ttl: Duration, now: Instant) {
        let before = self.entries.len();
        self.entries.retain(|_, marker| {
            now.duration_since(marker.last_used) < ttl || Arc::strong_count(&marker.record) > 1
        });
        self.last_prune = Some(now);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Expired idempotency markers evicted");
        }
    }
}

/// In-memory marker store shared by all batches of one processor.
#[derive(Debug, Clone)]
pub struct IdempotencyStore {
    ttl: Duration,
    markers: Arc<Mutex<Markers>>,
}

impl Default for IdempotencyStore {
    fn default() -> Self {
        Self::with_ttl(DEFAULT_MARKER_TTL)
    }
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            markers: Arc::new(Mutex::new(Markers::default())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Locks the marker of `order_id`, creating an empty one on first sight.
    pub async fn lock(&self, order_id: &OrderId) -> OwnedMutexGuard<IdempotencyRecord> {
        let record = {
            let mut markers = self
                .markers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let now = Instant::now();
            let due = markers
                .last_prune
                .map_or(true, |at| now.duration_since(at) >= PRUNE_INTERVAL.min(self.ttl));
            if due {
                markers.prune(self.ttl, now);
            }
            let marker = markers
                .entries
                .entry(order_id.clone())
                .or_insert_with(|| Marker {
                    record: Arc::default(),
                    last_used: now,
                });
            marker.last_used = now;
            Arc::clone(&marker.record)
        };
        record.lock_owned().await
    }

    /// Snapshot of the marker, if the order was seen within the ttl.
    pub async fn get(&self, order_id: &OrderId) -> Option<IdempotencyRecord> {
        let record = {
            let markers = self
                .markers
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            markers
                .entries
                .get(order_id)
                .filter(|marker| marker.last_used.elapsed() < self.ttl)
                .map(|marker| Arc::clone(&marker.record))
        }?;
        let record = record.lock().await;
        Some(record.clone())
    }

    pub fn len(&self) -> usize {
        self.markers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_marker_survives_between_locks() {
        let store = IdempotencyStore::new();
        let order = OrderId::from("ORD-1");
        {
            let mut record = store.lock(&order).await;
            assert_eq!(*record, IdempotencyRecord::default());
            record.effects_applied = true;
        }
        let record = store.get(&order).await.unwrap();
        assert!(record.effects_applied);
        assert!(!record.is_complete());
        assert!(store.get(&OrderId::from("ORD-2")).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_order_is_serialized() {
        let store = IdempotencyStore::new();
        let order = OrderId::from("ORD-1");
        let first = store.lock(&order).await;

        let contender = {
            let store = store.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let mut record = store.lock(&order).await;
                record.emitted_event = Some(EventId::new());
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap();
        assert!(store.get(&order).await.unwrap().emitted_event.is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_markers_are_evicted() {
        let store = IdempotencyStore::with_ttl(Duration::from_secs(120));
        let old = OrderId::from("ORD-OLD");
        {
            let mut record = store.lock(&old).await;
            record.effects_applied = true;
            record.emitted_event = Some(EventId::new());
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
        let recent = OrderId::from("ORD-RECENT");
        drop(store.lock(&recent).await);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(store.get(&old).await.is_none());
        assert!(store.get(&recent).await.is_some());

        drop(store.lock(&OrderId::from("ORD-NEW")).await);
        assert_eq!(store.len(), 2);
        assert!(!store.lock(&old).await.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_held_marker_is_not_evicted() {
        let store = IdempotencyStore::with_ttl(Duration::from_secs(30));
        let busy = OrderId::from("ORD-BUSY");
        let guard = store.lock(&busy).await;

        tokio::time::sleep(Duration::from_secs(90)).await;
        drop(store.lock(&OrderId::from("ORD-2")).await);
        assert_eq!(store.len(), 2);
        drop(guard);
    }
}
