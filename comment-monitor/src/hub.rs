//! Best-effort fan-out of monitor events.
//!
//! Each subscriber owns a bounded queue. A subscriber whose queue is full or
//! closed simply misses that event; it is removed only when it unsubscribes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace};

use crate::monitor::EventEnvelope;

/// Default per-subscriber queue depth.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// A registered subscriber.
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<Arc<EventEnvelope>>,
}

/// Registry of live subscribers.
pub struct BroadcastHub {
    subscribers: DashMap<u64, mpsc::Sender<Arc<EventEnvelope>>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.capacity);
        self.subscribers.insert(id, tx);
        debug!(subscriber = id, total = self.subscribers.len(), "subscriber connected");
        Subscription { id, rx }
    }

    /// Returns `true` when `id` was registered.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            debug!(subscriber = id, total = self.subscribers.len(), "subscriber disconnected");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Push `event` to every current subscriber and return how many accepted it.
    ///
    /// Never fails. Senders are cloned out of the map first so no shard lock
    /// is held while delivering.
    pub fn broadcast(&self, event: Arc<EventEnvelope>) -> usize {
        let targets: Vec<(u64, mpsc::Sender<Arc<EventEnvelope>>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&event)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!(subscriber = id, seq = event.seq, "subscriber lagging, event dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(subscriber = id, seq = event.seq, "subscriber gone, event dropped");
                }
            }
        }
        delivered
    }
}
