//! Broadcast fan-out to connected clients
//!
//! Each connection owns one bounded outbound queue drained by its own
//! writer task, so per-connection order equals publish order. Publishing
//! never waits: a full queue drops the message for that connection only,
//! and a closed queue is pruned.

pub mod events;

pub use events::{DeviceState, FrequencySummary, OutboundEvent};

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifies one WebSocket connection for its whole lifetime.
pub type ConnectionId = u64;

/// Serialized frame shared by every recipient of one publish.
pub type Frame = Arc<str>;

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::Sender<Frame>;

/// Serialize an event once for fan-out.
pub fn encode(event: &OutboundEvent) -> Option<Frame> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Arc::from(text)),
        Err(e) => {
            tracing::error!(kind = event.kind(), error = %e, "Failed to serialize event");
            None
        }
    }
}

/// Currently connected observers.
///
/// Cheap to clone; clones share the same set.
#[derive(Clone)]
pub struct ObserverSet {
    observers: Arc<DashMap<ConnectionId, Outbox>>,
    next_id: Arc<AtomicU64>,
    queue_depth: usize,
}

impl ObserverSet {
    pub fn new(queue_depth: usize) -> Self {
        Self {
            observers: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            queue_depth: queue_depth.max(1),
        }
    }

    /// Allocate a connection id and its outbound queue.
    ///
    /// The connection is not an observer until [`ObserverSet::insert`].
    pub fn open_connection(&self) -> (ConnectionId, Outbox, mpsc::Receiver<Frame>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_depth);
        (id, tx, rx)
    }

    pub fn insert(&self, id: ConnectionId, outbox: Outbox) {
        self.observers.insert(id, outbox);
    }

    /// Remove an observer; no-op if absent.
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.observers.remove(&id).is_some()
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.observers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `event` to every observer. Returns how many queues accepted it.
    pub fn broadcast(&self, event: &OutboundEvent) -> usize {
        let Some(frame) = encode(event) else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.observers.iter() {
            match entry.value().try_send(Arc::clone(&frame)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection = *entry.key(),
                        kind = event.kind(),
                        "Observer queue full, dropping event"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Pruned after iteration: removing while a shard guard is held deadlocks
        for id in closed {
            self.observers.remove(&id);
            tracing::debug!(connection = id, "Pruned closed observer");
        }

        tracing::trace!(kind = event.kind(), delivered, "Broadcast");
        delivered
    }
}

/// Send one event to a single connection.
pub fn send_to(outbox: &Outbox, event: &OutboundEvent) -> bool {
    let Some(frame) = encode(event) else {
        return false;
    };
    match outbox.try_send(frame) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(kind = event.kind(), error = %e, "Direct reply not delivered");
            false
        }
    }
}
