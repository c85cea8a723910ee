//! Fan-out of published events to every connected session.
//!
//! The bus wraps a [`tokio::sync::broadcast`] channel. Each subscriber
//! has its own bounded ring buffer: a slow session loses its oldest
//! unread events (and learns about it through
//! [`RecvError::Lagged`](broadcast::error::RecvError::Lagged)) instead of
//! applying back-pressure to the publisher.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::trace;

use crate::event::{DispatchEvent, EventEnvelope};

/// Default per-subscriber buffer size.
pub const DEFAULT_CAPACITY: usize = 256;

/// Sequence counter and clock of the last published event.
#[derive(Debug)]
struct Cursor {
    seq: u64,
    timestamp: DateTime<Utc>,
}

/// Publisher side of the event stream.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<Arc<EventEnvelope>>,
    cursor: Mutex<Cursor>,
}

impl EventBus {
    /// Create a bus whose subscribers buffer up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            cursor: Mutex::new(Cursor {
                seq: 0,
                timestamp: DateTime::<Utc>::MIN_UTC,
            }),
        }
    }

    /// Stamp `event` with the next sequence number and publish it.
    ///
    /// Returns the assigned sequence number. Publishing with no
    /// subscribers is not an error.
    pub fn publish(&self, event: DispatchEvent) -> u64 {
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        cursor.seq = cursor.seq.saturating_add(1);
        cursor.timestamp = cursor.timestamp.max(Utc::now());

        let envelope = Arc::new(EventEnvelope {
            seq: cursor.seq,
            timestamp: cursor.timestamp,
            event,
        });
        trace!(
            seq = envelope.seq,
            event_type = envelope.event.type_name(),
            "event published"
        );

        // send returns Err only when there are zero receivers,
        // which is normal when no dispatcher is connected.
        let _ = self.tx.send(envelope);
        cursor.seq
    }

    /// Sequence number of the most recently published event (0 if none).
    pub fn current_seq(&self) -> u64 {
        self.cursor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .seq
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EventEnvelope>> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
