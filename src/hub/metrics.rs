use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared between the dispatcher and every client.
///
/// Gauges (`connected_clients`, `rooms`) are only written by the dispatch
/// loop; the delivery counters are bumped from whichever task calls
/// `Client::send`.
#[derive(Clone, Default)]
pub struct HubMetrics {
    connected_clients: Arc<AtomicU64>,
    rooms: Arc<AtomicU64>,
    messages_published: Arc<AtomicU64>,
    messages_delivered: Arc<AtomicU64>,
    messages_dropped: Arc<AtomicU64>,
}

impl HubMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_connected_clients(&self, count: usize) {
        self.connected_clients.store(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn set_rooms(&self, count: usize) {
        self.rooms.store(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) {
        self.messages_published.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delivered(&self) {
        self.messages_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connected_clients: self.connected_clients.load(Ordering::Relaxed),
            rooms: self.rooms.load(Ordering::Relaxed),
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub connected_clients: u64,
    pub rooms: u64,
    pub messages_published: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
}
