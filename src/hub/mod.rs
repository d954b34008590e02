// Real-time message hub: single-writer dispatch loop plus cheap handles

mod dispatcher;
mod metrics;

pub use dispatcher::Dispatcher;
pub use metrics::{HubMetrics, MetricsSnapshot};

use crate::client::{Client, ClientId};
use crate::config::HubConfig;
use crate::message::Message;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

#[cfg(test)]
mod tests;

/// Request tagged with the order in which it was submitted.
///
/// The dispatcher always applies the lowest stamp among the heads of its
/// mailboxes, so requests from one producer are applied in submission order
/// even when they travel through different mailboxes.
pub(crate) struct Stamped<T> {
    pub(crate) seq: u64,
    pub(crate) body: T,
}

/// Join or leave request for one client and one room
pub struct RoomRequest {
    pub client: Arc<Client>,
    pub room: String,
}

/// Read-only inspection requests answered by the dispatch loop
pub(crate) enum HubQuery {
    ClientCount(oneshot::Sender<usize>),
    RoomMembers {
        room: String,
        reply: oneshot::Sender<HashSet<ClientId>>,
    },
    Rooms(oneshot::Sender<Vec<RoomSummary>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSummary {
    pub room: String,
    pub members: usize,
}

/// Handle to the hub. Every operation enqueues a request on the matching
/// mailbox; only the dispatch loop ever touches the client registry and
/// room index.
#[derive(Clone)]
pub struct Hub {
    register_tx: mpsc::Sender<Stamped<Arc<Client>>>,
    unregister_tx: mpsc::Sender<Stamped<ClientId>>,
    join_tx: mpsc::Sender<Stamped<RoomRequest>>,
    leave_tx: mpsc::Sender<Stamped<RoomRequest>>,
    broadcast_tx: mpsc::Sender<Stamped<Message>>,
    query_tx: mpsc::Sender<Stamped<HubQuery>>,
    seq: Arc<AtomicU64>,
    metrics: HubMetrics,
}

impl Hub {
    /// Create a hub handle and the dispatcher that serves it.
    ///
    /// The dispatcher does nothing until `Dispatcher::run` is awaited.
    pub fn new(config: &HubConfig) -> (Self, Dispatcher) {
        let capacity = config.control_mailbox_capacity.max(1);
        let (register_tx, register_rx) = mpsc::channel(capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(capacity);
        let (join_tx, join_rx) = mpsc::channel(capacity);
        let (leave_tx, leave_rx) = mpsc::channel(capacity);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(capacity);
        let (query_tx, query_rx) = mpsc::channel(capacity);
        let metrics = HubMetrics::new();

        let hub = Self {
            register_tx,
            unregister_tx,
            join_tx,
            leave_tx,
            broadcast_tx,
            query_tx,
            seq: Arc::new(AtomicU64::new(0)),
            metrics: metrics.clone(),
        };

        let dispatcher = Dispatcher::new(
            register_rx,
            unregister_rx,
            join_rx,
            leave_rx,
            broadcast_rx,
            query_rx,
            metrics,
        );

        (hub, dispatcher)
    }

    /// Create a hub and run its dispatcher on the current tokio runtime.
    pub fn spawn(config: &HubConfig) -> Self {
        let (hub, dispatcher) = Self::new(config);
        tokio::spawn(dispatcher.run());
        hub
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    pub async fn register(&self, client: Arc<Client>) {
        self.submit(&self.register_tx, client, "register").await;
    }

    pub async fn unregister(&self, client_id: impl Into<ClientId>) {
        self.submit(&self.unregister_tx, client_id.into(), "unregister")
            .await;
    }

    pub async fn request_join_room(&self, client: Arc<Client>, room: &str) {
        let request = RoomRequest {
            client,
            room: room.to_string(),
        };
        self.submit(&self.join_tx, request, "join_room").await;
    }

    pub async fn request_leave_room(&self, client: Arc<Client>, room: &str) {
        let request = RoomRequest {
            client,
            room: room.to_string(),
        };
        self.submit(&self.leave_tx, request, "leave_room").await;
    }

    /// Fan a message out to every registered client, sender included.
    pub async fn publish(&self, msg: Message) {
        self.submit(&self.broadcast_tx, msg, "publish").await;
    }

    /// Number of registered clients. 0 if the dispatcher has stopped.
    pub async fn client_count(&self) -> usize {
        self.query(HubQuery::ClientCount).await.unwrap_or_default()
    }

    /// Client IDs currently in `room`
    pub async fn room_members(&self, room: &str) -> HashSet<ClientId> {
        let room = room.to_string();
        self.query(|reply| HubQuery::RoomMembers { room, reply })
            .await
            .unwrap_or_default()
    }

    /// All non-empty rooms with their member counts, sorted by name
    pub async fn rooms(&self) -> Vec<RoomSummary> {
        self.query(HubQuery::Rooms).await.unwrap_or_default()
    }

    async fn query<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> HubQuery) -> Option<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit(&self.query_tx, make(reply_tx), "query").await;
        reply_rx.await.ok()
    }

    async fn submit<T>(&self, tx: &mpsc::Sender<Stamped<T>>, body: T, op: &'static str) {
        let request = Stamped {
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            body,
        };
        if tx.send(request).await.is_err() {
            warn!(op = op, "Hub dispatcher stopped, dropping request");
        }
    }
}
