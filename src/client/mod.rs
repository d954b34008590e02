use crate::hub::Hub;
use crate::message::{Message, MessageType};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};
use uuid::Uuid;


/// Stable per-connection identifier
pub type ClientId = String;

/// Server-side actor for one live connection.
///
/// `rooms` is written only by the hub's dispatch loop and is an advisory
/// view; the hub's room index is authoritative. `metadata` is touched from
/// the connection tasks and has its own lock.
pub struct Client {
    id: ClientId,
    user_id: u64,
    hub: Hub,
    mailbox: RwLock<Option<mpsc::Sender<Message>>>,
    rooms: RwLock<HashSet<String>>,
    metadata: RwLock<HashMap<String, Value>>,
}

impl Client {
    /// Create a client and the receiving end of its outbound mailbox.
    ///
    /// The receiver belongs to the connection's write loop. It yields `None`
    /// once the hub has unregistered the client and the queue is drained.
    pub fn new(
        user_id: u64,
        hub: Hub,
        mailbox_capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(mailbox_capacity.max(1));
        let client = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            hub,
            mailbox: RwLock::new(Some(tx)),
            rooms: RwLock::new(HashSet::new()),
            metadata: RwLock::new(HashMap::new()),
        });
        (client, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    /// Non-blocking enqueue onto the outbound mailbox.
    ///
    /// A full mailbox drops the message and logs a warning. Never waits, so a
    /// stalled connection cannot hold up the hub or any other client.
    pub fn send(&self, msg: Message) {
        let mailbox = self.mailbox.read().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = mailbox.as_ref() else {
            debug!(client_id = %self.id, message_id = %msg.id, "Mailbox closed, dropping message");
            return;
        };

        match tx.try_send(msg) {
            Ok(()) => self.hub.metrics().record_delivered(),
            Err(TrySendError::Full(dropped)) => {
                self.hub.metrics().record_dropped();
                warn!(
                    client_id = %self.id,
                    message_id = %dropped.id,
                    "Client mailbox full, dropping message"
                );
            }
            Err(TrySendError::Closed(dropped)) => {
                debug!(
                    client_id = %self.id,
                    message_id = %dropped.id,
                    "Write loop gone, dropping message"
                );
            }
        }
    }

    /// Drop the mailbox sender. Only the dispatch loop calls this.
    pub(crate) fn close(&self) {
        let mut mailbox = self.mailbox.write().unwrap_or_else(|e| e.into_inner());
        mailbox.take();
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    pub fn set_metadata(&self, key: impl Into<String>, value: Value) {
        let mut metadata = self.metadata.write().unwrap_or_else(|e| e.into_inner());
        metadata.insert(key.into(), value);
    }

    /// Returns `(Value::Null, false)` for a key that was never set.
    pub fn get_metadata(&self, key: &str) -> (Value, bool) {
        let metadata = self.metadata.read().unwrap_or_else(|e| e.into_inner());
        match metadata.get(key) {
            Some(value) => (value.clone(), true),
            None => (Value::Null, false),
        }
    }

    pub fn metadata_snapshot(&self) -> HashMap<String, Value> {
        self.metadata
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Rooms this client currently belongs to (advisory copy)
    pub fn rooms(&self) -> HashSet<String> {
        self.rooms.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn in_room(&self, room: &str) -> bool {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(room)
    }

    pub(crate) fn add_room(&self, room: &str) {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        rooms.insert(room.to_string());
    }

    pub(crate) fn remove_room(&self, room: &str) {
        let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
        rooms.remove(room);
    }

    /// Dispatch one decoded inbound message.
    ///
    /// Ping is answered locally, subscribe/unsubscribe become hub membership
    /// requests, user messages are stamped with this client's identity and
    /// published. Server-to-client types and unknown types are ignored.
    pub async fn handle_message(self: &Arc<Self>, mut msg: Message) {
        match msg.msg_type {
            MessageType::Ping => self.send(Message::pong()),
            MessageType::Subscribe => match msg.data.as_str() {
                Some(room) if !room.is_empty() => {
                    self.hub.request_join_room(Arc::clone(self), room).await;
                }
                _ => {
                    debug!(
                        client_id = %self.id,
                        data = %msg.data,
                        "Ignoring subscribe without room name"
                    );
                }
            },
            MessageType::Unsubscribe => match msg.data.as_str() {
                Some(room) => {
                    self.hub.request_leave_room(Arc::clone(self), room).await;
                }
                None => {
                    debug!(
                        client_id = %self.id,
                        data = %msg.data,
                        "Ignoring unsubscribe without room name"
                    );
                }
            },
            MessageType::Message => {
                msg.user_id = self.user_id;
                self.hub.publish(msg).await;
            }
            MessageType::Notification
            | MessageType::Event
            | MessageType::Error
            | MessageType::Pong
            | MessageType::Ack
            | MessageType::Unknown => {
                debug!(
                    client_id = %self.id,
                    message_type = ?msg.msg_type,
                    "Ignoring message type not accepted from clients"
                );
            }
        }
    }
}
