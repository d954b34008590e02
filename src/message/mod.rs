use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Message kinds carried over the wire as short lowercase tokens.
///
/// Tokens the server does not know decode to `Unknown` rather than failing,
/// so a newer client cannot crash an older server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Message,
    Notification,
    Event,
    Ping,
    Pong,
    Error,
    Subscribe,
    Unsubscribe,
    Ack,
    #[serde(other)]
    Unknown,
}

/// A single hub message.
///
/// Immutable once it leaves the originating client, with one exception:
/// the client stamps `user_id` before forwarding a user message to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// UUIDv7 identifier, used for logging and dedup only
    pub id: String,

    #[serde(rename = "type")]
    pub msg_type: MessageType,

    /// Opaque payload, shape depends on `msg_type`
    #[serde(default)]
    pub data: Value,

    /// Event name, only set for `MessageType::Event`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Originating user (0 = anonymous or server-originated)
    #[serde(default)]
    pub user_id: u64,

    pub timestamp: DateTime<Utc>,
}

/// Inbound frame shape. Clients only choose type, data and event name;
/// identity and timestamps are always assigned server-side.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    msg_type: MessageType,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    event: Option<String>,
}

impl Message {
    /// Build a message with a fresh ID and the current time. Never fails.
    pub fn new(msg_type: MessageType, data: Value) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            msg_type,
            data,
            event: None,
            user_id: 0,
            timestamp: Utc::now(),
        }
    }

    /// Named event with an arbitrary payload.
    pub fn event(name: impl Into<String>, payload: Value) -> Self {
        let mut msg = Self::new(MessageType::Event, payload);
        msg.event = Some(name.into());
        msg
    }

    /// Notification with `{"title", "body"}` data.
    pub fn notification(title: &str, body: &str) -> Self {
        Self::new(
            MessageType::Notification,
            json!({ "title": title, "body": body }),
        )
    }

    /// Confirmation of a membership change, e.g. `ack("subscribed", "lobby")`.
    pub fn ack(action: &str, room: &str) -> Self {
        Self::new(MessageType::Ack, json!({ "action": action, "room": room }))
    }

    pub fn pong() -> Self {
        Self::new(MessageType::Pong, Value::Null)
    }

    pub fn error(text: &str) -> Self {
        Self::new(MessageType::Error, json!({ "error": text }))
    }

    /// Decode an inbound JSON text frame.
    ///
    /// `data` and `event` are optional; any client-supplied `id`, `user_id`
    /// or `timestamp` is ignored.
    pub fn decode_frame(text: &str) -> Result<Self, serde_json::Error> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        let mut msg = Self::new(frame.msg_type, frame.data);
        if frame.msg_type == MessageType::Event {
            msg.event = frame.event;
        }
        Ok(msg)
    }

    /// Encode as an outbound JSON text frame.
    pub fn encode_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
