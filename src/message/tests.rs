use super::*;
use chrono::Duration;
use serde_json::json;
use std::collections::HashSet;

#[test]
fn test_new_message_has_unique_ids() {
    let ids: HashSet<String> = (0..1000)
        .map(|_| Message::new(MessageType::Message, json!("hi")).id)
        .collect();

    assert_eq!(ids.len(), 1000);
}

#[test]
fn test_new_message_timestamp_is_now() {
    let before = Utc::now();
    let msg = Message::new(MessageType::Message, json!({"text": "hello"}));
    let after = Utc::now();

    assert!(msg.timestamp >= before - Duration::milliseconds(5));
    assert!(msg.timestamp <= after + Duration::milliseconds(5));
}

#[test]
fn test_new_message_stores_data_as_is() {
    let data = json!({"nested": [1, 2, {"x": null}]});
    let msg = Message::new(MessageType::Message, data.clone());

    assert_eq!(msg.data, data);
    assert_eq!(msg.msg_type, MessageType::Message);
    assert_eq!(msg.user_id, 0);
    assert!(msg.event.is_none());
}

#[test]
fn test_event_constructor() {
    let msg = Message::event("user.joined", json!({"user": 7}));

    assert_eq!(msg.msg_type, MessageType::Event);
    assert_eq!(msg.event.as_deref(), Some("user.joined"));
    assert_eq!(msg.data, json!({"user": 7}));
}

#[test]
fn test_notification_constructor() {
    let msg = Message::notification("T", "B");

    assert_eq!(msg.msg_type, MessageType::Notification);
    assert_eq!(msg.data, json!({"title": "T", "body": "B"}));
}

#[test]
fn test_ack_constructor() {
    let msg = Message::ack("subscribed", "room-x");

    assert_eq!(msg.msg_type, MessageType::Ack);
    assert_eq!(msg.data, json!({"action": "subscribed", "room": "room-x"}));
}

#[test]
fn test_type_tokens() {
    let cases = [
        (MessageType::Message, "\"message\""),
        (MessageType::Notification, "\"notification\""),
        (MessageType::Event, "\"event\""),
        (MessageType::Ping, "\"ping\""),
        (MessageType::Pong, "\"pong\""),
        (MessageType::Error, "\"error\""),
        (MessageType::Subscribe, "\"subscribe\""),
        (MessageType::Unsubscribe, "\"unsubscribe\""),
        (MessageType::Ack, "\"ack\""),
    ];

    for (msg_type, token) in cases {
        assert_eq!(serde_json::to_string(&msg_type).unwrap(), token);
        assert_eq!(serde_json::from_str::<MessageType>(token).unwrap(), msg_type);
    }
}

#[test]
fn test_unknown_type_token_decodes_to_unknown() {
    let msg = Message::decode_frame(r#"{"type": "teleport", "data": 1}"#).unwrap();
    assert_eq!(msg.msg_type, MessageType::Unknown);
}

#[test]
fn test_decode_frame_assigns_server_fields() {
    let msg = Message::decode_frame(
        r#"{"type": "message", "data": "hi", "id": "forged", "user_id": 99}"#,
    )
    .unwrap();

    assert_eq!(msg.msg_type, MessageType::Message);
    assert_eq!(msg.data, json!("hi"));
    assert_ne!(msg.id, "forged");
    assert_eq!(msg.user_id, 0);
}

#[test]
fn test_decode_frame_without_data() {
    let msg = Message::decode_frame(r#"{"type": "ping"}"#).unwrap();

    assert_eq!(msg.msg_type, MessageType::Ping);
    assert_eq!(msg.data, Value::Null);
}

#[test]
fn test_decode_frame_keeps_event_name_only_for_events() {
    let event = Message::decode_frame(r#"{"type": "event", "event": "tick", "data": {}}"#).unwrap();
    assert_eq!(event.event.as_deref(), Some("tick"));

    let plain = Message::decode_frame(r#"{"type": "message", "event": "tick"}"#).unwrap();
    assert!(plain.event.is_none());
}

#[test]
fn test_decode_frame_rejects_garbage() {
    assert!(Message::decode_frame("not json").is_err());
    assert!(Message::decode_frame(r#"{"data": "no type"}"#).is_err());
}

#[test]
fn test_encode_frame_shape() {
    let mut msg = Message::new(MessageType::Message, json!("hello"));
    msg.user_id = 77;

    let value: Value = serde_json::from_str(&msg.encode_frame().unwrap()).unwrap();

    assert_eq!(value["type"], "message");
    assert_eq!(value["data"], "hello");
    assert_eq!(value["user_id"], 77);
    assert_eq!(value["id"], msg.id.as_str());
    assert!(value.get("event").is_none());
    assert!(value["timestamp"].is_string());
}
