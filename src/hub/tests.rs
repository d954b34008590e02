use super::*;
use crate::message::MessageType;
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

fn spawn_hub() -> Hub {
    Hub::spawn(&HubConfig::default())
}

async fn next_message(rx: &mut mpsc::Receiver<Message>) -> Message {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("mailbox closed")
}

async fn connect(hub: &Hub, user_id: u64) -> (Arc<Client>, mpsc::Receiver<Message>) {
    let (client, rx) = Client::new(user_id, hub.clone(), 64);
    hub.register(Arc::clone(&client)).await;
    (client, rx)
}

#[tokio::test]
async fn test_register_and_unregister() {
    let hub = spawn_hub();
    let (client, _rx) = connect(&hub, 1).await;

    assert_eq!(hub.client_count().await, 1);
    assert_eq!(hub.metrics().snapshot().connected_clients, 1);

    hub.unregister(client.id()).await;
    assert_eq!(hub.client_count().await, 0);
    assert!(client.is_closed());
}

#[tokio::test]
async fn test_register_twice_overwrites() {
    let hub = spawn_hub();
    let (client, _rx) = connect(&hub, 1).await;

    hub.register(Arc::clone(&client)).await;
    assert_eq!(hub.client_count().await, 1);
}

#[tokio::test]
async fn test_unregister_unknown_client_is_noop() {
    let hub = spawn_hub();
    let (_client, _rx) = connect(&hub, 1).await;

    hub.unregister("missing").await;
    assert_eq!(hub.client_count().await, 1);
}

#[tokio::test]
async fn test_subscribe_updates_membership_and_acks() {
    let hub = spawn_hub();
    let (client, mut rx) = connect(&hub, 1).await;

    client
        .handle_message(Message::new(MessageType::Subscribe, json!("room-x")))
        .await;

    let ack = next_message(&mut rx).await;
    assert_eq!(ack.msg_type, MessageType::Ack);
    assert_eq!(ack.data, json!({"action": "subscribed", "room": "room-x"}));

    assert!(client.in_room("room-x"));
    assert!(hub.room_members("room-x").await.contains(client.id()));
}

#[tokio::test]
async fn test_unsubscribe_removes_membership_and_acks() {
    let hub = spawn_hub();
    let (client, mut rx) = connect(&hub, 1).await;

    client
        .handle_message(Message::new(MessageType::Subscribe, json!("room-x")))
        .await;
    next_message(&mut rx).await;

    client
        .handle_message(Message::new(MessageType::Unsubscribe, json!("room-x")))
        .await;

    let ack = next_message(&mut rx).await;
    assert_eq!(ack.data, json!({"action": "unsubscribed", "room": "room-x"}));
    assert!(!client.in_room("room-x"));
    assert!(hub.room_members("room-x").await.is_empty());
    // Empty rooms are removed entirely
    assert!(hub.rooms().await.is_empty());
}

#[tokio::test]
async fn test_leave_room_never_joined_still_acks() {
    let hub = spawn_hub();
    let (client, mut rx) = connect(&hub, 1).await;

    hub.request_leave_room(Arc::clone(&client), "nowhere").await;

    let ack = next_message(&mut rx).await;
    assert_eq!(ack.data, json!({"action": "unsubscribed", "room": "nowhere"}));
    assert!(hub.rooms().await.is_empty());
}

#[tokio::test]
async fn test_unregister_removes_client_from_all_rooms() {
    let hub = spawn_hub();
    let (client, mut rx) = connect(&hub, 1).await;
    let (other, _other_rx) = connect(&hub, 2).await;

    for room in ["a", "b", "c"] {
        hub.request_join_room(Arc::clone(&client), room).await;
    }
    hub.request_join_room(Arc::clone(&other), "a").await;
    hub.unregister(client.id()).await;

    // Acks were queued before close; the mailbox then ends
    let mut acks = 0;
    while let Some(msg) = timeout(Duration::from_secs(2), rx.recv()).await.unwrap() {
        assert_eq!(msg.msg_type, MessageType::Ack);
        acks += 1;
    }
    assert_eq!(acks, 3);

    assert!(client.rooms().is_empty());
    assert_eq!(
        hub.rooms().await,
        vec![RoomSummary {
            room: "a".to_string(),
            members: 1
        }]
    );
    assert!(hub.room_members("a").await.contains(other.id()));
}

#[tokio::test]
async fn test_join_after_unregister_is_ignored() {
    let hub = spawn_hub();
    let (client, _rx) = connect(&hub, 1).await;

    hub.unregister(client.id()).await;
    hub.request_join_room(Arc::clone(&client), "late").await;

    assert!(hub.room_members("late").await.is_empty());
    assert!(!client.in_room("late"));
}

#[tokio::test]
async fn test_join_before_register_leaves_no_member_behind() {
    let hub = spawn_hub();
    let (client, mut rx) = Client::new(1, hub.clone(), 8);

    hub.request_join_room(Arc::clone(&client), "ghost").await;
    hub.unregister(client.id()).await;

    assert!(hub.room_members("ghost").await.is_empty());
    assert!(hub.rooms().await.is_empty());
    assert!(!client.in_room("ghost"));
    // No ack for a join that was never applied
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_register_after_unregister_is_ignored() {
    let hub = spawn_hub();
    let (client, _rx) = connect(&hub, 1).await;

    hub.unregister(client.id()).await;
    hub.register(Arc::clone(&client)).await;

    assert_eq!(hub.client_count().await, 0);
}

#[tokio::test]
async fn test_broadcast_reaches_everyone_including_sender() {
    let hub = spawn_hub();
    let (alice, mut alice_rx) = connect(&hub, 77).await;
    let (_bob, mut bob_rx) = connect(&hub, 78).await;

    alice
        .handle_message(Message::new(MessageType::Message, json!("hello")))
        .await;

    let to_alice = next_message(&mut alice_rx).await;
    let to_bob = next_message(&mut bob_rx).await;

    assert_eq!(to_alice.msg_type, MessageType::Message);
    assert_eq!(to_alice.user_id, 77);
    assert_eq!(to_alice.id, to_bob.id);
    assert_eq!(to_bob.data, json!("hello"));
    assert_eq!(hub.metrics().snapshot().messages_published, 1);
}

#[tokio::test]
async fn test_server_publish_notification() {
    let hub = spawn_hub();
    let (_client, mut rx) = connect(&hub, 1).await;

    hub.publish(Message::notification("Deploy", "v2 is live")).await;

    let msg = next_message(&mut rx).await;
    assert_eq!(msg.msg_type, MessageType::Notification);
    assert_eq!(msg.user_id, 0);
    assert_eq!(msg.data, json!({"title": "Deploy", "body": "v2 is live"}));
}

#[tokio::test]
async fn test_stalled_client_does_not_block_others() {
    let hub = spawn_hub();

    // Never drained, capacity 1
    let (stalled, _stalled_rx) = Client::new(1, hub.clone(), 1);
    hub.register(Arc::clone(&stalled)).await;
    let (_healthy, mut healthy_rx) = connect(&hub, 2).await;

    for i in 0..20 {
        hub.publish(Message::new(MessageType::Message, json!(i))).await;
    }

    for i in 0..20 {
        let msg = next_message(&mut healthy_rx).await;
        assert_eq!(msg.data, json!(i));
    }
    // Queries are applied after every earlier broadcast has finished
    hub.client_count().await;
    assert_eq!(hub.metrics().snapshot().messages_dropped, 19);
}

#[tokio::test]
async fn test_requests_from_one_producer_apply_in_order() {
    let hub = spawn_hub();
    let (client, _rx) = connect(&hub, 1).await;

    // Leave then join travel through different mailboxes
    hub.request_join_room(Arc::clone(&client), "r").await;
    hub.request_leave_room(Arc::clone(&client), "r").await;
    hub.request_join_room(Arc::clone(&client), "r").await;

    assert!(hub.room_members("r").await.contains(client.id()));
}

#[tokio::test]
async fn test_rooms_summary_sorted() {
    let hub = spawn_hub();
    let (a, _a_rx) = connect(&hub, 1).await;
    let (b, _b_rx) = connect(&hub, 2).await;

    hub.request_join_room(Arc::clone(&a), "zeta").await;
    hub.request_join_room(Arc::clone(&a), "alpha").await;
    hub.request_join_room(Arc::clone(&b), "alpha").await;

    let rooms = hub.rooms().await;
    assert_eq!(rooms.len(), 2);
    assert_eq!(rooms[0].room, "alpha");
    assert_eq!(rooms[0].members, 2);
    assert_eq!(rooms[1].room, "zeta");
    assert_eq!(hub.metrics().snapshot().rooms, 2);
}

#[tokio::test]
async fn test_queries_return_defaults_when_dispatcher_gone() {
    let (hub, dispatcher) = Hub::new(&HubConfig::default());
    drop(dispatcher);

    assert_eq!(hub.client_count().await, 0);
    assert!(hub.rooms().await.is_empty());
    // Must not panic
    hub.publish(Message::pong()).await;
}
