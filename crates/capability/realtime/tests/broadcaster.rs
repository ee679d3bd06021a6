use api_contract::{EventEnvelope, EventType};
use reception_bus::{InMemoryBus, Topics};
use reception_realtime::{Broadcaster, ClientHandle, timestamp_now};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

fn topics(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn event(event_type: EventType, data: Value) -> EventEnvelope {
    EventEnvelope::new(event_type, data, timestamp_now())
}

fn drain(handle: &mut ClientHandle) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Ok(text) = handle.receiver.try_recv() {
        messages.push(serde_json::from_str(&text).expect("json"));
    }
    messages
}

#[tokio::test]
async fn welcome_lists_practice_and_topics() {
    let broadcaster = Broadcaster::new(8);
    let mut client = broadcaster
        .connect("practice-1", &topics(&["queue:q1", " ", "wait_times"]))
        .await;

    let messages = drain(&mut client);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], "connected");
    assert_eq!(messages[0]["data"]["practiceId"], "practice-1");
    assert_eq!(
        messages[0]["data"]["subscribedTopics"],
        json!(["queue:q1", "wait_times"])
    );
}

#[tokio::test]
async fn scope_and_topic_delivery_stay_within_practice() {
    let broadcaster = Broadcaster::new(8);
    let mut staff = broadcaster.connect("practice-1", &topics(&["queue:q1"])).await;
    let mut lobby = broadcaster.connect("practice-1", &[]).await;
    let mut other = broadcaster.connect("practice-2", &topics(&["queue:q1"])).await;
    drain(&mut staff);
    drain(&mut lobby);
    drain(&mut other);

    let delivered = broadcaster
        .broadcast_to_scope("practice-1", &event(EventType::CheckIn, json!({ "ticket": "A-001" })))
        .await;
    assert_eq!(delivered, 2);

    let delivered = broadcaster
        .broadcast_to_topic(
            "practice-1",
            "queue:q1",
            &event(EventType::QueueUpdated, json!({ "waiting": 3 })),
        )
        .await;
    assert_eq!(delivered, 1);

    let staff_messages = drain(&mut staff);
    assert_eq!(staff_messages.len(), 2);
    assert_eq!(staff_messages[0]["type"], "check_in");
    assert_eq!(staff_messages[1]["type"], "queue.updated");
    assert_eq!(drain(&mut lobby).len(), 1);
    assert!(drain(&mut other).is_empty());
}

#[tokio::test]
async fn control_messages_answer_on_the_same_connection() {
    let broadcaster = Broadcaster::new(8);
    let mut client = broadcaster.connect("practice-1", &[]).await;
    drain(&mut client);

    broadcaster.handle_client_message(client.id, r#"{"type":"ping"}"#).await;
    broadcaster
        .handle_client_message(
            client.id,
            r#"{"type":"subscribe","data":{"topics":["queue:q1","wait_times"]}}"#,
        )
        .await;
    broadcaster
        .handle_client_message(
            client.id,
            r#"{"type":"unsubscribe","data":{"topics":["wait_times"]}}"#,
        )
        .await;
    broadcaster.handle_client_message(client.id, r#"{"type":"dance"}"#).await;
    broadcaster.handle_client_message(client.id, "not json").await;

    let replies: Vec<String> = drain(&mut client)
        .iter()
        .map(|reply| reply["type"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(replies, vec!["pong", "subscribed", "unsubscribed", "error", "error"]);
    assert_eq!(
        broadcaster.subscriptions(client.id).await.expect("connected"),
        vec!["queue:q1"]
    );
}

#[tokio::test]
async fn disconnect_clears_topic_index() {
    let broadcaster = Broadcaster::new(8);
    let first = broadcaster
        .connect("practice-1", &topics(&["queue:q1", "wait_times"]))
        .await;
    let second = broadcaster.connect("practice-1", &topics(&["queue:q1"])).await;
    assert_eq!(broadcaster.topic_index_len().await, 2);

    broadcaster.unsubscribe(first.id, &topics(&["wait_times"])).await;
    assert_eq!(broadcaster.topic_index_len().await, 1);

    broadcaster.disconnect(first.id).await;
    broadcaster.disconnect(second.id).await;
    assert_eq!(broadcaster.topic_index_len().await, 0);
    assert_eq!(broadcaster.connection_count("practice-1").await, 0);
}

#[tokio::test]
async fn heartbeat_carries_count_and_prunes_dead_clients() {
    let broadcaster = Broadcaster::new(8);
    let mut alive = broadcaster.connect("practice-1", &[]).await;
    let dead = broadcaster.connect("practice-1", &[]).await;
    drop(dead.receiver);
    drain(&mut alive);

    assert_eq!(broadcaster.heartbeat_once().await, 0);
    let beats = drain(&mut alive);
    assert_eq!(beats[0]["type"], "heartbeat");
    assert_eq!(beats[0]["data"]["connections"], 2);

    assert_eq!(broadcaster.heartbeat_once().await, 1);
    assert_eq!(broadcaster.connection_count("practice-1").await, 1);
    let beats = drain(&mut alive);
    assert_eq!(beats[0]["data"]["connections"], 2);
}

#[tokio::test]
async fn slow_client_recovers_when_it_drains_in_time() {
    let broadcaster = Broadcaster::new(1);
    let mut client = broadcaster.connect("practice-1", &[]).await;

    // 欢迎消息占满缓冲
    assert_eq!(broadcaster.heartbeat_once().await, 0);
    drain(&mut client);
    assert_eq!(broadcaster.heartbeat_once().await, 0);
    drain(&mut client);
    assert_eq!(broadcaster.heartbeat_once().await, 0);
    assert_eq!(broadcaster.connection_count("practice-1").await, 1);
}

#[tokio::test(start_paused = true)]
async fn periodic_heartbeat_runs_in_background() {
    let broadcaster = Arc::new(Broadcaster::new(8));
    let mut client = broadcaster.connect("practice-1", &[]).await;
    drain(&mut client);

    let task = broadcaster.clone().run_heartbeat(Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(61)).await;
    task.abort();

    let beats = drain(&mut client);
    assert_eq!(beats.len(), 2);
}

#[tokio::test]
async fn scope_broadcast_is_mirrored_to_bus() {
    let bus = Arc::new(InMemoryBus::new());
    let broadcaster = Broadcaster::new(8).with_bus_mirror(bus.clone(), Topics::default());
    broadcaster
        .broadcast_to_scope("practice-1", &event(EventType::TicketCreated, json!({ "n": 1 })))
        .await;

    let mirrored = bus.published_json("practice/practice-1/events");
    assert_eq!(mirrored.len(), 1);
    assert_eq!(mirrored[0]["type"], "ticket.created");
}
