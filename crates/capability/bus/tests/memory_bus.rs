use async_trait::async_trait;
use reception_bus::{BusError, BusMessage, CommandBus, InMemoryBus, MessageHandler, Topics};
use serde_json::json;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Recorder {
    topics: Mutex<Vec<String>>,
}

impl Recorder {
    fn topics(&self) -> Vec<String> {
        self.topics.lock().expect("lock").clone()
    }
}

#[async_trait]
impl MessageHandler for Recorder {
    async fn handle(&self, message: BusMessage) {
        self.topics.lock().expect("lock").push(message.topic);
    }
}

#[tokio::test]
async fn wildcard_subscribers_receive_matching_messages() {
    let bus = InMemoryBus::new();
    let topics = Topics::default();
    let scans = Arc::new(Recorder::default());
    let practice = Arc::new(Recorder::default());
    bus.subscribe(&topics.scan_filter(), scans.clone())
        .await
        .expect("subscribe");
    bus.subscribe("practice/p1/#", practice.clone())
        .await
        .expect("subscribe");

    bus.publish("practice/p1/nfc/r1/scan", &json!({ "rawIdentifier": "x" }))
        .await
        .expect("publish");
    bus.publish("practice/p2/nfc/r9/scan", &json!({}))
        .await
        .expect("publish");
    bus.publish(&topics.led_command("p1", "c1"), &json!({ "seg": [] }))
        .await
        .expect("publish");

    assert_eq!(
        scans.topics(),
        vec!["practice/p1/nfc/r1/scan", "practice/p2/nfc/r9/scan"]
    );
    assert_eq!(
        practice.topics(),
        vec!["practice/p1/nfc/r1/scan", "practice/p1/led/c1/command"]
    );
    assert_eq!(bus.published().len(), 3);
}

#[tokio::test]
async fn unsubscribe_stops_delivery() {
    let bus = InMemoryBus::new();
    let recorder = Arc::new(Recorder::default());
    let id = bus
        .subscribe("practice/+/events", recorder.clone())
        .await
        .expect("subscribe");
    bus.publish("practice/p1/events", &json!({})).await.expect("publish");
    bus.unsubscribe(id).await.expect("unsubscribe");
    bus.publish("practice/p1/events", &json!({})).await.expect("publish");
    assert_eq!(recorder.topics().len(), 1);
}

#[tokio::test]
async fn unavailable_bus_fails_publish() {
    let bus = InMemoryBus::new();
    bus.set_available(false);
    assert!(!bus.is_connected());
    let err = bus
        .publish("practice/p1/events", &json!({}))
        .await
        .expect_err("offline");
    assert!(matches!(err, BusError::Unavailable(_)));
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn invalid_topics_and_filters_rejected() {
    let bus = InMemoryBus::new();
    let recorder = Arc::new(Recorder::default());
    assert!(matches!(
        bus.subscribe("practice/#/scan", recorder).await,
        Err(BusError::InvalidFilter(_))
    ));
    assert!(matches!(
        bus.publish("practice/+/events", &json!({})).await,
        Err(BusError::InvalidTopic(_))
    ));
}
