//! 实时事件信封与客户端控制消息。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 实时事件类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "ticket.created")]
    TicketCreated,
    #[serde(rename = "ticket.called")]
    TicketCalled,
    #[serde(rename = "ticket.completed")]
    TicketCompleted,
    #[serde(rename = "ticket.cancelled")]
    TicketCancelled,
    #[serde(rename = "queue.updated")]
    QueueUpdated,
    #[serde(rename = "check_in")]
    CheckIn,
    #[serde(rename = "led.status")]
    LedStatus,
    #[serde(rename = "wait_time.update")]
    WaitTimeUpdate,
    #[serde(rename = "system.notification")]
    SystemNotification,
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

/// 实时事件信封：`{ type, data, timestamp }`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: Value,
    pub timestamp: String,
}

impl EventEnvelope {
    pub fn new(event_type: EventType, data: Value, timestamp: impl Into<String>) -> Self {
        Self {
            event_type,
            data,
            timestamp: timestamp.into(),
        }
    }
}

/// 服务端对控制消息的应答（connected/pong/subscribed/unsubscribed/error）。
#[derive(Debug, Clone, Serialize)]
pub struct ControlReply {
    #[serde(rename = "type")]
    pub reply_type: &'static str,
    pub data: Value,
    pub timestamp: String,
}

/// 客户端控制消息：`{ type: subscribe|unsubscribe|ping, data: { topics } }`。
#[derive(Debug, Clone, Deserialize)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Option<ClientMessageData>,
}

/// 控制消息数据体。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientMessageData {
    #[serde(default)]
    pub topics: Vec<String>,
}

impl ClientMessage {
    pub fn topics(&self) -> &[String] {
        self.data
            .as_ref()
            .map(|data| data.topics.as_slice())
            .unwrap_or(&[])
    }
}
