//! 设备命令总线：面向嵌入式控制器的分层 topic 发布/订阅。
//!
//! topic 命名空间：`{root}/{practice_id}/{category}/{device_id}/{action}`。
//! 订阅端支持 `+`（单层）与 `#`（多层，必须位于末层）通配。
//! 总线不承载业务规则。

mod memory;
mod mqtt;
mod topics;
mod trie;

pub use memory::InMemoryBus;
pub use mqtt::{MqttBusConfig, MqttCommandBus};
pub use topics::{DeviceTopic, Topics};
pub use trie::{TopicTrie, validate_filter, validate_topic};

use async_trait::async_trait;
use std::sync::Arc;

/// 订阅句柄。
pub type SubscriptionId = u64;

/// 总线消息。
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    pub fn json(&self) -> Result<serde_json::Value, BusError> {
        serde_json::from_slice(&self.payload).map_err(|err| BusError::Payload(err.to_string()))
    }
}

/// 总线错误。
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("invalid topic: {0}")]
    InvalidTopic(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("bus unavailable: {0}")]
    Unavailable(String),
    #[error("payload error: {0}")]
    Payload(String),
}

/// 订阅回调。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: BusMessage);
}

/// 命令总线抽象。
///
/// 发布为即发即弃：失败会记录日志并返回 `Unavailable`，调用方自行决定是否忽略。
#[async_trait]
pub trait CommandBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), BusError>;

    async fn subscribe(
        &self,
        filter: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionId, BusError>;

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError>;

    fn is_connected(&self) -> bool;
}
