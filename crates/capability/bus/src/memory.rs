//! 进程内总线：未接入 broker 时使用，也用于测试。

use crate::trie::{TopicTrie, validate_topic};
use crate::{BusError, BusMessage, CommandBus, MessageHandler, SubscriptionId};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::warn;

/// 内存总线：记录全部已发布消息，并同步投递给匹配的订阅者。
pub struct InMemoryBus {
    subscriptions: RwLock<TopicTrie<Arc<dyn MessageHandler>>>,
    published: Mutex<Vec<BusMessage>>,
    next_id: AtomicU64,
    available: AtomicBool,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(TopicTrie::new()),
            published: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// 模拟 broker 不可达。
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 已发布消息快照。
    pub fn published(&self) -> Vec<BusMessage> {
        self.published
            .lock()
            .map(|items| items.clone())
            .unwrap_or_default()
    }

    /// 指定 topic 上的已发布消息（JSON）。
    pub fn published_json(&self, topic: &str) -> Vec<serde_json::Value> {
        self.published()
            .into_iter()
            .filter(|message| message.topic == topic)
            .filter_map(|message| message.json().ok())
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut items) = self.published.lock() {
            items.clear();
        }
    }

    /// 直接注入一条消息（模拟设备上报）。
    pub async fn inject(&self, topic: &str, payload: &serde_json::Value) -> Result<(), BusError> {
        let bytes =
            serde_json::to_vec(payload).map_err(|err| BusError::Payload(err.to_string()))?;
        self.deliver(BusMessage::new(topic, bytes)).await
    }

    async fn deliver(&self, message: BusMessage) -> Result<(), BusError> {
        let handlers = self
            .subscriptions
            .read()
            .map_err(|_| BusError::Unavailable("lock failed".to_string()))?
            .matches(&message.topic);
        for handler in handlers {
            handler.handle(message.clone()).await;
        }
        Ok(())
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandBus for InMemoryBus {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), BusError> {
        validate_topic(topic)?;
        if !self.available.load(Ordering::SeqCst) {
            reception_telemetry::record_bus_publish_failure();
            warn!(target: "reception.bus", topic = %topic, "bus_publish_failed");
            return Err(BusError::Unavailable("bus offline".to_string()));
        }
        let bytes =
            serde_json::to_vec(payload).map_err(|err| BusError::Payload(err.to_string()))?;
        let message = BusMessage::new(topic, bytes);
        self.published
            .lock()
            .map_err(|_| BusError::Unavailable("lock failed".to_string()))?
            .push(message.clone());
        self.deliver(message).await
    }

    async fn subscribe(
        &self,
        filter: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionId, BusError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscriptions
            .write()
            .map_err(|_| BusError::Unavailable("lock failed".to_string()))?
            .insert(filter, id, handler)?;
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        self.subscriptions
            .write()
            .map_err(|_| BusError::Unavailable("lock failed".to_string()))?
            .remove(id);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
