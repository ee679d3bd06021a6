//! MQTT 总线实现（rumqttc）
//!
//! - 发布等待请求通道空位，超过 `publish_timeout_ms` 仍无空位（断线或积压）时失败并记录日志
//! - 断线后指数退避重连，重连成功（ConnAck）后重新订阅全部 filter
//! - 入站消息按 topic trie 分发，每条消息在独立任务中处理

use crate::trie::{TopicTrie, validate_topic};
use crate::{BusError, BusMessage, CommandBus, MessageHandler, SubscriptionId};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{info, warn};

/// MQTT 总线配置。
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub qos: u8,
    pub reconnect_initial_ms: u64,
    pub reconnect_max_ms: u64,
    /// 发布方与事件循环之间的请求通道容量
    pub request_capacity: usize,
    pub publish_timeout_ms: u64,
}

struct Shared {
    subscriptions: RwLock<TopicTrie<Arc<dyn MessageHandler>>>,
    next_id: AtomicU64,
    connected: AtomicBool,
}

impl Shared {
    fn filters(&self) -> Vec<String> {
        self.subscriptions
            .read()
            .map(|trie| trie.filters())
            .unwrap_or_default()
    }

    fn handlers_for(&self, topic: &str) -> Vec<Arc<dyn MessageHandler>> {
        self.subscriptions
            .read()
            .map(|trie| trie.matches(topic))
            .unwrap_or_default()
    }
}

/// MQTT 命令总线。
#[derive(Clone)]
pub struct MqttCommandBus {
    client: AsyncClient,
    qos: QoS,
    publish_timeout: Duration,
    shared: Arc<Shared>,
}

impl MqttCommandBus {
    /// 建立连接并启动事件循环任务。
    pub fn connect(config: MqttBusConfig) -> (Self, tokio::task::JoinHandle<()>) {
        let client_id = format!("reception-bus-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (config.username.clone(), config.password.clone())
        {
            options.set_credentials(username, password);
        }
        let (client, mut eventloop) = AsyncClient::new(options, config.request_capacity.max(1));
        let qos = qos_from_u8(config.qos);
        let bus = Self::from_client(
            client,
            qos,
            Duration::from_millis(config.publish_timeout_ms.max(1)),
        );

        let loop_client = bus.client.clone();
        let loop_shared = bus.shared.clone();
        let initial = config.reconnect_initial_ms.max(1);
        let max = config.reconnect_max_ms.max(initial);
        let handle = tokio::spawn(async move {
            let mut backoff_ms = initial;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        loop_shared.connected.store(true, Ordering::SeqCst);
                        backoff_ms = initial;
                        let filters = loop_shared.filters();
                        info!(
                            target: "reception.bus",
                            host = %config.host,
                            filters = filters.len(),
                            "bus_connected"
                        );
                        // 请求通道由本循环消费，订阅须在独立任务中等待
                        let client = loop_client.clone();
                        tokio::spawn(async move {
                            for filter in filters {
                                if let Err(err) = client.subscribe(filter.clone(), qos).await {
                                    warn!(
                                        target: "reception.bus",
                                        filter = %filter,
                                        error = %err,
                                        "bus_resubscribe_failed"
                                    );
                                }
                            }
                        });
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let handlers = loop_shared.handlers_for(&publish.topic);
                        if handlers.is_empty() {
                            continue;
                        }
                        let message = BusMessage::new(publish.topic.clone(), publish.payload.to_vec());
                        for handler in handlers {
                            let message = message.clone();
                            tokio::spawn(async move {
                                handler.handle(message).await;
                            });
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        loop_shared.connected.store(false, Ordering::SeqCst);
                        warn!(
                            target: "reception.bus",
                            error = %err,
                            retry_in_ms = backoff_ms,
                            "bus_connection_lost"
                        );
                        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                        backoff_ms = next_backoff(backoff_ms, max);
                    }
                }
            }
        });
        (bus, handle)
    }

    fn from_client(client: AsyncClient, qos: QoS, publish_timeout: Duration) -> Self {
        Self {
            client,
            qos,
            publish_timeout,
            shared: Arc::new(Shared {
                subscriptions: RwLock::new(TopicTrie::new()),
                next_id: AtomicU64::new(1),
                connected: AtomicBool::new(false),
            }),
        }
    }
}

#[async_trait]
impl CommandBus for MqttCommandBus {
    async fn publish(&self, topic: &str, payload: &serde_json::Value) -> Result<(), BusError> {
        validate_topic(topic)?;
        let bytes =
            serde_json::to_vec(payload).map_err(|err| BusError::Payload(err.to_string()))?;
        let outcome = tokio::time::timeout(
            self.publish_timeout,
            self.client.publish(topic, self.qos, false, bytes),
        )
        .await;
        let error = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("request channel full after {:?}", self.publish_timeout),
        };
        reception_telemetry::record_bus_publish_failure();
        warn!(target: "reception.bus", topic = %topic, error = %error, "bus_publish_failed");
        Err(BusError::Unavailable(error))
    }

    async fn subscribe(
        &self,
        filter: &str,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<SubscriptionId, BusError> {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let is_new = {
            let mut trie = self
                .shared
                .subscriptions
                .write()
                .map_err(|_| BusError::Unavailable("lock failed".to_string()))?;
            let is_new = !trie.has_filter(filter);
            trie.insert(filter, id, handler)?;
            is_new
        };
        if is_new {
            // 断线时订阅失败无妨：ConnAck 后会整体重订
            if let Err(err) = self.client.try_subscribe(filter, self.qos) {
                warn!(target: "reception.bus", filter = %filter, error = %err, "bus_subscribe_deferred");
            }
        }
        Ok(id)
    }

    async fn unsubscribe(&self, id: SubscriptionId) -> Result<(), BusError> {
        let orphaned = {
            let mut trie = self
                .shared
                .subscriptions
                .write()
                .map_err(|_| BusError::Unavailable("lock failed".to_string()))?;
            trie.remove(id).filter(|filter| !trie.has_filter(filter))
        };
        if let Some(filter) = orphaned {
            if let Err(err) = self.client.try_unsubscribe(filter.clone()) {
                warn!(target: "reception.bus", filter = %filter, error = %err, "bus_unsubscribe_failed");
            }
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

fn next_backoff(current_ms: u64, max_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(max_ms)
}

fn qos_from_u8(value: u8) -> QoS {
    match value {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}
