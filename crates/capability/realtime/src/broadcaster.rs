use crate::registry::{Connection, ConnectionId, Registry};
use crate::timestamp_now;
use api_contract::{ClientMessage, ControlReply, EventEnvelope, EventType};
use reception_bus::{CommandBus, Topics};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 连续心跳投递失败达到该次数即剔除连接。
pub const HEARTBEAT_MISS_LIMIT: u32 = 2;

/// 一个已注册连接：ID + 出站消息接收端（已序列化的 JSON 文本）。
pub struct ClientHandle {
    pub id: ConnectionId,
    pub receiver: mpsc::Receiver<String>,
}

/// 实时事件广播器。
pub struct Broadcaster {
    registry: RwLock<Registry>,
    next_id: AtomicU64,
    buffer: usize,
    mirror: Option<(Arc<dyn CommandBus>, Topics)>,
}

impl Broadcaster {
    /// `buffer`：每个连接的出站缓冲条数。
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            mirror: None,
        }
    }

    /// 作用域广播同时镜像到 `{root}/{practice}/events`。
    pub fn with_bus_mirror(mut self, bus: Arc<dyn CommandBus>, topics: Topics) -> Self {
        self.mirror = Some((bus, topics));
        self
    }

    /// 注册连接并发送欢迎消息。
    pub async fn connect(&self, scope: &str, topics: &[String]) -> ClientHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(self.buffer);
        let topics: HashSet<String> = clean_topics(topics).into_iter().collect();
        let mut subscribed: Vec<String> = topics.iter().cloned().collect();
        subscribed.sort();

        let welcome = reply(
            "connected",
            json!({
                "practiceId": scope,
                "subscribedTopics": subscribed,
                "serverTime": timestamp_now(),
            }),
        );
        let _ = sender.try_send(welcome);

        let mut registry = self.registry.write().await;
        registry.insert(
            id,
            Connection {
                scope: scope.to_string(),
                topics,
                sender,
                missed_heartbeats: 0,
            },
        );
        info!(
            target: "reception.realtime",
            connection_id = id,
            practice_id = %scope,
            connections = registry.scope_count(scope),
            "client_connected"
        );
        ClientHandle { id, receiver }
    }

    /// 追加订阅，返回新增的主题。
    pub async fn subscribe(&self, id: ConnectionId, topics: &[String]) -> Vec<String> {
        let topics = clean_topics(topics);
        self.registry.write().await.subscribe(id, &topics)
    }

    pub async fn unsubscribe(&self, id: ConnectionId, topics: &[String]) -> Vec<String> {
        self.registry.write().await.unsubscribe(id, topics)
    }

    /// 注销连接（作用域与主题索引同时清理）。
    pub async fn disconnect(&self, id: ConnectionId) {
        let removed = self.registry.write().await.remove(id);
        if let Some(connection) = removed {
            info!(
                target: "reception.realtime",
                connection_id = id,
                practice_id = %connection.scope,
                "client_disconnected"
            );
        }
    }

    /// 向作用域内全部连接广播，返回成功投递数。
    pub async fn broadcast_to_scope(&self, scope: &str, event: &EventEnvelope) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };
        let delivered = {
            let registry = self.registry.read().await;
            deliver(&registry, &registry.scope_members(scope), &text)
        };
        reception_telemetry::record_broadcast_deliveries(delivered as u64);
        debug!(
            target: "reception.realtime",
            practice_id = %scope,
            delivered,
            "scope_broadcast"
        );
        self.mirror(scope, event).await;
        delivered
    }

    /// 向作用域内订阅了主题的连接广播。
    pub async fn broadcast_to_topic(&self, scope: &str, topic: &str, event: &EventEnvelope) -> usize {
        let Some(text) = encode(event) else {
            return 0;
        };
        let delivered = {
            let registry = self.registry.read().await;
            deliver(&registry, &registry.topic_members(scope, topic), &text)
        };
        reception_telemetry::record_broadcast_deliveries(delivered as u64);
        debug!(
            target: "reception.realtime",
            practice_id = %scope,
            topic = %topic,
            delivered,
            "topic_broadcast"
        );
        delivered
    }

    pub async fn connection_count(&self, scope: &str) -> usize {
        self.registry.read().await.scope_count(scope)
    }

    pub async fn total_connections(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// 连接当前订阅的主题（已排序）。
    pub async fn subscriptions(&self, id: ConnectionId) -> Option<Vec<String>> {
        let registry = self.registry.read().await;
        let connection = registry.connections.get(&id)?;
        let mut topics: Vec<String> = connection.topics.iter().cloned().collect();
        topics.sort();
        Some(topics)
    }

    /// 主题索引中的 `(作用域, 主题)` 条目数。
    pub async fn topic_index_len(&self) -> usize {
        self.registry.read().await.topic_index_len()
    }

    /// 处理客户端控制消息，应答写回该连接。
    pub async fn handle_client_message(&self, id: ConnectionId, text: &str) {
        let answer = match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => match message.kind.as_str() {
                "ping" => reply("pong", json!({})),
                "subscribe" if !message.topics().is_empty() => {
                    let added = self.subscribe(id, message.topics()).await;
                    let topics = self.subscriptions(id).await.unwrap_or_default();
                    reply("subscribed", json!({ "topics": topics, "added": added }))
                }
                "unsubscribe" if !message.topics().is_empty() => {
                    let removed = self.unsubscribe(id, message.topics()).await;
                    let topics = self.subscriptions(id).await.unwrap_or_default();
                    reply("unsubscribed", json!({ "topics": topics, "removed": removed }))
                }
                "subscribe" | "unsubscribe" => {
                    reply("error", json!({ "message": "topics required" }))
                }
                other => reply(
                    "error",
                    json!({ "message": format!("unknown message type: {}", other) }),
                ),
            },
            Err(_) => reply("error", json!({ "message": "invalid message" })),
        };
        let registry = self.registry.read().await;
        if let Some(connection) = registry.connections.get(&id) {
            let _ = connection.sender.try_send(answer);
        }
    }

    /// 执行一轮心跳：向每个连接发送所在作用域的连接数。
    ///
    /// 投递成功清零失败计数；连续失败达到上限的连接被剔除。返回剔除数。
    pub async fn heartbeat_once(&self) -> usize {
        let mut registry = self.registry.write().await;
        let mut stale = Vec::new();
        let ids: Vec<ConnectionId> = registry.connections.keys().copied().collect();
        for id in ids {
            let Some(scope) = registry.connections.get(&id).map(|c| c.scope.clone()) else {
                continue;
            };
            let count = registry.scope_count(&scope);
            let event = EventEnvelope::new(
                EventType::Heartbeat,
                json!({ "connections": count }),
                timestamp_now(),
            );
            let Some(text) = encode(&event) else {
                continue;
            };
            let Some(connection) = registry.connections.get_mut(&id) else {
                continue;
            };
            if connection.sender.try_send(text).is_ok() {
                connection.missed_heartbeats = 0;
            } else {
                connection.missed_heartbeats += 1;
                if connection.missed_heartbeats >= HEARTBEAT_MISS_LIMIT {
                    stale.push(id);
                }
            }
        }
        for id in &stale {
            if let Some(connection) = registry.remove(*id) {
                reception_telemetry::record_connection_pruned();
                warn!(
                    target: "reception.realtime",
                    connection_id = *id,
                    practice_id = %connection.scope,
                    "connection_pruned"
                );
            }
        }
        stale.len()
    }

    /// 周期心跳任务。
    pub fn run_heartbeat(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // 第一次 tick 立即返回
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.heartbeat_once().await;
            }
        })
    }

    async fn mirror(&self, scope: &str, event: &EventEnvelope) {
        let Some((bus, topics)) = &self.mirror else {
            return;
        };
        let Ok(payload) = serde_json::to_value(event) else {
            return;
        };
        if let Err(err) = bus.publish(&topics.events(scope), &payload).await {
            warn!(
                target: "reception.realtime",
                practice_id = %scope,
                error = %err,
                "event_mirror_failed"
            );
        }
    }
}

fn deliver(registry: &Registry, ids: &[ConnectionId], text: &str) -> usize {
    ids.iter()
        .filter_map(|id| registry.connections.get(id))
        .filter(|connection| connection.sender.try_send(text.to_string()).is_ok())
        .count()
}

fn encode(event: &EventEnvelope) -> Option<String> {
    serde_json::to_string(event).ok()
}

fn reply(reply_type: &'static str, data: Value) -> String {
    let reply = ControlReply {
        reply_type,
        data,
        timestamp: timestamp_now(),
    };
    serde_json::to_string(&reply).unwrap_or_default()
}

fn clean_topics(topics: &[String]) -> Vec<String> {
    topics
        .iter()
        .map(|topic| topic.trim())
        .filter(|topic| !topic.is_empty())
        .map(str::to_string)
        .collect()
}
