use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

pub type ConnectionId = u64;

pub(crate) struct Connection {
    pub scope: String,
    pub topics: HashSet<String>,
    pub sender: mpsc::Sender<String>,
    pub missed_heartbeats: u32,
}

/// 连接表 + 作用域索引 + 主题索引，三者只在同一把锁内一起修改。
#[derive(Default)]
pub(crate) struct Registry {
    pub connections: HashMap<ConnectionId, Connection>,
    by_scope: HashMap<String, HashSet<ConnectionId>>,
    by_topic: HashMap<(String, String), HashSet<ConnectionId>>,
}

impl Registry {
    pub fn insert(&mut self, id: ConnectionId, connection: Connection) {
        self.by_scope
            .entry(connection.scope.clone())
            .or_default()
            .insert(id);
        for topic in &connection.topics {
            self.by_topic
                .entry((connection.scope.clone(), topic.clone()))
                .or_default()
                .insert(id);
        }
        self.connections.insert(id, connection);
    }

    /// 从全部索引中移除连接，空集合一并删除。
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        if let Some(ids) = self.by_scope.get_mut(&connection.scope) {
            ids.remove(&id);
            if ids.is_empty() {
                self.by_scope.remove(&connection.scope);
            }
        }
        for topic in &connection.topics {
            detach(&mut self.by_topic, &connection.scope, topic, id);
        }
        Some(connection)
    }

    /// 返回新增的主题。
    pub fn subscribe(&mut self, id: ConnectionId, topics: &[String]) -> Vec<String> {
        let Some(connection) = self.connections.get_mut(&id) else {
            return Vec::new();
        };
        let mut added = Vec::new();
        for topic in topics {
            if connection.topics.insert(topic.clone()) {
                self.by_topic
                    .entry((connection.scope.clone(), topic.clone()))
                    .or_default()
                    .insert(id);
                added.push(topic.clone());
            }
        }
        added
    }

    pub fn unsubscribe(&mut self, id: ConnectionId, topics: &[String]) -> Vec<String> {
        let Some(connection) = self.connections.get_mut(&id) else {
            return Vec::new();
        };
        let mut removed = Vec::new();
        for topic in topics {
            if connection.topics.remove(topic) {
                detach(&mut self.by_topic, &connection.scope, topic, id);
                removed.push(topic.clone());
            }
        }
        removed
    }

    pub fn scope_members(&self, scope: &str) -> Vec<ConnectionId> {
        self.by_scope
            .get(scope)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn topic_members(&self, scope: &str, topic: &str) -> Vec<ConnectionId> {
        self.by_topic
            .get(&(scope.to_string(), topic.to_string()))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn scope_count(&self, scope: &str) -> usize {
        self.by_scope.get(scope).map(HashSet::len).unwrap_or(0)
    }

    pub fn topic_index_len(&self) -> usize {
        self.by_topic.len()
    }
}

fn detach(
    index: &mut HashMap<(String, String), HashSet<ConnectionId>>,
    scope: &str,
    topic: &str,
    id: ConnectionId,
) {
    let key = (scope.to_string(), topic.to_string());
    if let Some(ids) = index.get_mut(&key) {
        ids.remove(&id);
        if ids.is_empty() {
            index.remove(&key);
        }
    }
}
