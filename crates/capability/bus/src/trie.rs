//! topic 通配匹配树
//!
//! 每个订阅按 filter 的层级插入；匹配时沿 topic 层级下降，
//! 同时走精确子节点、`+` 子节点，并收集 `#` 子节点上的订阅。

use crate::{BusError, SubscriptionId};
use std::collections::HashMap;

struct Node<T> {
    children: HashMap<String, Node<T>>,
    entries: Vec<(SubscriptionId, T)>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            children: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.children.is_empty() && self.entries.is_empty()
    }
}

/// topic 匹配树。
pub struct TopicTrie<T> {
    root: Node<T>,
    filters: HashMap<SubscriptionId, String>,
}

impl<T: Clone> TopicTrie<T> {
    pub fn new() -> Self {
        Self {
            root: Node::new(),
            filters: HashMap::new(),
        }
    }

    pub fn insert(&mut self, filter: &str, id: SubscriptionId, value: T) -> Result<(), BusError> {
        validate_filter(filter)?;
        let mut node = &mut self.root;
        for level in filter.split('/') {
            node = node
                .children
                .entry(level.to_string())
                .or_insert_with(Node::new);
        }
        node.entries.push((id, value));
        self.filters.insert(id, filter.to_string());
        Ok(())
    }

    /// 移除订阅，返回其 filter；空节点一并清理。
    pub fn remove(&mut self, id: SubscriptionId) -> Option<String> {
        let filter = self.filters.remove(&id)?;
        let levels: Vec<&str> = filter.split('/').collect();
        remove_entry(&mut self.root, &levels, id);
        Some(filter)
    }

    /// 返回匹配 topic 的全部订阅值。
    pub fn matches(&self, topic: &str) -> Vec<T> {
        let levels: Vec<&str> = topic.split('/').collect();
        let mut out = Vec::new();
        collect(&self.root, &levels, &mut out);
        out
    }

    /// 当前仍有订阅的 filter（去重）。
    pub fn filters(&self) -> Vec<String> {
        let mut filters: Vec<String> = self.filters.values().cloned().collect();
        filters.sort();
        filters.dedup();
        filters
    }

    pub fn has_filter(&self, filter: &str) -> bool {
        self.filters.values().any(|item| item == filter)
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<T: Clone> Default for TopicTrie<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn collect<T: Clone>(node: &Node<T>, levels: &[&str], out: &mut Vec<T>) {
    // `a/#` 同时匹配 `a` 本身
    if let Some(multi) = node.children.get("#") {
        out.extend(multi.entries.iter().map(|(_, value)| value.clone()));
    }
    let Some((head, rest)) = levels.split_first() else {
        out.extend(node.entries.iter().map(|(_, value)| value.clone()));
        return;
    };
    if let Some(child) = node.children.get(*head) {
        collect(child, rest, out);
    }
    if let Some(single) = node.children.get("+") {
        collect(single, rest, out);
    }
}

fn remove_entry<T>(node: &mut Node<T>, levels: &[&str], id: SubscriptionId) {
    let Some((head, rest)) = levels.split_first() else {
        node.entries.retain(|(entry_id, _)| *entry_id != id);
        return;
    };
    let mut prune = false;
    if let Some(child) = node.children.get_mut(*head) {
        remove_entry(child, rest, id);
        prune = child.is_empty();
    }
    if prune {
        node.children.remove(*head);
    }
}

/// 校验订阅 filter。
pub fn validate_filter(filter: &str) -> Result<(), BusError> {
    if filter.is_empty() {
        return Err(BusError::InvalidFilter("empty filter".to_string()));
    }
    let levels: Vec<&str> = filter.split('/').collect();
    for (idx, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || idx != levels.len() - 1) {
            return Err(BusError::InvalidFilter(format!(
                "'#' must be the last level: {}",
                filter
            )));
        }
        if level.contains('+') && *level != "+" {
            return Err(BusError::InvalidFilter(format!(
                "'+' must occupy a whole level: {}",
                filter
            )));
        }
    }
    Ok(())
}

/// 校验发布 topic：非空且不含通配符。
pub fn validate_topic(topic: &str) -> Result<(), BusError> {
    if topic.is_empty() {
        return Err(BusError::InvalidTopic("empty topic".to_string()));
    }
    if topic.contains(['+', '#']) {
        return Err(BusError::InvalidTopic(format!(
            "wildcards not allowed in topic: {}",
            topic
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut values: Vec<&'static str>) -> Vec<&'static str> {
        values.sort();
        values
    }

    #[test]
    fn wildcard_matching() {
        let mut trie = TopicTrie::new();
        trie.insert("practice/+/nfc/+/scan", 1, "scan").expect("insert");
        trie.insert("practice/p1/#", 2, "p1-all").expect("insert");
        trie.insert("practice/p1/led/c1/command", 3, "exact").expect("insert");
        trie.insert("#", 4, "everything").expect("insert");

        assert_eq!(
            sorted(trie.matches("practice/p1/nfc/r1/scan")),
            vec!["everything", "p1-all", "scan"]
        );
        assert_eq!(
            sorted(trie.matches("practice/p1/led/c1/command")),
            vec!["everything", "exact", "p1-all"]
        );
        assert_eq!(sorted(trie.matches("practice/p1")), vec!["everything", "p1-all"]);
        assert_eq!(trie.matches("practice/p2/led/c1/command"), vec!["everything"]);
        // `+` 不跨层
        assert!(!trie.matches("practice/p2/nfc/r1/x/scan").contains(&"scan"));
    }

    #[test]
    fn remove_prunes_and_tracks_filters() {
        let mut trie = TopicTrie::new();
        trie.insert("a/+/c", 1, 1).expect("insert");
        trie.insert("a/+/c", 2, 2).expect("insert");
        assert_eq!(trie.filters(), vec!["a/+/c".to_string()]);

        assert_eq!(trie.remove(1).as_deref(), Some("a/+/c"));
        assert!(trie.has_filter("a/+/c"));
        assert_eq!(trie.matches("a/b/c"), vec![2]);

        trie.remove(2);
        assert!(trie.is_empty());
        assert!(trie.root.is_empty());
        assert!(trie.remove(2).is_none());
    }

    #[test]
    fn invalid_filters_rejected() {
        assert!(validate_filter("a/#/b").is_err());
        assert!(validate_filter("a/b#").is_err());
        assert!(validate_filter("a/b+/c").is_err());
        assert!(validate_filter("").is_err());
        assert!(validate_filter("a/+/#").is_ok());
        assert!(validate_topic("a/+/c").is_err());
        assert!(validate_topic("a/b/c").is_ok());
    }
}
