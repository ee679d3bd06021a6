//! 实时事件广播
//!
//! 连接注册表由 `Broadcaster` 实例私有持有，通过依赖注入传递。
//! 每个连接挂在一个诊所作用域下，并可订阅零到多个主题；主题索引按
//! `(作用域, 主题)` 建立，主题名不会跨诊所泄漏。

mod broadcaster;
mod registry;

pub use broadcaster::{Broadcaster, ClientHandle, HEARTBEAT_MISS_LIMIT};
pub use registry::ConnectionId;

use chrono::{SecondsFormat, Utc};

/// 事件时间戳（RFC3339，UTC）。
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
