//! 追踪、请求 ID 与基础指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub check_ins: u64,
    pub check_in_success: u64,
    pub check_in_failure: u64,
    pub tickets_issued: u64,
    pub tickets_resumed: u64,
    pub device_auth_failures: u64,
    pub route_activations: u64,
    pub segment_dispatch_failures: u64,
    pub bus_publish_failures: u64,
    pub broadcast_deliveries: u64,
    pub connections_pruned: u64,
    pub post_action_failures: u64,
    pub check_in_latency_ms_total: u64,
    pub check_in_latency_ms_count: u64,
}

/// 基础指标。
pub struct TelemetryMetrics {
    check_ins: AtomicU64,
    check_in_success: AtomicU64,
    check_in_failure: AtomicU64,
    tickets_issued: AtomicU64,
    tickets_resumed: AtomicU64,
    device_auth_failures: AtomicU64,
    route_activations: AtomicU64,
    segment_dispatch_failures: AtomicU64,
    bus_publish_failures: AtomicU64,
    broadcast_deliveries: AtomicU64,
    connections_pruned: AtomicU64,
    post_action_failures: AtomicU64,
    check_in_latency_ms_total: AtomicU64,
    check_in_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            check_ins: AtomicU64::new(0),
            check_in_success: AtomicU64::new(0),
            check_in_failure: AtomicU64::new(0),
            tickets_issued: AtomicU64::new(0),
            tickets_resumed: AtomicU64::new(0),
            device_auth_failures: AtomicU64::new(0),
            route_activations: AtomicU64::new(0),
            segment_dispatch_failures: AtomicU64::new(0),
            bus_publish_failures: AtomicU64::new(0),
            broadcast_deliveries: AtomicU64::new(0),
            connections_pruned: AtomicU64::new(0),
            post_action_failures: AtomicU64::new(0),
            check_in_latency_ms_total: AtomicU64::new(0),
            check_in_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            check_ins: self.check_ins.load(Ordering::Relaxed),
            check_in_success: self.check_in_success.load(Ordering::Relaxed),
            check_in_failure: self.check_in_failure.load(Ordering::Relaxed),
            tickets_issued: self.tickets_issued.load(Ordering::Relaxed),
            tickets_resumed: self.tickets_resumed.load(Ordering::Relaxed),
            device_auth_failures: self.device_auth_failures.load(Ordering::Relaxed),
            route_activations: self.route_activations.load(Ordering::Relaxed),
            segment_dispatch_failures: self.segment_dispatch_failures.load(Ordering::Relaxed),
            bus_publish_failures: self.bus_publish_failures.load(Ordering::Relaxed),
            broadcast_deliveries: self.broadcast_deliveries.load(Ordering::Relaxed),
            connections_pruned: self.connections_pruned.load(Ordering::Relaxed),
            post_action_failures: self.post_action_failures.load(Ordering::Relaxed),
            check_in_latency_ms_total: self.check_in_latency_ms_total.load(Ordering::Relaxed),
            check_in_latency_ms_count: self.check_in_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录一次签到结果。
pub fn record_check_in(success: bool) {
    let metrics = metrics();
    metrics.check_ins.fetch_add(1, Ordering::Relaxed);
    if success {
        metrics.check_in_success.fetch_add(1, Ordering::Relaxed);
    } else {
        metrics.check_in_failure.fetch_add(1, Ordering::Relaxed);
    }
}

/// 记录签到端到端耗时（毫秒）。
pub fn record_check_in_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .check_in_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .check_in_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录新票据签发。
pub fn record_ticket_issued() {
    metrics().tickets_issued.fetch_add(1, Ordering::Relaxed);
}

/// 记录幂等返回已有票据。
pub fn record_ticket_resumed() {
    metrics().tickets_resumed.fetch_add(1, Ordering::Relaxed);
}

/// 记录设备认证失败。
pub fn record_device_auth_failure() {
    metrics().device_auth_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录路线点亮。
pub fn record_route_activation() {
    metrics().route_activations.fetch_add(1, Ordering::Relaxed);
}

/// 记录单个灯段下发失败。
pub fn record_segment_dispatch_failure() {
    metrics()
        .segment_dispatch_failures
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录总线发布失败。
pub fn record_bus_publish_failure() {
    metrics().bus_publish_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录实时消息投递数。
pub fn record_broadcast_deliveries(count: u64) {
    metrics()
        .broadcast_deliveries
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录被心跳剔除的连接。
pub fn record_connection_pruned() {
    metrics().connections_pruned.fetch_add(1, Ordering::Relaxed);
}

/// 记录签到后置动作失败。
pub fn record_post_action_failure() {
    metrics().post_action_failures.fetch_add(1, Ordering::Relaxed);
}
