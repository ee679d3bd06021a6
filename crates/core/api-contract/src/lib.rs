//! 稳定的 DTO 与 API 响应契约。

mod events;

pub use events::{ClientMessage, ClientMessageData, ControlReply, EventEnvelope, EventType};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 标准 API 响应封装。
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

/// 失败响应的错误体。
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// 设备签到请求体（读卡器 → 服务）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    #[serde(alias = "raw_identifier", alias = "uid", alias = "nfcUid")]
    pub raw_identifier: String,
    #[serde(alias = "device_id")]
    pub device_id: String,
    #[serde(alias = "device_secret")]
    pub device_secret: String,
    #[serde(default)]
    pub method: Option<String>,
}

/// 设备签到响应体。
///
/// 从不回显原始卡号；患者只显示名。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_wait_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_first_name: Option<String>,
    pub message: String,
}

/// 设备心跳请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(alias = "device_serial")]
    pub device_serial: String,
    #[serde(alias = "device_secret")]
    pub device_secret: String,
    #[serde(default, alias = "firmware_version")]
    pub firmware_version: Option<String>,
    #[serde(default, alias = "uptime_seconds")]
    pub uptime_seconds: Option<u64>,
}

/// 设备心跳响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub success: bool,
    pub server_time: String,
    pub pending_commands: Vec<Value>,
}

/// 设备注册请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub category: String,
    pub serial: String,
    pub name: String,
    pub address: Option<String>,
    pub zone_id: Option<String>,
}

/// 设备注册响应体（密钥仅此一次返回）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceResponse {
    pub device: DeviceDto,
    pub device_secret: String,
}

/// 设备密钥轮换响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateSecretResponse {
    pub device_id: String,
    pub device_secret: String,
}

/// 设备更新请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDeviceRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub zone_id: Option<String>,
    pub status: Option<String>,
}

/// 设备 DTO（不含密钥摘要）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    pub device_id: String,
    pub practice_id: String,
    pub category: String,
    pub serial: String,
    pub name: String,
    pub address: Option<String>,
    pub status: String,
    pub zone_id: Option<String>,
    pub firmware_version: Option<String>,
    pub is_active: bool,
    pub last_seen_at_ms: Option<i64>,
}

/// 待下发设备命令（心跳拉取）。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueCommandRequest {
    pub payload: Value,
}

/// 待下发命令入队结果。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueCommandResponse {
    pub command_id: String,
    pub device_id: String,
    pub created_at_ms: i64,
}

/// 凭证签发请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueCredentialRequest {
    pub patient_id: String,
    #[serde(alias = "uid")]
    pub raw_identifier: String,
    #[serde(default = "default_card_type")]
    pub card_type: String,
    pub label: Option<String>,
    pub expires_at_ms: Option<i64>,
}

fn default_card_type() -> String {
    "custom".to_string()
}

/// 凭证 DTO（标识已脱敏）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDto {
    pub token_id: String,
    pub patient_id: String,
    pub card_type: String,
    pub label: Option<String>,
    pub masked_identifier: String,
    pub expires_at_ms: Option<i64>,
    pub is_active: bool,
    pub issued_at_ms: i64,
    pub last_used_at_ms: Option<i64>,
}

/// 凭证吊销响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeCredentialResponse {
    pub token_id: String,
    pub revoked: bool,
}

/// 票据 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketDto {
    pub ticket_id: String,
    pub queue_id: String,
    pub number: String,
    pub status: String,
    pub priority: String,
    pub estimated_wait_minutes: u32,
    pub created_at_ms: i64,
    pub called_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
}

/// 票据查询参数。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuery {
    pub status: Option<String>,
}

/// 票据状态变更请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionTicketRequest {
    pub status: String,
}

/// 队列统计 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatsDto {
    pub queue_id: String,
    pub queue_name: String,
    pub waiting_count: u32,
    pub called_count: u32,
    pub in_progress_count: u32,
    pub completed_today: u32,
    pub current_number: i64,
    pub estimated_wait_minutes: u32,
}

/// 公共队列概览条目。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummaryItemDto {
    pub queue_id: String,
    pub name: String,
    pub code: String,
    pub waiting_count: u32,
    pub now_serving: Option<String>,
}

/// 公共队列概览（候诊屏使用，不含个人信息）。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummaryDto {
    pub practice_id: String,
    pub now_serving: Option<String>,
    pub queues: Vec<QueueSummaryItemDto>,
}

/// 签到审计记录 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckInEventDto {
    pub event_id: String,
    pub device_id: Option<String>,
    pub credential_id: Option<String>,
    pub ticket_id: Option<String>,
    pub method: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub route_id: Option<String>,
    pub checked_in_at_ms: i64,
}

/// 列表数量限制查询参数。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// 路线点亮结果 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteActivationDto {
    pub route_id: String,
    pub lit_segments: usize,
    pub failed_segments: usize,
    pub partial: bool,
    pub expires_at_ms: i64,
}

/// 路线熄灭结果 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDeactivationDto {
    pub route_id: String,
    pub segments_off: usize,
}

/// LED 直接控制请求体。
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedCommandRequest {
    pub controller_id: String,
    pub segment_index: u8,
    pub color: String,
    pub brightness: Option<u8>,
    pub pattern: Option<String>,
}

/// LED 直接控制响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedCommandResponse {
    pub controller_id: String,
    pub segment_index: u8,
    pub success: bool,
}

/// 全部熄灭响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedOffResponse {
    pub segments_off: usize,
}

/// 区域等待时间 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitTimeZoneDto {
    pub zone_id: String,
    pub zone_name: String,
    pub patient_count: u32,
    pub average_wait_minutes: f64,
    pub max_wait_minutes: u32,
    pub status: String,
    pub color: String,
}

/// 等待时间概览 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitTimeOverviewDto {
    pub zones: Vec<WaitTimeZoneDto>,
    pub total_waiting: u32,
    pub average_wait_minutes: f64,
    pub updated_at_ms: i64,
}

/// 指标快照 DTO。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDto {
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
}
