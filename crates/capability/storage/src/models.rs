//! 数据模型
//!
//! - 诊所与患者：PracticeRecord, PatientRecord（外部协作方提供）
//! - 设备：DeviceRecord, DeviceUpdate, PendingCommandRecord
//! - 空间布局：ZoneRecord, SegmentRecord, RouteRecord
//! - 凭证：CredentialRecord
//! - 队列与票据：QueueRecord, TicketRecord
//! - 审计：CheckInEventRecord, WaitTimeLogRecord
//!
//! 时间字段统一为 UTC epoch 毫秒。

use domain::{
    CheckInMethod, CredentialType, DeviceCategory, DeviceStatus, LedPattern, SegmentRole,
    TicketPriority, TicketStatus, ZoneType,
};

/// 诊所记录。
#[derive(Debug, Clone)]
pub struct PracticeRecord {
    pub practice_id: String,
    pub name: String,
    /// 诊所本地时间相对 UTC 的固定偏移（分钟），用于日界计算。
    pub utc_offset_minutes: Option<i32>,
    pub is_active: bool,
}

/// 患者身份（仅签到所需字段）。
#[derive(Debug, Clone)]
pub struct PatientRecord {
    pub patient_id: String,
    pub practice_id: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

/// 设备记录。
///
/// `secret_hash` 为 argon2 PHC 字符串，明文密钥从不落库。
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub device_id: String,
    pub practice_id: String,
    pub category: DeviceCategory,
    pub serial: String,
    pub name: String,
    pub secret_hash: String,
    pub address: Option<String>,
    pub status: DeviceStatus,
    pub zone_id: Option<String>,
    pub firmware_version: Option<String>,
    pub uptime_seconds: Option<u64>,
    pub is_active: bool,
    pub last_seen_at_ms: Option<i64>,
    pub created_at_ms: i64,
}

/// 设备更新输入（None 表示不修改）。
#[derive(Debug, Clone, Default)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub zone_id: Option<String>,
    pub status: Option<DeviceStatus>,
    pub is_active: Option<bool>,
    pub secret_hash: Option<String>,
    pub firmware_version: Option<String>,
    pub uptime_seconds: Option<u64>,
    pub last_seen_at_ms: Option<i64>,
}

/// 待设备心跳拉取的命令。
#[derive(Debug, Clone)]
pub struct PendingCommandRecord {
    pub command_id: String,
    pub device_id: String,
    pub payload: serde_json::Value,
    pub created_at_ms: i64,
}

/// 区域（物理位置节点）。
#[derive(Debug, Clone)]
pub struct ZoneRecord {
    pub zone_id: String,
    pub practice_id: String,
    pub name: String,
    pub code: String,
    pub zone_type: ZoneType,
    pub is_destination: bool,
    pub is_active: bool,
}

/// LED 灯段：归属一个区域和一个灯控控制器。
#[derive(Debug, Clone)]
pub struct SegmentRecord {
    pub segment_id: String,
    pub practice_id: String,
    pub zone_id: String,
    pub controller_id: String,
    /// 控制器本地段号（0-15）。
    pub index: u8,
    pub start_led: u32,
    pub end_led: u32,
    pub role: SegmentRole,
    pub default_color: String,
}

/// 导引路线：有序灯段列表。
#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub route_id: String,
    pub practice_id: String,
    pub name: String,
    pub from_zone_id: Option<String>,
    pub to_zone_id: String,
    pub segment_ids: Vec<String>,
    pub color: String,
    pub pattern: LedPattern,
    pub duration_seconds: u64,
    pub is_active: bool,
}

/// 患者凭证（卡片/手机/二维码）。
///
/// 只保存查找摘要与加密副本。
#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub token_id: String,
    pub practice_id: String,
    pub patient_id: String,
    pub lookup_digest: String,
    pub encrypted_identifier: String,
    pub card_type: CredentialType,
    pub label: Option<String>,
    pub expires_at_ms: Option<i64>,
    pub is_active: bool,
    pub issued_at_ms: i64,
    pub last_used_at_ms: Option<i64>,
    pub revoked_at_ms: Option<i64>,
}

/// 队列记录。
#[derive(Debug, Clone)]
pub struct QueueRecord {
    pub queue_id: String,
    pub practice_id: String,
    pub name: String,
    pub code: String,
    pub zone_id: Option<String>,
    pub current_number: i64,
    pub average_wait_minutes: u32,
    pub is_active: bool,
    pub created_at_ms: i64,
}

/// 票据记录。
#[derive(Debug, Clone)]
pub struct TicketRecord {
    pub ticket_id: String,
    pub queue_id: String,
    pub practice_id: String,
    pub patient_id: Option<String>,
    pub number: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub estimated_wait_minutes: u32,
    pub created_at_ms: i64,
    pub called_at_ms: Option<i64>,
    pub completed_at_ms: Option<i64>,
    pub called_by: Option<String>,
}

/// 签到审计事件（只追加）。
#[derive(Debug, Clone)]
pub struct CheckInEventRecord {
    pub event_id: String,
    pub practice_id: String,
    pub device_id: Option<String>,
    pub credential_id: Option<String>,
    pub ticket_id: Option<String>,
    pub patient_id: Option<String>,
    pub method: CheckInMethod,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub route_id: Option<String>,
    /// 未匹配到凭证时保留查找摘要，便于前台排查。
    pub lookup_digest: Option<String>,
    pub checked_in_at_ms: i64,
}

/// 区域等待时间日志（只追加）。
#[derive(Debug, Clone)]
pub struct WaitTimeLogRecord {
    pub log_id: String,
    pub practice_id: String,
    pub zone_id: String,
    pub waiting_count: u32,
    pub average_wait_minutes: f64,
    pub max_wait_minutes: u32,
    pub color: String,
    pub recorded_at_ms: i64,
}
