//! JSON 夹具：启动时向内存存储写入诊所布局与演示数据。
//!
//! 诊所、患者、区域、队列的管理由外部系统负责，本服务只读；
//! 单进程部署与本地演示通过 `RECEPTION_FIXTURE_PATH` 指向的文件提供这些数据。
//! 夹具中的设备密钥为明文，写入前做 argon2 哈希；凭证经 CredentialResolver 签发。

use crate::Stores;
use domain::{
    CredentialType, DeviceCategory, DeviceStatus, LedPattern, PracticeContext, SegmentRole,
    ZoneType,
};
use reception_auth::hash_secret;
use reception_credential::{CredentialResolver, IssueCredential};
use reception_storage::{
    DeviceRecord, DeviceStore, PatientRecord, PracticeRecord, QueueRecord, QueueStore,
    RouteRecord, RouteStore, SegmentRecord, SegmentStore, StorageError, ZoneRecord,
};
use serde::Deserialize;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// 夹具加载错误。
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("fixture io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("fixture parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("fixture invalid: {0}")]
    Invalid(String),
    #[error("fixture storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Fixture {
    pub practices: Vec<PracticeFixture>,
    pub patients: Vec<PatientFixture>,
    pub zones: Vec<ZoneFixture>,
    pub devices: Vec<DeviceFixture>,
    pub segments: Vec<SegmentFixture>,
    pub routes: Vec<RouteFixture>,
    pub queues: Vec<QueueFixture>,
    pub credentials: Vec<CredentialFixture>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeFixture {
    pub practice_id: String,
    pub name: String,
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFixture {
    pub patient_id: String,
    pub practice_id: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneFixture {
    pub zone_id: String,
    pub practice_id: String,
    pub name: String,
    pub code: String,
    pub zone_type: String,
    #[serde(default)]
    pub is_destination: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFixture {
    pub device_id: String,
    pub practice_id: String,
    pub category: String,
    pub serial: String,
    pub name: String,
    pub secret: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentFixture {
    pub segment_id: String,
    pub practice_id: String,
    pub zone_id: String,
    pub controller_id: String,
    pub index: u8,
    pub start_led: u32,
    pub end_led: u32,
    #[serde(default = "default_role")]
    pub role: String,
    #[serde(default = "default_color")]
    pub default_color: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFixture {
    pub route_id: String,
    pub practice_id: String,
    pub name: String,
    #[serde(default)]
    pub from_zone_id: Option<String>,
    pub to_zone_id: String,
    pub segment_ids: Vec<String>,
    pub color: String,
    #[serde(default = "default_pattern")]
    pub pattern: String,
    #[serde(default)]
    pub duration_seconds: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueFixture {
    pub queue_id: String,
    pub practice_id: String,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default = "default_average_wait")]
    pub average_wait_minutes: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialFixture {
    pub practice_id: String,
    pub patient_id: String,
    pub raw_identifier: String,
    #[serde(default = "default_card_type")]
    pub card_type: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub expires_at_ms: Option<i64>,
}

fn default_role() -> String {
    "path".to_string()
}

fn default_color() -> String {
    "#FFFFFF".to_string()
}

fn default_pattern() -> String {
    "solid".to_string()
}

fn default_average_wait() -> u32 {
    10
}

fn default_card_type() -> String {
    "custom".to_string()
}

/// 写入结果计数。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FixtureSummary {
    pub practices: usize,
    pub patients: usize,
    pub zones: usize,
    pub devices: usize,
    pub segments: usize,
    pub routes: usize,
    pub queues: usize,
    pub credentials: usize,
}

/// 读取并写入夹具文件。
pub async fn load_file(
    path: impl AsRef<Path>,
    stores: &Stores,
    credentials: &CredentialResolver,
) -> Result<FixtureSummary, FixtureError> {
    let raw = tokio::fs::read_to_string(path.as_ref()).await?;
    let fixture: Fixture = serde_json::from_str(&raw)?;
    let summary = apply(fixture, stores, credentials).await?;
    info!(
        target: "reception.api",
        path = %path.as_ref().display(),
        practices = summary.practices,
        devices = summary.devices,
        routes = summary.routes,
        queues = summary.queues,
        credentials = summary.credentials,
        "fixture_loaded"
    );
    Ok(summary)
}

/// 按依赖顺序写入：诊所 → 患者 → 区域 → 设备 → 灯段 → 路线 → 队列 → 凭证。
pub async fn apply(
    fixture: Fixture,
    stores: &Stores,
    credentials: &CredentialResolver,
) -> Result<FixtureSummary, FixtureError> {
    let now = now_epoch_ms();
    let mut summary = FixtureSummary::default();

    for item in fixture.practices {
        stores.practices.insert_practice(PracticeRecord {
            practice_id: item.practice_id,
            name: item.name,
            utc_offset_minutes: item.utc_offset_minutes,
            is_active: true,
        })?;
        summary.practices += 1;
    }
    for item in fixture.patients {
        stores.patients.insert_patient(PatientRecord {
            patient_id: item.patient_id,
            practice_id: item.practice_id,
            first_name: item.first_name,
            last_name: item.last_name,
            is_active: true,
        })?;
        summary.patients += 1;
    }
    for item in fixture.zones {
        stores.zones.insert_zone(ZoneRecord {
            zone_type: parse(&item.zone_type, "zoneType", ZoneType::parse)?,
            zone_id: item.zone_id,
            practice_id: item.practice_id,
            name: item.name,
            code: item.code,
            is_destination: item.is_destination,
            is_active: true,
        })?;
        summary.zones += 1;
    }
    for item in fixture.devices {
        let ctx = PracticeContext::system().scoped_to(&item.practice_id);
        let secret_hash =
            hash_secret(&item.secret).map_err(|err| FixtureError::Invalid(err.to_string()))?;
        stores
            .devices
            .create_device(
                &ctx,
                DeviceRecord {
                    category: parse(&item.category, "category", DeviceCategory::parse)?,
                    device_id: item.device_id,
                    practice_id: item.practice_id,
                    serial: item.serial,
                    name: item.name,
                    secret_hash,
                    address: item.address,
                    status: DeviceStatus::Online,
                    zone_id: item.zone_id,
                    firmware_version: None,
                    uptime_seconds: None,
                    is_active: true,
                    last_seen_at_ms: Some(now),
                    created_at_ms: now,
                },
            )
            .await?;
        summary.devices += 1;
    }
    for item in fixture.segments {
        let ctx = PracticeContext::system().scoped_to(&item.practice_id);
        stores
            .segments
            .create_segment(
                &ctx,
                SegmentRecord {
                    role: parse(&item.role, "role", SegmentRole::parse)?,
                    segment_id: item.segment_id,
                    practice_id: item.practice_id,
                    zone_id: item.zone_id,
                    controller_id: item.controller_id,
                    index: item.index,
                    start_led: item.start_led,
                    end_led: item.end_led,
                    default_color: item.default_color,
                },
            )
            .await?;
        summary.segments += 1;
    }
    for item in fixture.routes {
        let ctx = PracticeContext::system().scoped_to(&item.practice_id);
        stores
            .routes
            .create_route(
                &ctx,
                RouteRecord {
                    pattern: parse(&item.pattern, "pattern", LedPattern::parse)?,
                    route_id: item.route_id,
                    practice_id: item.practice_id,
                    name: item.name,
                    from_zone_id: item.from_zone_id,
                    to_zone_id: item.to_zone_id,
                    segment_ids: item.segment_ids,
                    color: item.color,
                    duration_seconds: item.duration_seconds,
                    is_active: true,
                },
            )
            .await?;
        summary.routes += 1;
    }
    for (offset, item) in fixture.queues.into_iter().enumerate() {
        let ctx = PracticeContext::system().scoped_to(&item.practice_id);
        stores
            .queues
            .create_queue(
                &ctx,
                QueueRecord {
                    queue_id: item.queue_id,
                    practice_id: item.practice_id,
                    name: item.name,
                    code: item.code,
                    zone_id: item.zone_id,
                    current_number: 0,
                    average_wait_minutes: item.average_wait_minutes,
                    is_active: true,
                    // 保持文件顺序，默认队列取第一条
                    created_at_ms: now + offset as i64,
                },
            )
            .await?;
        summary.queues += 1;
    }
    for item in fixture.credentials {
        let ctx = PracticeContext::system().scoped_to(&item.practice_id);
        let input = IssueCredential {
            card_type: parse(&item.card_type, "cardType", CredentialType::parse)?,
            practice_id: item.practice_id,
            patient_id: item.patient_id,
            raw_identifier: item.raw_identifier,
            label: item.label,
            expires_at_ms: item.expires_at_ms,
        };
        credentials
            .issue(&ctx, input)
            .await
            .map_err(|err| FixtureError::Invalid(err.to_string()))?;
        summary.credentials += 1;
    }
    Ok(summary)
}

fn parse<T>(value: &str, field: &str, parse: impl Fn(&str) -> Option<T>) -> Result<T, FixtureError> {
    parse(&value.trim().to_ascii_lowercase())
        .ok_or_else(|| FixtureError::Invalid(format!("{field} {value}")))
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or_default()
}
