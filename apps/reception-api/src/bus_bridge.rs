//! 命令总线桥接：设备经总线上报的扫描与状态。
//!
//! - `{root}/+/nfc/+/scan`：`{ rawIdentifier, deviceSecret, method? }`，走与 HTTP 相同的签到流程，
//!   结果发布到 `{root}/{practice}/nfc/{device}/result`；topic 中的诊所与设备所属诊所不符时
//!   不执行签到，按认证失败回复
//! - `{root}/+/+/+/status`：`{ deviceSecret, deviceSerial?, firmwareVersion?, uptimeSeconds? }`，
//!   按心跳处理；未带序列号时以 topic 中的设备段作为序列号

use crate::utils::response::outcome_to_response;
use async_trait::async_trait;
use domain::{CheckInMethod, PracticeContext};
use reception_auth::{DeviceRegistry, HeartbeatMetadata};
use reception_bus::{
    BusError, BusMessage, CommandBus, DeviceTopic, MessageHandler, SubscriptionId, Topics,
};
use reception_checkin::{CheckInError, CheckInOrchestrator, MSG_UNAVAILABLE, ScanRequest};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanPayload {
    #[serde(alias = "uid", alias = "nfcUid")]
    raw_identifier: String,
    device_secret: String,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    device_secret: String,
    #[serde(default)]
    device_serial: Option<String>,
    #[serde(default)]
    firmware_version: Option<String>,
    #[serde(default)]
    uptime_seconds: Option<u64>,
}

/// 读卡器扫描处理。
pub struct ScanHandler {
    checkin: Arc<CheckInOrchestrator>,
    registry: Arc<DeviceRegistry>,
    bus: Arc<dyn CommandBus>,
    topics: Topics,
}

impl ScanHandler {
    pub fn new(
        checkin: Arc<CheckInOrchestrator>,
        registry: Arc<DeviceRegistry>,
        bus: Arc<dyn CommandBus>,
        topics: Topics,
    ) -> Self {
        Self {
            checkin,
            registry,
            bus,
            topics,
        }
    }

    /// 设备存在但属于其他诊所。
    async fn practice_mismatch(&self, practice_id: &str, device_id: &str) -> bool {
        match self
            .registry
            .find_device(&PracticeContext::system(), device_id)
            .await
        {
            Ok(device) => device.practice_id != practice_id,
            Err(_) => false,
        }
    }
}

#[async_trait]
impl MessageHandler for ScanHandler {
    async fn handle(&self, message: BusMessage) {
        let Some(topic) = self.topics.parse_device_topic(&message.topic) else {
            debug!(target: "reception.api", topic = %message.topic, "scan_topic_ignored");
            return;
        };
        let payload: ScanPayload = match serde_json::from_slice(&message.payload) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    target: "reception.api",
                    device_id = %topic.device_id,
                    error = %err,
                    "scan_payload_invalid"
                );
                return;
            }
        };
        let method = payload
            .method
            .as_deref()
            .and_then(CheckInMethod::parse)
            .unwrap_or(CheckInMethod::Nfc);
        if self
            .practice_mismatch(&topic.practice_id, &topic.device_id)
            .await
        {
            warn!(
                target: "reception.api",
                practice_id = %topic.practice_id,
                device_id = %topic.device_id,
                "scan_practice_mismatch"
            );
            // 哈希校验照常执行，回复与密钥错误一致
            let _ = self
                .registry
                .authenticate(&topic.device_id, &payload.device_secret)
                .await;
            self.reply(&topic, &json!({ "success": false, "error": "unauthorized" }))
                .await;
            return;
        }
        let scan = ScanRequest {
            raw_identifier: payload.raw_identifier,
            device_id: topic.device_id.clone(),
            device_secret: payload.device_secret,
            method,
        };
        let result = match self.checkin.check_in(scan).await {
            Ok(outcome) => serde_json::to_value(outcome_to_response(&outcome))
                .unwrap_or_else(|_| json!({ "success": outcome.success })),
            Err(CheckInError::AuthenticationFailed) => {
                json!({ "success": false, "error": "unauthorized" })
            }
            Err(err) => {
                warn!(
                    target: "reception.api",
                    device_id = %topic.device_id,
                    error = %err,
                    "bus_check_in_unavailable"
                );
                json!({ "success": false, "message": MSG_UNAVAILABLE })
            }
        };
        self.reply(&topic, &result).await;
    }
}

impl ScanHandler {
    async fn reply(&self, topic: &DeviceTopic, result: &serde_json::Value) {
        let reply = self.topics.device(
            &topic.practice_id,
            &topic.category,
            &topic.device_id,
            "result",
        );
        if let Err(err) = self.bus.publish(&reply, result).await {
            warn!(
                target: "reception.api",
                device_id = %topic.device_id,
                error = %err,
                "scan_result_publish_failed"
            );
        }
    }
}

/// 设备状态（心跳）处理。
pub struct StatusHandler {
    registry: Arc<DeviceRegistry>,
    topics: Topics,
}

impl StatusHandler {
    pub fn new(registry: Arc<DeviceRegistry>, topics: Topics) -> Self {
        Self { registry, topics }
    }
}

#[async_trait]
impl MessageHandler for StatusHandler {
    async fn handle(&self, message: BusMessage) {
        let Some(topic) = self.topics.parse_device_topic(&message.topic) else {
            return;
        };
        let payload: StatusPayload = match serde_json::from_slice(&message.payload) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(
                    target: "reception.api",
                    device = %topic.device_id,
                    error = %err,
                    "status_payload_invalid"
                );
                return;
            }
        };
        let serial = payload.device_serial.unwrap_or(topic.device_id);
        let metadata = HeartbeatMetadata {
            firmware_version: payload.firmware_version,
            uptime_seconds: payload.uptime_seconds,
        };
        if let Err(err) = self
            .registry
            .record_heartbeat(&serial, &payload.device_secret, metadata)
            .await
        {
            debug!(target: "reception.api", error = %err, "bus_heartbeat_rejected");
        }
    }
}

/// 订阅扫描与状态 topic。
pub async fn start(
    bus: Arc<dyn CommandBus>,
    topics: Topics,
    checkin: Arc<CheckInOrchestrator>,
    registry: Arc<DeviceRegistry>,
) -> Result<Vec<SubscriptionId>, BusError> {
    let scan_filter = topics.scan_filter();
    let status_filter = topics.status_filter();
    let scan = Arc::new(ScanHandler::new(
        checkin,
        registry.clone(),
        bus.clone(),
        topics.clone(),
    ));
    let status = Arc::new(StatusHandler::new(registry, topics));
    let ids = vec![
        bus.subscribe(&scan_filter, scan).await?,
        bus.subscribe(&status_filter, status).await?,
    ];
    info!(
        target: "reception.api",
        scan_filter = %scan_filter,
        status_filter = %status_filter,
        "bus_bridge_started"
    );
    Ok(ids)
}
