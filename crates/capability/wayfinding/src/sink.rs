//! LED 段命令下发通道
//!
//! - `WledHttpSink`：直接 POST 控制器的 WLED JSON API（`http://{address}/json`）
//! - `BusLedSink`：发布到 `{root}/{practice}/led/{controller}/command`

use crate::WayfindingError;
use crate::command::SegmentCommand;
use async_trait::async_trait;
use reception_bus::{CommandBus, Topics};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 下发目标：一个灯控控制器。
#[derive(Debug, Clone)]
pub struct LedTarget {
    pub practice_id: String,
    pub controller_id: String,
    pub address: Option<String>,
}

/// 段命令下发抽象。
#[async_trait]
pub trait LedCommandSink: Send + Sync {
    async fn send(
        &self,
        target: &LedTarget,
        commands: &[SegmentCommand],
    ) -> Result<(), WayfindingError>;
}

/// WLED HTTP 下发。
pub struct WledHttpSink {
    client: reqwest::Client,
}

impl WledHttpSink {
    pub fn new(timeout_ms: u64) -> Result<Self, WayfindingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| WayfindingError::DispatchFailed(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl LedCommandSink for WledHttpSink {
    async fn send(
        &self,
        target: &LedTarget,
        commands: &[SegmentCommand],
    ) -> Result<(), WayfindingError> {
        let address = target
            .address
            .as_deref()
            .filter(|address| !address.trim().is_empty())
            .ok_or_else(|| {
                WayfindingError::ControllerUnreachable(format!(
                    "controller {} has no address",
                    target.controller_id
                ))
            })?;
        let url = format!("http://{}/json", address.trim().trim_end_matches('/'));
        let body = json!({ "seg": segments(commands) });
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| WayfindingError::ControllerUnreachable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(WayfindingError::ControllerUnreachable(format!(
                "controller {} responded {}",
                target.controller_id,
                response.status()
            )));
        }
        Ok(())
    }
}

/// 命令总线下发。
pub struct BusLedSink {
    bus: Arc<dyn CommandBus>,
    topics: Topics,
}

impl BusLedSink {
    pub fn new(bus: Arc<dyn CommandBus>, topics: Topics) -> Self {
        Self { bus, topics }
    }
}

#[async_trait]
impl LedCommandSink for BusLedSink {
    async fn send(
        &self,
        target: &LedTarget,
        commands: &[SegmentCommand],
    ) -> Result<(), WayfindingError> {
        let topic = self
            .topics
            .led_command(&target.practice_id, &target.controller_id);
        let payload = json!({
            "seg": segments(commands),
            "v": true,
            "timestamp": now_epoch_ms(),
        });
        self.bus
            .publish(&topic, &payload)
            .await
            .map_err(|err| WayfindingError::ControllerUnreachable(err.to_string()))
    }
}

fn segments(commands: &[SegmentCommand]) -> Vec<Value> {
    commands.iter().map(SegmentCommand::to_wled).collect()
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
