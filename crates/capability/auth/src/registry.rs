//! 设备注册表与认证
//!
//! - 注册：生成一次性密钥，仅保存 argon2 哈希
//! - 认证：签到（设备 ID）与心跳（序列号）两条入口，失败统一为 `AuthenticationFailed`
//! - 心跳：更新最后在线时间与状态，取出待拉取命令
//! - 离线扫描：心跳超时的在线设备置为离线

use crate::AuthError;
use crate::secret::{generate_secret, hash_secret_blocking, verify_secret_blocking};
use domain::{DeviceCategory, DeviceStatus, PracticeContext};
use reception_storage::{
    DeviceCommandStore, DeviceRecord, DeviceStore, DeviceUpdate, PendingCommandRecord,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::Choice;
use tracing::{info, warn};

/// 注册设备输入。
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub practice_id: String,
    pub category: DeviceCategory,
    pub serial: String,
    pub name: String,
    pub address: Option<String>,
    pub zone_id: Option<String>,
}

/// 心跳附带的设备元数据。
#[derive(Debug, Clone, Default)]
pub struct HeartbeatMetadata {
    pub firmware_version: Option<String>,
    pub uptime_seconds: Option<u64>,
}

/// 心跳结果。
#[derive(Debug, Clone)]
pub struct HeartbeatOutcome {
    pub device: DeviceRecord,
    pub pending_commands: Vec<PendingCommandRecord>,
}

/// 签到认证的准入规则。
#[derive(Debug, Clone, Copy)]
enum Admission {
    CheckIn,
    Heartbeat,
}

impl Admission {
    fn admits(self, device: &DeviceRecord) -> bool {
        if !device.is_active {
            return false;
        }
        match self {
            Admission::CheckIn => device.status == DeviceStatus::Online,
            Admission::Heartbeat => device.status != DeviceStatus::Maintenance,
        }
    }
}

/// 设备注册表：设备身份、密钥哈希与在线状态的唯一所有者。
pub struct DeviceRegistry {
    devices: Arc<dyn DeviceStore>,
    commands: Arc<dyn DeviceCommandStore>,
}

impl DeviceRegistry {
    pub fn new(devices: Arc<dyn DeviceStore>, commands: Arc<dyn DeviceCommandStore>) -> Self {
        Self { devices, commands }
    }

    /// 注册设备，返回设备记录与明文密钥（仅此一次）。
    pub async fn register(
        &self,
        ctx: &PracticeContext,
        input: NewDevice,
    ) -> Result<(DeviceRecord, String), AuthError> {
        let serial = input.serial.trim().to_string();
        if serial.is_empty() {
            return Err(AuthError::InvalidInput("serial required".to_string()));
        }
        if input.name.trim().is_empty() {
            return Err(AuthError::InvalidInput("name required".to_string()));
        }
        let system = PracticeContext::system();
        if self
            .devices
            .find_device_by_serial(&system, &serial)
            .await?
            .is_some()
        {
            return Err(AuthError::DuplicateSerial);
        }

        let secret = generate_secret();
        let secret_hash = hash_secret_blocking(secret.clone()).await?;
        let now = now_epoch_ms();
        let record = DeviceRecord {
            device_id: uuid::Uuid::new_v4().to_string(),
            practice_id: input.practice_id,
            category: input.category,
            serial,
            name: input.name.trim().to_string(),
            secret_hash,
            address: input.address,
            status: DeviceStatus::Offline,
            zone_id: input.zone_id,
            firmware_version: None,
            uptime_seconds: None,
            is_active: true,
            last_seen_at_ms: None,
            created_at_ms: now,
        };
        let device = self.devices.create_device(ctx, record).await.map_err(|err| {
            if err.message() == "device serial exists" {
                AuthError::DuplicateSerial
            } else {
                AuthError::from(err)
            }
        })?;
        info!(
            target: "reception.auth",
            practice_id = %device.practice_id,
            device_id = %device.device_id,
            category = device.category.as_str(),
            "device_registered"
        );
        Ok((device, secret))
    }

    /// 签到认证：设备存在、密钥匹配、启用且在线。
    pub async fn authenticate(
        &self,
        device_id: &str,
        presented_secret: &str,
    ) -> Result<DeviceRecord, AuthError> {
        let device = self
            .devices
            .find_device(&PracticeContext::system(), device_id)
            .await?;
        self.admit(device, presented_secret, Admission::CheckIn)
            .await
    }

    /// 心跳认证：按序列号查找；维护中的设备拒绝。
    pub async fn authenticate_heartbeat(
        &self,
        device_serial: &str,
        presented_secret: &str,
    ) -> Result<DeviceRecord, AuthError> {
        let device = self
            .devices
            .find_device_by_serial(&PracticeContext::system(), device_serial)
            .await?;
        self.admit(device, presented_secret, Admission::Heartbeat)
            .await
    }

    /// 记录心跳：更新最后在线时间、状态置为在线，并取出待拉取命令。
    pub async fn record_heartbeat(
        &self,
        device_serial: &str,
        presented_secret: &str,
        metadata: HeartbeatMetadata,
    ) -> Result<HeartbeatOutcome, AuthError> {
        let device = self
            .authenticate_heartbeat(device_serial, presented_secret)
            .await?;
        let ctx = PracticeContext::for_device(&device.device_id, &device.practice_id);
        let was_online = device.status == DeviceStatus::Online;
        let update = DeviceUpdate {
            status: Some(DeviceStatus::Online),
            firmware_version: metadata.firmware_version,
            uptime_seconds: metadata.uptime_seconds,
            last_seen_at_ms: Some(now_epoch_ms()),
            ..DeviceUpdate::default()
        };
        let device = self
            .devices
            .update_device(&ctx, &device.device_id, update)
            .await?
            .ok_or(AuthError::AuthenticationFailed)?;
        if !was_online {
            info!(
                target: "reception.auth",
                practice_id = %device.practice_id,
                device_id = %device.device_id,
                "device_online"
            );
        }
        let pending_commands = self.commands.drain_commands(&ctx, &device.device_id).await?;
        Ok(HeartbeatOutcome {
            device,
            pending_commands,
        })
    }

    pub async fn list_devices(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<DeviceRecord>, AuthError> {
        Ok(self.devices.list_devices(ctx, practice_id).await?)
    }

    pub async fn find_device(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
    ) -> Result<DeviceRecord, AuthError> {
        self.devices
            .find_device(ctx, device_id)
            .await?
            .ok_or(AuthError::DeviceNotFound)
    }

    /// 管理端更新元数据；状态只允许置为维护或离线。
    pub async fn update(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
        update: DeviceUpdate,
    ) -> Result<DeviceRecord, AuthError> {
        if let Some(status) = update.status {
            if !matches!(status, DeviceStatus::Maintenance | DeviceStatus::Offline) {
                return Err(AuthError::InvalidInput(format!(
                    "status {} cannot be set manually",
                    status.as_str()
                )));
            }
        }
        let update = DeviceUpdate {
            name: update.name,
            address: update.address,
            zone_id: update.zone_id,
            status: update.status,
            ..DeviceUpdate::default()
        };
        let device = self
            .devices
            .update_device(ctx, device_id, update)
            .await?
            .ok_or(AuthError::DeviceNotFound)?;
        info!(
            target: "reception.auth",
            practice_id = %device.practice_id,
            device_id = %device.device_id,
            status = device.status.as_str(),
            "device_updated"
        );
        Ok(device)
    }

    /// 软停用：停用后不再通过任何认证。
    pub async fn deactivate(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
    ) -> Result<DeviceRecord, AuthError> {
        let update = DeviceUpdate {
            is_active: Some(false),
            status: Some(DeviceStatus::Offline),
            ..DeviceUpdate::default()
        };
        let device = self
            .devices
            .update_device(ctx, device_id, update)
            .await?
            .ok_or(AuthError::DeviceNotFound)?;
        info!(
            target: "reception.auth",
            practice_id = %device.practice_id,
            device_id = %device.device_id,
            "device_deactivated"
        );
        Ok(device)
    }

    /// 轮换密钥，返回新的一次性明文密钥。
    pub async fn rotate_secret(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
    ) -> Result<(DeviceRecord, String), AuthError> {
        self.find_device(ctx, device_id).await?;
        let secret = generate_secret();
        let secret_hash = hash_secret_blocking(secret.clone()).await?;
        let update = DeviceUpdate {
            secret_hash: Some(secret_hash),
            ..DeviceUpdate::default()
        };
        let device = self
            .devices
            .update_device(ctx, device_id, update)
            .await?
            .ok_or(AuthError::DeviceNotFound)?;
        info!(
            target: "reception.auth",
            practice_id = %device.practice_id,
            device_id = %device.device_id,
            "device_secret_rotated"
        );
        Ok((device, secret))
    }

    /// 为设备排队一条命令，下次心跳时下发。
    pub async fn enqueue_command(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
        payload: serde_json::Value,
    ) -> Result<PendingCommandRecord, AuthError> {
        let device = self.find_device(ctx, device_id).await?;
        let record = PendingCommandRecord {
            command_id: uuid::Uuid::new_v4().to_string(),
            device_id: device.device_id.clone(),
            payload,
            created_at_ms: now_epoch_ms(),
        };
        self.commands
            .enqueue_command(ctx, &device.practice_id, record.clone())
            .await?;
        Ok(record)
    }

    /// 心跳超时扫描，返回被置为离线的设备。
    pub async fn mark_stale_offline(
        &self,
        now_ms: i64,
        offline_after_seconds: u64,
    ) -> Result<Vec<DeviceRecord>, AuthError> {
        let window_ms = i64::try_from(offline_after_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let threshold = now_ms.saturating_sub(window_ms);
        let changed = self
            .devices
            .mark_stale_offline(&PracticeContext::system(), threshold)
            .await?;
        for device in &changed {
            warn!(
                target: "reception.auth",
                practice_id = %device.practice_id,
                device_id = %device.device_id,
                "device_offline"
            );
        }
        Ok(changed)
    }

    /// 统一的认证判定：哈希校验总会执行，与准入结果做常量时间合并。
    async fn admit(
        &self,
        device: Option<DeviceRecord>,
        presented_secret: &str,
        admission: Admission,
    ) -> Result<DeviceRecord, AuthError> {
        let stored_hash = device.as_ref().map(|item| item.secret_hash.clone());
        let verified =
            verify_secret_blocking(stored_hash, presented_secret.to_string()).await?;
        let admitted = device
            .as_ref()
            .map(|item| admission.admits(item))
            .unwrap_or(false);
        let accepted = Choice::from(verified as u8) & Choice::from(admitted as u8);
        match device {
            Some(device) if bool::from(accepted) => Ok(device),
            _ => {
                reception_telemetry::record_device_auth_failure();
                warn!(target: "reception.auth", "device_auth_failed");
                Err(AuthError::AuthenticationFailed)
            }
        }
    }
}

/// 当前时间戳（毫秒）。
fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
