//! 设备内存存储实现
//!
//! - 设备 CRUD（序列号全局唯一）
//! - 心跳过期扫描
//! - 待拉取命令队列

use crate::error::StorageError;
use crate::models::{DeviceRecord, DeviceUpdate, PendingCommandRecord};
use crate::traits::{DeviceCommandStore, DeviceStore};
use crate::validation::{ensure_practice_scope, in_scope};
use domain::{DeviceStatus, PracticeContext};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

/// 设备内存存储
///
/// 使用 RwLock + HashMap 提供线程安全的内存存储。
pub struct InMemoryDeviceStore {
    devices: RwLock<HashMap<String, DeviceRecord>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceStore for InMemoryDeviceStore {
    async fn list_devices(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        ensure_practice_scope(ctx, practice_id)?;
        let map = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<DeviceRecord> = map
            .values()
            .filter(|item| item.practice_id == practice_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.created_at_ms);
        Ok(items)
    }

    async fn find_device(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let item = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(device_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn find_device_by_serial(
        &self,
        ctx: &PracticeContext,
        serial: &str,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let item = self
            .devices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .values()
            .find(|item| item.serial == serial)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn create_device(
        &self,
        ctx: &PracticeContext,
        record: DeviceRecord,
    ) -> Result<DeviceRecord, StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        let mut map = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.device_id) {
            return Err(StorageError::new("device exists"));
        }
        if map.values().any(|item| item.serial == record.serial) {
            return Err(StorageError::new("device serial exists"));
        }
        map.insert(record.device_id.clone(), record.clone());
        Ok(record)
    }

    async fn update_device(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
        update: DeviceUpdate,
    ) -> Result<Option<DeviceRecord>, StorageError> {
        let mut map = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let device = match map.get_mut(device_id) {
            Some(device) if in_scope(ctx, &device.practice_id) => device,
            _ => return Ok(None),
        };
        if let Some(name) = update.name {
            device.name = name;
        }
        if let Some(address) = update.address {
            device.address = Some(address);
        }
        if let Some(zone_id) = update.zone_id {
            device.zone_id = Some(zone_id);
        }
        if let Some(status) = update.status {
            device.status = status;
        }
        if let Some(is_active) = update.is_active {
            device.is_active = is_active;
        }
        if let Some(secret_hash) = update.secret_hash {
            device.secret_hash = secret_hash;
        }
        if let Some(firmware_version) = update.firmware_version {
            device.firmware_version = Some(firmware_version);
        }
        if let Some(uptime_seconds) = update.uptime_seconds {
            device.uptime_seconds = Some(uptime_seconds);
        }
        if let Some(last_seen_at_ms) = update.last_seen_at_ms {
            device.last_seen_at_ms = Some(last_seen_at_ms);
        }
        Ok(Some(device.clone()))
    }

    async fn mark_stale_offline(
        &self,
        ctx: &PracticeContext,
        seen_before_ms: i64,
    ) -> Result<Vec<DeviceRecord>, StorageError> {
        let mut map = self
            .devices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut changed = Vec::new();
        for device in map.values_mut() {
            if !in_scope(ctx, &device.practice_id) || device.status != DeviceStatus::Online {
                continue;
            }
            let stale = device
                .last_seen_at_ms
                .map(|seen| seen < seen_before_ms)
                .unwrap_or(true);
            if stale {
                device.status = DeviceStatus::Offline;
                changed.push(device.clone());
            }
        }
        Ok(changed)
    }
}

/// 设备待拉取命令内存存储
pub struct InMemoryDeviceCommandStore {
    commands: RwLock<HashMap<String, (String, VecDeque<PendingCommandRecord>)>>,
}

impl InMemoryDeviceCommandStore {
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryDeviceCommandStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl DeviceCommandStore for InMemoryDeviceCommandStore {
    async fn enqueue_command(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        record: PendingCommandRecord,
    ) -> Result<(), StorageError> {
        ensure_practice_scope(ctx, practice_id)?;
        let mut map = self
            .commands
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let entry = map
            .entry(record.device_id.clone())
            .or_insert_with(|| (practice_id.to_string(), VecDeque::new()));
        entry.1.push_back(record);
        Ok(())
    }

    async fn drain_commands(
        &self,
        ctx: &PracticeContext,
        device_id: &str,
    ) -> Result<Vec<PendingCommandRecord>, StorageError> {
        let mut map = self
            .commands
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        match map.get_mut(device_id) {
            Some((practice_id, queue)) if in_scope(ctx, practice_id) => {
                Ok(queue.drain(..).collect())
            }
            _ => Ok(Vec::new()),
        }
    }
}
