//! 审计类内存存储（只追加）
//!
//! - 签到事件
//! - 区域等待时间日志

use crate::error::StorageError;
use crate::models::{CheckInEventRecord, WaitTimeLogRecord};
use crate::traits::{CheckInEventStore, WaitTimeLogStore};
use crate::validation::ensure_practice_scope;
use domain::PracticeContext;
use std::sync::RwLock;

/// 签到事件内存存储
pub struct InMemoryCheckInEventStore {
    events: RwLock<Vec<CheckInEventRecord>>,
}

impl InMemoryCheckInEventStore {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryCheckInEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CheckInEventStore for InMemoryCheckInEventStore {
    async fn append_event(
        &self,
        ctx: &PracticeContext,
        record: CheckInEventRecord,
    ) -> Result<(), StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        let mut events = self
            .events
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        events.push(record);
        Ok(())
    }

    async fn list_events(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        limit: usize,
    ) -> Result<Vec<CheckInEventRecord>, StorageError> {
        ensure_practice_scope(ctx, practice_id)?;
        let events = self
            .events
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        // 追加顺序即时间顺序，倒序遍历得到最新在前
        Ok(events
            .iter()
            .rev()
            .filter(|item| item.practice_id == practice_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// 等待时间日志内存存储
pub struct InMemoryWaitTimeLogStore {
    logs: RwLock<Vec<WaitTimeLogRecord>>,
}

impl InMemoryWaitTimeLogStore {
    pub fn new() -> Self {
        Self {
            logs: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryWaitTimeLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WaitTimeLogStore for InMemoryWaitTimeLogStore {
    async fn append_log(
        &self,
        ctx: &PracticeContext,
        record: WaitTimeLogRecord,
    ) -> Result<(), StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        logs.push(record);
        Ok(())
    }

    async fn list_logs(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        limit: usize,
    ) -> Result<Vec<WaitTimeLogRecord>, StorageError> {
        ensure_practice_scope(ctx, practice_id)?;
        let logs = self
            .logs
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(logs
            .iter()
            .rev()
            .filter(|item| item.practice_id == practice_id)
            .take(limit)
            .cloned()
            .collect())
    }
}
