//! 队列与票据内存存储实现
//!
//! - 队列计数原子递增
//! - 票据状态 CAS 迁移

use crate::error::StorageError;
use crate::models::{QueueRecord, TicketRecord};
use crate::traits::{QueueStore, TicketStore};
use crate::validation::{ensure_practice_scope, in_scope};
use domain::{PracticeContext, TicketStatus};
use std::collections::HashMap;
use std::sync::RwLock;

/// 队列内存存储
pub struct InMemoryQueueStore {
    queues: RwLock<HashMap<String, QueueRecord>>,
}

impl InMemoryQueueStore {
    pub fn new() -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl QueueStore for InMemoryQueueStore {
    async fn create_queue(
        &self,
        ctx: &PracticeContext,
        record: QueueRecord,
    ) -> Result<QueueRecord, StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        let mut map = self
            .queues
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.queue_id) {
            return Err(StorageError::new("queue exists"));
        }
        map.insert(record.queue_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_queue(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<Option<QueueRecord>, StorageError> {
        let item = self
            .queues
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(queue_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn list_queues(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Vec<QueueRecord>, StorageError> {
        ensure_practice_scope(ctx, practice_id)?;
        let map = self
            .queues
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<QueueRecord> = map
            .values()
            .filter(|item| item.practice_id == practice_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then(a.code.cmp(&b.code))
        });
        Ok(items)
    }

    async fn increment_counter(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<Option<i64>, StorageError> {
        let mut map = self
            .queues
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        match map.get_mut(queue_id) {
            Some(queue) if queue.is_active && in_scope(ctx, &queue.practice_id) => {
                queue.current_number += 1;
                Ok(Some(queue.current_number))
            }
            _ => Ok(None),
        }
    }
}

/// 票据内存存储
pub struct InMemoryTicketStore {
    tickets: RwLock<HashMap<String, TicketRecord>>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self {
            tickets: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create_ticket(
        &self,
        ctx: &PracticeContext,
        record: TicketRecord,
    ) -> Result<TicketRecord, StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        let mut map = self
            .tickets
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.ticket_id) {
            return Err(StorageError::new("ticket exists"));
        }
        if map
            .values()
            .any(|item| item.queue_id == record.queue_id && item.number == record.number)
        {
            return Err(StorageError::new("ticket number exists"));
        }
        map.insert(record.ticket_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_ticket(
        &self,
        ctx: &PracticeContext,
        ticket_id: &str,
    ) -> Result<Option<TicketRecord>, StorageError> {
        let item = self
            .tickets
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(ticket_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn find_ticket_by_number(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
        number: &str,
    ) -> Result<Option<TicketRecord>, StorageError> {
        let item = self
            .tickets
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .values()
            .find(|item| item.queue_id == queue_id && item.number == number)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn find_active_ticket(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
        patient_id: &str,
        since_ms: i64,
    ) -> Result<Option<TicketRecord>, StorageError> {
        let map = self
            .tickets
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let item = map
            .values()
            .filter(|item| {
                item.queue_id == queue_id
                    && item.patient_id.as_deref() == Some(patient_id)
                    && item.status.is_active()
                    && item.created_at_ms >= since_ms
                    && in_scope(ctx, &item.practice_id)
            })
            .max_by_key(|item| item.created_at_ms)
            .cloned();
        Ok(item)
    }

    async fn list_tickets(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<Vec<TicketRecord>, StorageError> {
        let map = self
            .tickets
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<TicketRecord> = map
            .values()
            .filter(|item| item.queue_id == queue_id && in_scope(ctx, &item.practice_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.created_at_ms
                .cmp(&b.created_at_ms)
                .then(a.number.cmp(&b.number))
        });
        Ok(items)
    }

    async fn transition_ticket(
        &self,
        ctx: &PracticeContext,
        ticket_id: &str,
        from: TicketStatus,
        to: TicketStatus,
        at_ms: i64,
        actor: Option<&str>,
    ) -> Result<Option<TicketRecord>, StorageError> {
        let mut map = self
            .tickets
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let ticket = match map.get_mut(ticket_id) {
            Some(ticket) if in_scope(ctx, &ticket.practice_id) => ticket,
            _ => return Ok(None),
        };
        if ticket.status != from {
            return Ok(None);
        }
        ticket.status = to;
        match to {
            TicketStatus::Called => {
                ticket.called_at_ms = Some(at_ms);
                ticket.called_by = actor.map(str::to_string);
            }
            TicketStatus::Completed | TicketStatus::Cancelled | TicketStatus::NoShow => {
                ticket.completed_at_ms = Some(at_ms);
            }
            _ => {}
        }
        Ok(Some(ticket.clone()))
    }
}
