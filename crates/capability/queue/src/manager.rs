//! 队列管理器
//!
//! 队列与票据的唯一修改入口。

use crate::QueueError;
use crate::clock::{day_start_ms, format_ticket_number, ticket_counter};
use domain::{PracticeContext, TicketPriority, TicketStatus};
use reception_storage::{PracticeStore, QueueRecord, QueueStore, TicketRecord, TicketStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// 队列管理参数。
#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    /// 预计等待下限（分钟）
    pub min_wait_minutes: u32,
    /// 诊所未配置时区偏移时使用的默认偏移（分钟）
    pub default_utc_offset_minutes: i32,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            min_wait_minutes: 5,
            default_utc_offset_minutes: 60,
        }
    }
}

/// 出票输入。
#[derive(Debug, Clone)]
pub struct IssueTicket {
    pub queue_id: String,
    pub patient_id: Option<String>,
    pub priority: TicketPriority,
}

/// 出票结果：`created` 为 false 表示返回了当天已有的活跃票据。
#[derive(Debug, Clone)]
pub struct IssuedTicket {
    pub ticket: TicketRecord,
    pub queue: QueueRecord,
    pub created: bool,
}

/// 队列统计。
#[derive(Debug, Clone)]
pub struct QueueStats {
    pub queue_id: String,
    pub queue_name: String,
    pub waiting_count: u32,
    pub called_count: u32,
    pub in_progress_count: u32,
    pub completed_today: u32,
    pub current_number: i64,
    pub estimated_wait_minutes: u32,
}

#[derive(Debug, Clone)]
pub struct QueueSummaryItem {
    pub queue_id: String,
    pub queue_name: String,
    pub code: String,
    pub waiting_count: u32,
    pub now_serving: Option<String>,
}

/// 候诊区公开看板数据。
#[derive(Debug, Clone)]
pub struct QueueSummary {
    pub practice_id: String,
    pub now_serving: Option<String>,
    pub queues: Vec<QueueSummaryItem>,
}

/// 队列管理器。
pub struct QueueManager {
    queues: Arc<dyn QueueStore>,
    tickets: Arc<dyn TicketStore>,
    practices: Arc<dyn PracticeStore>,
    settings: QueueSettings,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl QueueManager {
    pub fn new(
        queues: Arc<dyn QueueStore>,
        tickets: Arc<dyn TicketStore>,
        practices: Arc<dyn PracticeStore>,
        settings: QueueSettings,
    ) -> Self {
        Self {
            queues,
            tickets,
            practices,
            settings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// 递增队列计数并返回格式化票号。
    pub async fn next_ticket_number(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<String, QueueError> {
        let lock = self.queue_lock(ctx, queue_id).await?;
        let _guard = lock.lock().await;
        let queue = self.active_queue(ctx, queue_id).await?;
        self.increment_locked(ctx, &queue).await
    }

    /// 查找患者在队列中自 `since_ms` 起的活跃票据。
    pub async fn find_active_ticket(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
        patient_id: &str,
        since_ms: i64,
    ) -> Result<Option<TicketRecord>, QueueError> {
        Ok(self
            .tickets
            .find_active_ticket(ctx, queue_id, patient_id, since_ms)
            .await?)
    }

    /// 出票：在队列锁内完成幂等检查、计数递增与插入。
    pub async fn issue_ticket(
        &self,
        ctx: &PracticeContext,
        input: IssueTicket,
    ) -> Result<IssuedTicket, QueueError> {
        let lock = self.queue_lock(ctx, &input.queue_id).await?;
        let _guard = lock.lock().await;
        let queue = self.active_queue(ctx, &input.queue_id).await?;
        let now = now_epoch_ms();

        if let Some(patient_id) = input.patient_id.as_deref() {
            let since = self.day_start(ctx, &queue.practice_id, now).await?;
            if let Some(ticket) = self
                .tickets
                .find_active_ticket(ctx, &queue.queue_id, patient_id, since)
                .await?
            {
                reception_telemetry::record_ticket_resumed();
                info!(
                    target: "reception.queue",
                    queue_id = %queue.queue_id,
                    ticket_id = %ticket.ticket_id,
                    number = %ticket.number,
                    "ticket_resumed"
                );
                return Ok(IssuedTicket {
                    ticket,
                    queue,
                    created: false,
                });
            }
        }

        let waiting_ahead = self
            .tickets
            .list_tickets(ctx, &queue.queue_id)
            .await?
            .iter()
            .filter(|ticket| ticket.status == TicketStatus::Waiting)
            .count() as u32;
        let number = self.increment_locked(ctx, &queue).await?;
        let record = TicketRecord {
            ticket_id: uuid::Uuid::new_v4().to_string(),
            queue_id: queue.queue_id.clone(),
            practice_id: queue.practice_id.clone(),
            patient_id: input.patient_id,
            number,
            status: TicketStatus::Waiting,
            priority: input.priority,
            estimated_wait_minutes: self.estimate_wait(&queue, waiting_ahead),
            created_at_ms: now,
            called_at_ms: None,
            completed_at_ms: None,
            called_by: None,
        };
        let ticket = self.tickets.create_ticket(ctx, record).await?;
        reception_telemetry::record_ticket_issued();
        info!(
            target: "reception.queue",
            queue_id = %queue.queue_id,
            ticket_id = %ticket.ticket_id,
            number = %ticket.number,
            priority = ticket.priority.as_str(),
            "ticket_issued"
        );
        // 计数已在锁内递增，返回最新的队列快照
        let queue = self
            .queues
            .find_queue(ctx, &queue.queue_id)
            .await?
            .unwrap_or(queue);
        Ok(IssuedTicket {
            ticket,
            queue,
            created: true,
        })
    }

    /// 叫号：优先级最高、创建最早的等待票据 WAITING→CALLED。
    pub async fn call_next(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
        called_by: Option<&str>,
    ) -> Result<TicketRecord, QueueError> {
        let lock = self.queue_lock(ctx, queue_id).await?;
        let _guard = lock.lock().await;
        let queue = self
            .queues
            .find_queue(ctx, queue_id)
            .await?
            .ok_or(QueueError::QueueNotFound)?;
        let mut waiting: Vec<TicketRecord> = self
            .tickets
            .list_tickets(ctx, &queue.queue_id)
            .await?
            .into_iter()
            .filter(|ticket| ticket.status == TicketStatus::Waiting)
            .collect();
        sort_by_priority(&mut waiting);
        let next = waiting.into_iter().next().ok_or(QueueError::QueueEmpty)?;
        let ticket = self
            .tickets
            .transition_ticket(
                ctx,
                &next.ticket_id,
                TicketStatus::Waiting,
                TicketStatus::Called,
                now_epoch_ms(),
                called_by,
            )
            .await?
            .ok_or(QueueError::InvalidTransition {
                from: next.status,
                to: TicketStatus::Called,
            })?;
        info!(
            target: "reception.queue",
            queue_id = %queue.queue_id,
            ticket_id = %ticket.ticket_id,
            number = %ticket.number,
            "ticket_called"
        );
        Ok(ticket)
    }

    /// 状态迁移：图外迁移返回 `InvalidTransition`。
    pub async fn transition(
        &self,
        ctx: &PracticeContext,
        ticket_id: &str,
        next: TicketStatus,
        actor: Option<&str>,
    ) -> Result<TicketRecord, QueueError> {
        let current = self
            .tickets
            .find_ticket(ctx, ticket_id)
            .await?
            .ok_or(QueueError::TicketNotFound)?;
        if !current.status.can_transition_to(next) {
            warn!(
                target: "reception.queue",
                ticket_id = %ticket_id,
                from = current.status.as_str(),
                to = next.as_str(),
                "ticket_transition_rejected"
            );
            return Err(QueueError::InvalidTransition {
                from: current.status,
                to: next,
            });
        }
        let ticket = self
            .tickets
            .transition_ticket(ctx, ticket_id, current.status, next, now_epoch_ms(), actor)
            .await?
            .ok_or(QueueError::InvalidTransition {
                from: current.status,
                to: next,
            })?;
        info!(
            target: "reception.queue",
            ticket_id = %ticket.ticket_id,
            from = current.status.as_str(),
            to = next.as_str(),
            "ticket_transitioned"
        );
        Ok(ticket)
    }

    pub async fn find_queue(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<QueueRecord, QueueError> {
        self.queues
            .find_queue(ctx, queue_id)
            .await?
            .ok_or(QueueError::QueueNotFound)
    }

    /// 诊所默认队列：按创建时间的第一个启用队列。
    pub async fn default_queue(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<QueueRecord, QueueError> {
        self.queues
            .list_queues(ctx, practice_id)
            .await?
            .into_iter()
            .find(|queue| queue.is_active)
            .ok_or(QueueError::QueueUnavailable)
    }

    pub async fn find_ticket(
        &self,
        ctx: &PracticeContext,
        ticket_id: &str,
    ) -> Result<TicketRecord, QueueError> {
        self.tickets
            .find_ticket(ctx, ticket_id)
            .await?
            .ok_or(QueueError::TicketNotFound)
    }

    pub async fn find_by_number(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
        number: &str,
    ) -> Result<TicketRecord, QueueError> {
        self.tickets
            .find_ticket_by_number(ctx, queue_id, number)
            .await?
            .ok_or(QueueError::TicketNotFound)
    }

    /// 列出票据（可按状态过滤），按优先级、创建时间排序。
    pub async fn list_tickets(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
        status: Option<TicketStatus>,
    ) -> Result<Vec<TicketRecord>, QueueError> {
        let mut tickets: Vec<TicketRecord> = self
            .tickets
            .list_tickets(ctx, queue_id)
            .await?
            .into_iter()
            .filter(|ticket| status.is_none_or(|status| ticket.status == status))
            .collect();
        sort_by_priority(&mut tickets);
        Ok(tickets)
    }

    pub async fn queue_stats(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<QueueStats, QueueError> {
        let queue = self.find_queue(ctx, queue_id).await?;
        let since = self.day_start(ctx, &queue.practice_id, now_epoch_ms()).await?;
        let tickets = self.tickets.list_tickets(ctx, queue_id).await?;
        let count = |status: TicketStatus| {
            tickets.iter().filter(|ticket| ticket.status == status).count() as u32
        };
        let waiting_count = count(TicketStatus::Waiting);
        let completed_today = tickets
            .iter()
            .filter(|ticket| {
                ticket.status == TicketStatus::Completed
                    && ticket.completed_at_ms.is_some_and(|at| at >= since)
            })
            .count() as u32;
        Ok(QueueStats {
            estimated_wait_minutes: self.estimate_wait(&queue, waiting_count),
            queue_id: queue.queue_id,
            queue_name: queue.name,
            waiting_count,
            called_count: count(TicketStatus::Called),
            in_progress_count: count(TicketStatus::InProgress),
            completed_today,
            current_number: queue.current_number,
        })
    }

    /// 公开看板：各启用队列的等待人数与最近叫到的票号。
    pub async fn public_summary(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<QueueSummary, QueueError> {
        let queues = self.queues.list_queues(ctx, practice_id).await?;
        let mut items = Vec::new();
        let mut latest_call: Option<(i64, String)> = None;
        for queue in queues.into_iter().filter(|queue| queue.is_active) {
            let tickets = self.tickets.list_tickets(ctx, &queue.queue_id).await?;
            let waiting_count = tickets
                .iter()
                .filter(|ticket| ticket.status == TicketStatus::Waiting)
                .count() as u32;
            let serving = tickets
                .iter()
                .filter(|ticket| ticket.status == TicketStatus::Called)
                .filter_map(|ticket| ticket.called_at_ms.map(|at| (at, ticket.number.clone())))
                .max_by_key(|(at, _)| *at);
            if let Some((at, number)) = &serving {
                if latest_call.as_ref().is_none_or(|(latest, _)| at > latest) {
                    latest_call = Some((*at, number.clone()));
                }
            }
            items.push(QueueSummaryItem {
                queue_id: queue.queue_id,
                queue_name: queue.name,
                code: queue.code,
                waiting_count,
                now_serving: serving.map(|(_, number)| number),
            });
        }
        Ok(QueueSummary {
            practice_id: practice_id.to_string(),
            now_serving: latest_call.map(|(_, number)| number),
            queues: items,
        })
    }

    /// 诊所本地日界。
    pub async fn day_start(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        now_ms: i64,
    ) -> Result<i64, QueueError> {
        let offset = self
            .practices
            .find_practice(ctx, practice_id)
            .await?
            .and_then(|practice| practice.utc_offset_minutes)
            .unwrap_or(self.settings.default_utc_offset_minutes);
        Ok(day_start_ms(now_ms, offset))
    }

    fn estimate_wait(&self, queue: &QueueRecord, waiting_ahead: u32) -> u32 {
        queue
            .average_wait_minutes
            .saturating_mul(waiting_ahead)
            .max(self.settings.min_wait_minutes)
    }

    async fn active_queue(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<QueueRecord, QueueError> {
        self.queues
            .find_queue(ctx, queue_id)
            .await?
            .filter(|queue| queue.is_active)
            .ok_or(QueueError::QueueNotFound)
    }

    /// 调用方必须持有该队列的锁。
    async fn increment_locked(
        &self,
        ctx: &PracticeContext,
        queue: &QueueRecord,
    ) -> Result<String, QueueError> {
        let counter = self
            .queues
            .increment_counter(ctx, &queue.queue_id)
            .await?
            .ok_or(QueueError::QueueNotFound)?;
        Ok(format_ticket_number(&queue.code, counter))
    }

    /// 当前持有锁条目的队列数。
    pub fn tracked_queue_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }

    /// 仅为已存在的队列建锁，未知队列 ID 不留下条目。
    async fn queue_lock(
        &self,
        ctx: &PracticeContext,
        queue_id: &str,
    ) -> Result<Arc<tokio::sync::Mutex<()>>, QueueError> {
        if let Some(lock) = self.existing_lock(queue_id)? {
            return Ok(lock);
        }
        self.queues
            .find_queue(ctx, queue_id)
            .await?
            .ok_or(QueueError::QueueNotFound)?;
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| QueueError::Storage("lock failed".to_string()))?;
        Ok(locks
            .entry(queue_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    fn existing_lock(
        &self,
        queue_id: &str,
    ) -> Result<Option<Arc<tokio::sync::Mutex<()>>>, QueueError> {
        let locks = self
            .locks
            .lock()
            .map_err(|_| QueueError::Storage("lock failed".to_string()))?;
        Ok(locks.get(queue_id).cloned())
    }
}

/// EMERGENCY > HIGH > NORMAL，同优先级先到先得；同一毫秒内按票号计数。
fn sort_by_priority(tickets: &mut [TicketRecord]) {
    tickets.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at_ms.cmp(&b.created_at_ms))
            .then(ticket_counter(&a.number).cmp(&ticket_counter(&b.number)))
            .then(a.number.cmp(&b.number))
    });
}

/// 当前时间戳（毫秒）。
fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
