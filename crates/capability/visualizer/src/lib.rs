//! 等待时间可视化
//!
//! 周期性统计每个候诊区的等待情况，驱动区域环境灯、写入等待时间日志，
//! 并向作用域和 `wait_times` 主题广播 `wait_time.update`。

use api_contract::{EventEnvelope, EventType};
use domain::{PracticeContext, TicketStatus, ZoneType};
use reception_realtime::{Broadcaster, timestamp_now};
use reception_storage::{
    PracticeStore, QueueStore, TicketStore, WaitTimeLogRecord, WaitTimeLogStore, ZoneStore,
};
use reception_wayfinding::{WayfindingEngine, ambient_color};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// 等待时间广播主题。
pub const WAIT_TIMES_TOPIC: &str = "wait_times";

#[derive(Debug, thiserror::Error)]
pub enum VisualizerError {
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reception_storage::StorageError> for VisualizerError {
    fn from(err: reception_storage::StorageError) -> Self {
        VisualizerError::Storage(err.to_string())
    }
}

/// 区域等待状态（按最长等待判断）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Ok,
    Warning,
    Critical,
}

impl WaitStatus {
    pub fn from_max_wait(max_wait_minutes: u32) -> Self {
        match max_wait_minutes {
            0..10 => WaitStatus::Ok,
            10..20 => WaitStatus::Warning,
            _ => WaitStatus::Critical,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WaitStatus::Ok => "OK",
            WaitStatus::Warning => "WARNING",
            WaitStatus::Critical => "CRITICAL",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            WaitStatus::Ok => "#00FF00",
            WaitStatus::Warning => "#FFFF00",
            WaitStatus::Critical => "#FF0000",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ZoneWaitTime {
    pub zone_id: String,
    pub zone_name: String,
    pub patient_count: u32,
    pub average_wait_minutes: f64,
    pub max_wait_minutes: u32,
    pub status: WaitStatus,
}

#[derive(Debug, Clone)]
pub struct WaitTimeOverview {
    pub practice_id: String,
    pub zones: Vec<ZoneWaitTime>,
    pub total_waiting: u32,
    pub average_wait_minutes: f64,
    pub updated_at_ms: i64,
}

pub struct WaitTimeVisualizer {
    practices: Arc<dyn PracticeStore>,
    zones: Arc<dyn ZoneStore>,
    queues: Arc<dyn QueueStore>,
    tickets: Arc<dyn TicketStore>,
    logs: Arc<dyn WaitTimeLogStore>,
    wayfinding: Option<WayfindingEngine>,
    broadcaster: Arc<Broadcaster>,
}

impl WaitTimeVisualizer {
    pub fn new(
        practices: Arc<dyn PracticeStore>,
        zones: Arc<dyn ZoneStore>,
        queues: Arc<dyn QueueStore>,
        tickets: Arc<dyn TicketStore>,
        logs: Arc<dyn WaitTimeLogStore>,
        broadcaster: Arc<Broadcaster>,
    ) -> Self {
        Self {
            practices,
            zones,
            queues,
            tickets,
            logs,
            wayfinding: None,
            broadcaster,
        }
    }

    pub fn with_wayfinding(mut self, engine: WayfindingEngine) -> Self {
        self.wayfinding = Some(engine);
        self
    }

    /// 诊所各候诊区的当前等待情况。
    pub async fn overview(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<WaitTimeOverview, VisualizerError> {
        let now = now_epoch_ms();
        let queues = self.queues.list_queues(ctx, practice_id).await?;
        let mut zones = Vec::new();
        let mut total_waiting = 0u32;
        let mut total_minutes = 0u64;

        for zone in self.zones.list_zones(ctx, practice_id).await? {
            if !zone.is_active || zone.zone_type != ZoneType::Waiting {
                continue;
            }
            let mut waits: Vec<u32> = Vec::new();
            let zone_queues = queues.iter().filter(|queue| {
                queue.is_active && queue.zone_id.as_deref() == Some(zone.zone_id.as_str())
            });
            for queue in zone_queues {
                waits.extend(
                    self.tickets
                        .list_tickets(ctx, &queue.queue_id)
                        .await?
                        .iter()
                        .filter(|ticket| ticket.status == TicketStatus::Waiting)
                        .map(|ticket| ((now - ticket.created_at_ms).max(0) / 60_000) as u32),
                );
            }
            let sum: u64 = waits.iter().map(|minutes| u64::from(*minutes)).sum();
            let max_wait_minutes = waits.iter().copied().max().unwrap_or(0);
            total_waiting += waits.len() as u32;
            total_minutes += sum;
            zones.push(ZoneWaitTime {
                zone_id: zone.zone_id,
                zone_name: zone.name,
                patient_count: waits.len() as u32,
                average_wait_minutes: average(sum, waits.len()),
                max_wait_minutes,
                status: WaitStatus::from_max_wait(max_wait_minutes),
            });
        }

        Ok(WaitTimeOverview {
            practice_id: practice_id.to_string(),
            zones,
            total_waiting,
            average_wait_minutes: average(total_minutes, total_waiting as usize),
            updated_at_ms: now,
        })
    }

    /// 执行一轮：所有启用诊所的候诊区。返回处理的区域数。
    pub async fn run_once(&self) -> Result<usize, VisualizerError> {
        let system = PracticeContext::system();
        let mut processed = 0;
        for practice in self.practices.list_practices(&system).await? {
            if !practice.is_active {
                continue;
            }
            let ctx = system.scoped_to(&practice.practice_id);
            let overview = self.overview(&ctx, &practice.practice_id).await?;
            for zone in &overview.zones {
                self.publish_zone(&ctx, &practice.practice_id, zone, overview.updated_at_ms)
                    .await;
                processed += 1;
            }
        }
        debug!(target: "reception.visualizer", zones = processed, "wait_times_updated");
        Ok(processed)
    }

    /// 周期任务；`period` 为 0 时不启动。
    pub fn spawn(self: Arc<Self>, period: Duration) -> Option<JoinHandle<()>> {
        if period.is_zero() {
            return None;
        }
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(err) = self.run_once().await {
                    warn!(target: "reception.visualizer", error = %err, "wait_time_cycle_failed");
                }
            }
        }))
    }

    async fn publish_zone(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        zone: &ZoneWaitTime,
        recorded_at_ms: i64,
    ) {
        let color = ambient_color(zone.average_wait_minutes);
        if let Some(engine) = &self.wayfinding {
            if let Err(err) = engine
                .update_ambient_indicator(ctx, &zone.zone_id, zone.average_wait_minutes)
                .await
            {
                warn!(
                    target: "reception.visualizer",
                    zone_id = %zone.zone_id,
                    error = %err,
                    "ambient_update_failed"
                );
            }
        }

        let log = WaitTimeLogRecord {
            log_id: uuid::Uuid::new_v4().to_string(),
            practice_id: practice_id.to_string(),
            zone_id: zone.zone_id.clone(),
            waiting_count: zone.patient_count,
            average_wait_minutes: zone.average_wait_minutes,
            max_wait_minutes: zone.max_wait_minutes,
            color: color.to_hex(),
            recorded_at_ms,
        };
        if let Err(err) = self.logs.append_log(ctx, log).await {
            warn!(
                target: "reception.visualizer",
                zone_id = %zone.zone_id,
                error = %err,
                "wait_time_log_failed"
            );
        }

        let event = EventEnvelope::new(
            EventType::WaitTimeUpdate,
            json!({
                "zoneId": zone.zone_id,
                "zoneName": zone.zone_name,
                "patientCount": zone.patient_count,
                "averageWaitMinutes": zone.average_wait_minutes,
                "maxWaitMinutes": zone.max_wait_minutes,
                "status": zone.status.as_str(),
                "color": color.to_hex(),
            }),
            timestamp_now(),
        );
        self.broadcaster.broadcast_to_scope(practice_id, &event).await;
        self.broadcaster
            .broadcast_to_topic(practice_id, WAIT_TIMES_TOPIC, &event)
            .await;
    }
}

/// 平均值，保留一位小数。
fn average(total: u64, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    ((total as f64 / count as f64) * 10.0).round() / 10.0
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_max_wait() {
        assert_eq!(WaitStatus::from_max_wait(0), WaitStatus::Ok);
        assert_eq!(WaitStatus::from_max_wait(9), WaitStatus::Ok);
        assert_eq!(WaitStatus::from_max_wait(10), WaitStatus::Warning);
        assert_eq!(WaitStatus::from_max_wait(19), WaitStatus::Warning);
        assert_eq!(WaitStatus::from_max_wait(20), WaitStatus::Critical);
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        assert_eq!(average(10, 3), 3.3);
        assert_eq!(average(0, 0), 0.0);
    }
}
