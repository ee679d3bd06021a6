//! 导引引擎
//!
//! 路线点亮、定时熄灭与环境灯的唯一入口。

use crate::WayfindingError;
use crate::command::{AMBIENT_BRIGHTNESS, ROUTE_BRIGHTNESS, SegmentCommand, ambient_color};
use crate::scheduler::{ActiveRoute, DeactivationScheduler};
use crate::sink::{LedCommandSink, LedTarget};
use domain::{DeviceCategory, LedPattern, PracticeContext, Rgb, SegmentRole};
use futures::future::join_all;
use reception_bus::{CommandBus, Topics};
use reception_storage::{DeviceStore, RouteRecord, RouteStore, SegmentRecord, SegmentStore};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// 路线未配置时长时的默认点亮时长（秒）。
const DEFAULT_ROUTE_SECONDS: u64 = 30;

/// 路线点亮结果。
#[derive(Debug, Clone)]
pub struct RouteActivation {
    pub route_id: String,
    pub practice_id: String,
    pub lit_segments: Vec<String>,
    pub failed_segments: Vec<String>,
    pub partial: bool,
    pub expires_at_ms: i64,
}

#[derive(Debug, Clone)]
pub struct RouteDeactivation {
    pub route_id: String,
    pub segments_off: usize,
    /// 是否中止了待执行的定时熄灭
    pub cancelled_timer: bool,
}

/// 环境灯更新结果。
#[derive(Debug, Clone)]
pub struct AmbientUpdate {
    pub zone_id: String,
    pub color: Rgb,
    pub segments_updated: usize,
    pub segments_failed: usize,
}

/// 导引引擎。
#[derive(Clone)]
pub struct WayfindingEngine {
    routes: Arc<dyn RouteStore>,
    segments: Arc<dyn SegmentStore>,
    devices: Arc<dyn DeviceStore>,
    sink: Arc<dyn LedCommandSink>,
    announcer: Option<(Arc<dyn CommandBus>, Topics)>,
    scheduler: Arc<DeactivationScheduler>,
}

impl WayfindingEngine {
    pub fn new(
        routes: Arc<dyn RouteStore>,
        segments: Arc<dyn SegmentStore>,
        devices: Arc<dyn DeviceStore>,
        sink: Arc<dyn LedCommandSink>,
    ) -> Self {
        Self {
            routes,
            segments,
            devices,
            sink,
            announcer: None,
            scheduler: Arc::new(DeactivationScheduler::new()),
        }
    }

    /// 点亮时在 `{root}/{practice}/wayfinding/activate` 上广播路线。
    pub fn with_announcer(mut self, bus: Arc<dyn CommandBus>, topics: Topics) -> Self {
        self.announcer = Some((bus, topics));
        self
    }

    /// 点亮路线：每个灯段独立并行下发，并安排定时熄灭。
    ///
    /// 部分灯段失败时返回 `partial = true`；全部失败返回 `DispatchFailed`。
    pub async fn activate_route(
        &self,
        ctx: &PracticeContext,
        route_id: &str,
    ) -> Result<RouteActivation, WayfindingError> {
        let route = self
            .routes
            .find_route(ctx, route_id)
            .await?
            .ok_or(WayfindingError::RouteNotFound)?;
        if !route.is_active {
            return Err(WayfindingError::RouteInactive);
        }
        let color = Rgb::from_hex(&route.color)
            .ok_or_else(|| WayfindingError::InvalidColor(route.color.clone()))?;

        let pattern = route.pattern;
        let results = join_all(route.segment_ids.iter().map(|segment_id| async move {
            let outcome = self.light_segment(ctx, segment_id, color, pattern).await;
            (segment_id.clone(), outcome)
        }))
        .await;

        let mut lit_segments = Vec::new();
        let mut failed_segments = Vec::new();
        for (segment_id, outcome) in results {
            match outcome {
                Ok(()) => lit_segments.push(segment_id),
                Err(err) => {
                    reception_telemetry::record_segment_dispatch_failure();
                    warn!(
                        target: "reception.wayfinding",
                        route_id = %route.route_id,
                        segment_id = %segment_id,
                        error = %err,
                        "segment_dispatch_failed"
                    );
                    failed_segments.push(segment_id);
                }
            }
        }
        if lit_segments.is_empty() {
            return Err(WayfindingError::DispatchFailed(format!(
                "no segment of route {} could be lit",
                route.route_id
            )));
        }

        self.announce(&route, color).await;
        let seconds = match route.duration_seconds {
            0 => DEFAULT_ROUTE_SECONDS,
            seconds => seconds,
        };
        let expires_at_ms = now_epoch_ms().saturating_add(seconds_to_ms(seconds));
        self.schedule_deactivation(&route, expires_at_ms, Duration::from_secs(seconds));

        reception_telemetry::record_route_activation();
        info!(
            target: "reception.wayfinding",
            practice_id = %route.practice_id,
            route_id = %route.route_id,
            lit = lit_segments.len(),
            failed = failed_segments.len(),
            duration_seconds = seconds,
            "route_activated"
        );
        Ok(RouteActivation {
            route_id: route.route_id,
            practice_id: route.practice_id,
            partial: !failed_segments.is_empty(),
            lit_segments,
            failed_segments,
            expires_at_ms,
        })
    }

    /// 手动熄灭路线，同时中止待执行的定时熄灭。
    pub async fn deactivate_route(
        &self,
        ctx: &PracticeContext,
        route_id: &str,
    ) -> Result<RouteDeactivation, WayfindingError> {
        let route = self
            .routes
            .find_route(ctx, route_id)
            .await?
            .ok_or(WayfindingError::RouteNotFound)?;
        let cancelled_timer = self.scheduler.cancel(route_id);
        let segments_off = self.switch_off(ctx, &route).await;
        info!(
            target: "reception.wayfinding",
            practice_id = %route.practice_id,
            route_id = %route.route_id,
            segments_off,
            cancelled_timer,
            "route_deactivated"
        );
        Ok(RouteDeactivation {
            route_id: route.route_id,
            segments_off,
            cancelled_timer,
        })
    }

    /// 按平均等待时间驱动区域的环境灯段（低亮度呼吸效果）。
    pub async fn update_ambient_indicator(
        &self,
        ctx: &PracticeContext,
        zone_id: &str,
        average_wait_minutes: f64,
    ) -> Result<AmbientUpdate, WayfindingError> {
        let color = ambient_color(average_wait_minutes);
        let segments: Vec<SegmentRecord> = self
            .segments
            .list_zone_segments(ctx, zone_id)
            .await?
            .into_iter()
            .filter(|segment| segment.role == SegmentRole::Ambient)
            .collect();
        let results = join_all(segments.iter().map(|segment| async move {
            let target = self.resolve_target(ctx, segment).await?;
            let command =
                SegmentCommand::on(segment.index, color, AMBIENT_BRIGHTNESS, LedPattern::Breathe);
            self.sink.send(&target, &[command]).await
        }))
        .await;
        let segments_failed = results.iter().filter(|result| result.is_err()).count();
        for err in results.iter().filter_map(|result| result.as_ref().err()) {
            reception_telemetry::record_segment_dispatch_failure();
            warn!(
                target: "reception.wayfinding",
                zone_id = %zone_id,
                error = %err,
                "ambient_dispatch_failed"
            );
        }
        Ok(AmbientUpdate {
            zone_id: zone_id.to_string(),
            color,
            segments_updated: results.len() - segments_failed,
            segments_failed,
        })
    }

    /// 员工直接下发单段命令。
    pub async fn send_segment_command(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
        controller_id: &str,
        command: SegmentCommand,
    ) -> Result<(), WayfindingError> {
        let device = self
            .devices
            .find_device(ctx, controller_id)
            .await?
            .filter(|device| {
                device.practice_id == practice_id
                    && device.category == DeviceCategory::LightingController
                    && device.is_active
            })
            .ok_or(WayfindingError::ControllerNotFound)?;
        let target = LedTarget {
            practice_id: device.practice_id,
            controller_id: device.device_id,
            address: device.address,
        };
        self.sink.send(&target, &[command]).await
    }

    /// 熄灭诊所所有启用控制器上的全部灯段，返回成功熄灭的段数。
    pub async fn set_all_off(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<usize, WayfindingError> {
        let cancelled = self.scheduler.cancel_practice(practice_id);
        let mut by_controller: BTreeMap<String, Vec<SegmentRecord>> = BTreeMap::new();
        for segment in self.segments.list_segments(ctx, practice_id).await? {
            by_controller
                .entry(segment.controller_id.clone())
                .or_default()
                .push(segment);
        }
        let results = join_all(by_controller.values().map(|segments| async move {
            let target = self.resolve_target(ctx, &segments[0]).await?;
            let commands: Vec<SegmentCommand> = segments
                .iter()
                .map(|segment| SegmentCommand::off(segment.index))
                .collect();
            self.sink.send(&target, &commands).await?;
            Ok::<usize, WayfindingError>(commands.len())
        }))
        .await;
        let mut segments_off = 0;
        for result in results {
            match result {
                Ok(count) => segments_off += count,
                Err(WayfindingError::ControllerNotFound) => {}
                Err(err) => {
                    reception_telemetry::record_segment_dispatch_failure();
                    warn!(
                        target: "reception.wayfinding",
                        practice_id = %practice_id,
                        error = %err,
                        "all_off_dispatch_failed"
                    );
                }
            }
        }
        info!(
            target: "reception.wayfinding",
            practice_id = %practice_id,
            segments_off,
            cancelled_routes = cancelled.len(),
            "all_segments_off"
        );
        Ok(segments_off)
    }

    /// 当前点亮中的路线及其到期时间。
    pub fn active_routes(&self, practice_id: Option<&str>) -> Vec<ActiveRoute> {
        self.scheduler.active(practice_id)
    }

    async fn light_segment(
        &self,
        ctx: &PracticeContext,
        segment_id: &str,
        color: Rgb,
        pattern: LedPattern,
    ) -> Result<(), WayfindingError> {
        let segment = self
            .segments
            .find_segment(ctx, segment_id)
            .await?
            .ok_or_else(|| {
                WayfindingError::DispatchFailed(format!("segment {} not found", segment_id))
            })?;
        let target = self.resolve_target(ctx, &segment).await?;
        let command = SegmentCommand::on(segment.index, color, ROUTE_BRIGHTNESS, pattern);
        self.sink.send(&target, &[command]).await
    }

    /// 灯段所属控制器必须是启用的灯控设备。
    async fn resolve_target(
        &self,
        ctx: &PracticeContext,
        segment: &SegmentRecord,
    ) -> Result<LedTarget, WayfindingError> {
        let device = self
            .devices
            .find_device(ctx, &segment.controller_id)
            .await?
            .filter(|device| {
                device.is_active
                    && device.category == DeviceCategory::LightingController
                    && device.practice_id == segment.practice_id
            })
            .ok_or(WayfindingError::ControllerNotFound)?;
        Ok(LedTarget {
            practice_id: device.practice_id,
            controller_id: device.device_id,
            address: device.address,
        })
    }

    /// 熄灭路线的全部灯段，返回成功熄灭的段数。
    async fn switch_off(&self, ctx: &PracticeContext, route: &RouteRecord) -> usize {
        let results = join_all(route.segment_ids.iter().map(|segment_id| async move {
            let segment = self
                .segments
                .find_segment(ctx, segment_id)
                .await?
                .ok_or_else(|| {
                    WayfindingError::DispatchFailed(format!("segment {} not found", segment_id))
                })?;
            let target = self.resolve_target(ctx, &segment).await?;
            self.sink
                .send(&target, &[SegmentCommand::off(segment.index)])
                .await
        }))
        .await;
        let mut segments_off = 0;
        for result in results {
            match result {
                Ok(()) => segments_off += 1,
                Err(err) => {
                    reception_telemetry::record_segment_dispatch_failure();
                    warn!(
                        target: "reception.wayfinding",
                        route_id = %route.route_id,
                        error = %err,
                        "segment_off_failed"
                    );
                }
            }
        }
        segments_off
    }

    fn schedule_deactivation(&self, route: &RouteRecord, expires_at_ms: i64, delay: Duration) {
        let generation = self.scheduler.next_generation();
        let engine = self.clone();
        let timed_route = route.clone();
        self.scheduler.schedule(
            ActiveRoute {
                route_id: route.route_id.clone(),
                practice_id: route.practice_id.clone(),
                expires_at_ms,
            },
            generation,
            delay,
            async move {
                if !engine.scheduler.claim(&timed_route.route_id, generation) {
                    return;
                }
                let ctx = PracticeContext::system().scoped_to(&timed_route.practice_id);
                let segments_off = engine.switch_off(&ctx, &timed_route).await;
                info!(
                    target: "reception.wayfinding",
                    practice_id = %timed_route.practice_id,
                    route_id = %timed_route.route_id,
                    segments_off,
                    "route_expired"
                );
            },
        );
    }

    async fn announce(&self, route: &RouteRecord, color: Rgb) {
        let Some((bus, topics)) = &self.announcer else {
            return;
        };
        let segments: Vec<serde_json::Value> = route
            .segment_ids
            .iter()
            .map(|segment_id| json!({ "segmentId": segment_id }))
            .collect();
        let payload = json!({
            "routeId": route.route_id,
            "routeName": route.name,
            "color": color.to_array(),
            "pattern": route.pattern.as_str(),
            "duration": route.duration_seconds,
            "segments": segments,
            "timestamp": now_epoch_ms(),
        });
        if let Err(err) = bus
            .publish(&topics.wayfinding_activate(&route.practice_id), &payload)
            .await
        {
            warn!(
                target: "reception.wayfinding",
                route_id = %route.route_id,
                error = %err,
                "route_announce_failed"
            );
        }
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn seconds_to_ms(seconds: u64) -> i64 {
    i64::try_from(seconds)
        .unwrap_or(i64::MAX)
        .saturating_mul(1000)
}
