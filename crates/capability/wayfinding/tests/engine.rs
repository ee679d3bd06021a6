use async_trait::async_trait;
use domain::{DeviceCategory, DeviceStatus, LedPattern, PracticeContext, Rgb, SegmentRole};
use reception_bus::{InMemoryBus, Topics};
use reception_storage::{
    DeviceRecord, DeviceStore, InMemoryDeviceStore, InMemoryRouteStore, InMemorySegmentStore,
    RouteRecord, RouteStore, SegmentRecord, SegmentStore,
};
use reception_wayfinding::{
    LedCommandSink, LedTarget, SegmentCommand, WayfindingEngine, WayfindingError,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 记录下发命令的假控制器，`unreachable` 中的控制器一律失败。
#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<(String, Vec<SegmentCommand>)>>,
    unreachable: Mutex<HashSet<String>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<(String, Vec<SegmentCommand>)> {
        self.sent.lock().expect("lock").clone()
    }

    fn off_commands(&self) -> usize {
        self.sent()
            .iter()
            .flat_map(|(_, commands)| commands.iter())
            .filter(|command| !command.on)
            .count()
    }

    fn break_controller(&self, controller_id: &str) {
        self.unreachable
            .lock()
            .expect("lock")
            .insert(controller_id.to_string());
    }
}

#[async_trait]
impl LedCommandSink for RecordingSink {
    async fn send(
        &self,
        target: &LedTarget,
        commands: &[SegmentCommand],
    ) -> Result<(), WayfindingError> {
        if self
            .unreachable
            .lock()
            .expect("lock")
            .contains(&target.controller_id)
        {
            return Err(WayfindingError::ControllerUnreachable(
                target.controller_id.clone(),
            ));
        }
        self.sent
            .lock()
            .expect("lock")
            .push((target.controller_id.clone(), commands.to_vec()));
        Ok(())
    }
}

struct Fixture {
    engine: WayfindingEngine,
    sink: Arc<RecordingSink>,
    bus: Arc<InMemoryBus>,
    ctx: PracticeContext,
}

fn controller(device_id: &str) -> DeviceRecord {
    DeviceRecord {
        device_id: device_id.to_string(),
        practice_id: "practice-1".to_string(),
        category: DeviceCategory::LightingController,
        serial: format!("SN-{}", device_id),
        name: format!("Controller {}", device_id),
        secret_hash: String::new(),
        address: Some(format!("{}.local", device_id)),
        status: DeviceStatus::Online,
        zone_id: None,
        firmware_version: None,
        uptime_seconds: None,
        is_active: true,
        last_seen_at_ms: None,
        created_at_ms: 0,
    }
}

fn segment(segment_id: &str, controller_id: &str, index: u8, role: SegmentRole) -> SegmentRecord {
    let start_led = u32::from(index) * 30;
    SegmentRecord {
        segment_id: segment_id.to_string(),
        practice_id: "practice-1".to_string(),
        zone_id: "zone-wait".to_string(),
        controller_id: controller_id.to_string(),
        index,
        start_led,
        end_led: start_led + 29,
        role,
        default_color: "#FFFFFF".to_string(),
    }
}

async fn fixture() -> Fixture {
    let ctx = PracticeContext::system();
    let devices = Arc::new(InMemoryDeviceStore::new());
    for device_id in ["ctrl-1", "ctrl-2", "ctrl-3"] {
        devices
            .create_device(&ctx, controller(device_id))
            .await
            .expect("device");
    }
    let segments = Arc::new(InMemorySegmentStore::new());
    for record in [
        segment("seg-1", "ctrl-1", 0, SegmentRole::Path),
        segment("seg-2", "ctrl-2", 0, SegmentRole::Path),
        segment("seg-3", "ctrl-3", 0, SegmentRole::Path),
        segment("seg-amb", "ctrl-1", 1, SegmentRole::Ambient),
    ] {
        segments.create_segment(&ctx, record).await.expect("segment");
    }
    let routes = Arc::new(InMemoryRouteStore::new());
    routes
        .create_route(
            &ctx,
            RouteRecord {
                route_id: "route-1".to_string(),
                practice_id: "practice-1".to_string(),
                name: "Eingang zum Wartebereich".to_string(),
                from_zone_id: None,
                to_zone_id: "zone-wait".to_string(),
                segment_ids: vec!["seg-1".into(), "seg-2".into(), "seg-3".into()],
                color: "#00FF00".to_string(),
                pattern: LedPattern::Chase,
                duration_seconds: 30,
                is_active: true,
            },
        )
        .await
        .expect("route");
    routes
        .create_route(
            &ctx,
            RouteRecord {
                route_id: "route-forever".to_string(),
                practice_id: "practice-1".to_string(),
                name: "Dauerlicht".to_string(),
                from_zone_id: None,
                to_zone_id: "zone-wait".to_string(),
                segment_ids: vec!["seg-1".into()],
                color: "#FFFFFF".to_string(),
                pattern: LedPattern::Solid,
                duration_seconds: u64::MAX,
                is_active: true,
            },
        )
        .await
        .expect("route");
    let sink = Arc::new(RecordingSink::default());
    let bus = Arc::new(InMemoryBus::new());
    let engine = WayfindingEngine::new(routes, segments, devices, sink.clone())
        .with_announcer(bus.clone(), Topics::default());
    Fixture {
        engine,
        sink,
        bus,
        ctx,
    }
}

#[tokio::test(start_paused = true)]
async fn partial_activation_when_one_controller_unreachable() {
    let fixture = fixture().await;
    fixture.sink.break_controller("ctrl-2");

    let activation = fixture
        .engine
        .activate_route(&fixture.ctx, "route-1")
        .await
        .expect("activate");

    assert!(activation.partial);
    assert_eq!(activation.lit_segments, vec!["seg-1", "seg-3"]);
    assert_eq!(activation.failed_segments, vec!["seg-2"]);
    let sent = fixture.sink.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(_, commands)| commands[0]
        == SegmentCommand::on(0, Rgb::new(0, 255, 0), 255, LedPattern::Chase)));
    let announced = fixture
        .bus
        .published_json("practice/practice-1/wayfinding/activate");
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0]["routeId"], "route-1");
    assert_eq!(announced[0]["color"], serde_json::json!([0, 255, 0]));
}

#[tokio::test(start_paused = true)]
async fn all_controllers_unreachable_fails() {
    let fixture = fixture().await;
    for controller_id in ["ctrl-1", "ctrl-2", "ctrl-3"] {
        fixture.sink.break_controller(controller_id);
    }
    let err = fixture
        .engine
        .activate_route(&fixture.ctx, "route-1")
        .await
        .expect_err("dispatch");
    assert!(matches!(err, WayfindingError::DispatchFailed(_)));
    assert!(fixture.engine.active_routes(None).is_empty());
}

#[tokio::test(start_paused = true)]
async fn route_switches_off_after_duration() {
    let fixture = fixture().await;
    fixture
        .engine
        .activate_route(&fixture.ctx, "route-1")
        .await
        .expect("activate");
    assert_eq!(fixture.engine.active_routes(Some("practice-1")).len(), 1);

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(fixture.sink.off_commands(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(fixture.sink.off_commands(), 3);
    assert!(fixture.engine.active_routes(None).is_empty());
}

#[tokio::test(start_paused = true)]
async fn huge_duration_saturates_expiry() {
    let fixture = fixture().await;
    let activation = fixture
        .engine
        .activate_route(&fixture.ctx, "route-forever")
        .await
        .expect("activate");
    assert_eq!(activation.expires_at_ms, i64::MAX);

    tokio::time::sleep(Duration::from_secs(3_600)).await;
    assert_eq!(fixture.sink.off_commands(), 0);
    assert_eq!(fixture.engine.active_routes(None).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn manual_deactivation_cancels_timer() {
    let fixture = fixture().await;
    fixture
        .engine
        .activate_route(&fixture.ctx, "route-1")
        .await
        .expect("activate");

    let deactivation = fixture
        .engine
        .deactivate_route(&fixture.ctx, "route-1")
        .await
        .expect("deactivate");
    assert!(deactivation.cancelled_timer);
    assert_eq!(deactivation.segments_off, 3);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fixture.sink.off_commands(), 3);
}

#[tokio::test(start_paused = true)]
async fn reactivation_restarts_timer() {
    let fixture = fixture().await;
    fixture
        .engine
        .activate_route(&fixture.ctx, "route-1")
        .await
        .expect("activate");
    tokio::time::sleep(Duration::from_secs(20)).await;
    fixture
        .engine
        .activate_route(&fixture.ctx, "route-1")
        .await
        .expect("reactivate");

    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(fixture.sink.off_commands(), 0);

    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fixture.sink.off_commands(), 3);
}

#[tokio::test]
async fn inactive_and_unknown_routes_rejected() {
    let fixture = fixture().await;
    let err = fixture
        .engine
        .activate_route(&fixture.ctx, "route-missing")
        .await
        .expect_err("missing");
    assert!(matches!(err, WayfindingError::RouteNotFound));
}

#[tokio::test]
async fn ambient_indicator_only_drives_ambient_segments() {
    let fixture = fixture().await;
    let update = fixture
        .engine
        .update_ambient_indicator(&fixture.ctx, "zone-wait", 25.0)
        .await
        .expect("ambient");

    assert_eq!(update.segments_updated, 1);
    assert_eq!(update.segments_failed, 0);
    assert_eq!(update.color, Rgb::new(0xFF, 0x80, 0x00));
    let sent = fixture.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "ctrl-1");
    assert_eq!(
        sent[0].1,
        vec![SegmentCommand::on(1, Rgb::new(0xFF, 0x80, 0x00), 128, LedPattern::Breathe)]
    );
}

#[tokio::test(start_paused = true)]
async fn all_off_groups_by_controller_and_cancels_routes() {
    let fixture = fixture().await;
    fixture
        .engine
        .activate_route(&fixture.ctx, "route-1")
        .await
        .expect("activate");

    let segments_off = fixture
        .engine
        .set_all_off(&fixture.ctx, "practice-1")
        .await
        .expect("all off");
    assert_eq!(segments_off, 4);
    assert!(fixture.engine.active_routes(None).is_empty());

    let off_requests: Vec<_> = fixture
        .sink
        .sent()
        .into_iter()
        .filter(|(_, commands)| commands.iter().all(|command| !command.on))
        .collect();
    assert_eq!(off_requests.len(), 3);
    let ctrl_1 = off_requests
        .iter()
        .find(|(controller_id, _)| controller_id == "ctrl-1")
        .expect("ctrl-1");
    assert_eq!(ctrl_1.1.len(), 2);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(fixture.sink.off_commands(), 4);
}

#[tokio::test]
async fn direct_command_requires_known_controller() {
    let fixture = fixture().await;
    fixture
        .engine
        .send_segment_command(
            &fixture.ctx,
            "practice-1",
            "ctrl-3",
            SegmentCommand::on(0, Rgb::new(0, 0, 255), 255, LedPattern::Solid),
        )
        .await
        .expect("command");
    let err = fixture
        .engine
        .send_segment_command(
            &fixture.ctx,
            "practice-2",
            "ctrl-3",
            SegmentCommand::off(0),
        )
        .await
        .expect_err("wrong practice");
    assert!(matches!(err, WayfindingError::ControllerNotFound));
}
