//! 签到服务入口：装配依赖、启动后台任务与 HTTP/WebSocket 服务。

use reception_api::{AppState, Stores, bus_bridge, create_router, fixtures};
use reception_auth::DeviceRegistry;
use reception_bus::{CommandBus, InMemoryBus, MqttBusConfig, MqttCommandBus, Topics};
use reception_checkin::{NoopNotifier, Notifier, WebhookNotifier};
use reception_config::{AppConfig, LedTransport};
use reception_telemetry::init_tracing;
use reception_wayfinding::{BusLedSink, LedCommandSink, WledHttpSink};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing();

    let topics = Topics::new(config.mqtt_topic_root.clone());

    // 命令总线：启用 MQTT 时连接 broker，否则使用进程内总线
    let bus: Arc<dyn CommandBus> = if config.mqtt_enabled {
        let (bus, _event_loop) = MqttCommandBus::connect(MqttBusConfig {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            qos: config.mqtt_qos,
            reconnect_initial_ms: config.mqtt_reconnect_initial_ms,
            reconnect_max_ms: config.mqtt_reconnect_max_ms,
            request_capacity: config.mqtt_request_capacity,
            publish_timeout_ms: config.mqtt_publish_timeout_ms,
        });
        Arc::new(bus)
    } else {
        Arc::new(InMemoryBus::new())
    };

    let sink: Arc<dyn LedCommandSink> = match config.led_transport {
        LedTransport::Http => Arc::new(WledHttpSink::new(config.led_http_timeout_ms)?),
        LedTransport::Bus => Arc::new(BusLedSink::new(bus.clone(), topics.clone())),
    };

    let notifier: Arc<dyn Notifier> = match config.push_webhook_url.as_deref() {
        Some(url) => Arc::new(WebhookNotifier::new(
            url,
            config.push_webhook_secret.clone(),
            config.led_http_timeout_ms,
        )?),
        None => Arc::new(NoopNotifier),
    };

    let stores = Stores::in_memory();
    let state = AppState::build(&config, &stores, bus.clone(), sink, notifier)?;

    if let Some(path) = config.fixture_path.as_deref() {
        fixtures::load_file(path, &stores, &state.credentials).await?;
    }

    bus_bridge::start(
        bus.clone(),
        topics,
        state.checkin.clone(),
        state.registry.clone(),
    )
    .await?;

    // 后台任务：WebSocket 心跳、等待时间刷新、离线设备扫描
    state
        .broadcaster
        .clone()
        .run_heartbeat(Duration::from_secs(config.ws_heartbeat_seconds.max(1)));
    state
        .visualizer
        .clone()
        .spawn(Duration::from_secs(config.wait_time_interval_seconds));
    spawn_offline_sweep(state.registry.clone(), config.device_offline_after_seconds);

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(
        target: "reception.api",
        addr = %config.http_addr,
        mqtt = config.mqtt_enabled,
        "server_started"
    );
    axum::serve(listener, app).await?;
    Ok(())
}

/// 周期性把超过阈值未上报心跳的设备标记为离线；阈值为 0 时不启动。
fn spawn_offline_sweep(registry: Arc<DeviceRegistry>, offline_after_seconds: u64) {
    if offline_after_seconds == 0 {
        return;
    }
    let period = Duration::from_secs((offline_after_seconds / 2).max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = registry
                .mark_stale_offline(now_epoch_ms(), offline_after_seconds)
                .await
            {
                warn!(target: "reception.api", error = %err, "offline_sweep_failed");
            }
        }
    });
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or_default()
}
