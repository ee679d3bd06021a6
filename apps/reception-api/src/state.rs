//! 应用状态与依赖装配。
//!
//! 存储统一使用内存实现；持久化引擎由外部协作方提供时，
//! 只需替换 `Stores` 中对应的 trait 实现。

use reception_auth::{DeviceRegistry, StaffTokenVerifier};
use reception_bus::{CommandBus, Topics};
use reception_checkin::{CheckInDeps, CheckInOrchestrator, Notifier};
use reception_config::AppConfig;
use reception_credential::{CredentialError, CredentialResolver, IdentifierCipher, LookupHasher};
use reception_queue::{QueueManager, QueueSettings};
use reception_realtime::Broadcaster;
use reception_storage::{
    InMemoryCheckInEventStore, InMemoryCredentialStore, InMemoryDeviceCommandStore,
    InMemoryDeviceStore, InMemoryPatientDirectory, InMemoryPracticeStore, InMemoryQueueStore,
    InMemoryRouteStore, InMemorySegmentStore, InMemoryTicketStore, InMemoryWaitTimeLogStore,
    InMemoryZoneStore,
};
use reception_visualizer::WaitTimeVisualizer;
use reception_wayfinding::{LedCommandSink, WayfindingEngine};
use std::sync::Arc;

/// 全部实体存储。
#[derive(Clone)]
pub struct Stores {
    pub practices: Arc<InMemoryPracticeStore>,
    pub patients: Arc<InMemoryPatientDirectory>,
    pub devices: Arc<InMemoryDeviceStore>,
    pub commands: Arc<InMemoryDeviceCommandStore>,
    pub zones: Arc<InMemoryZoneStore>,
    pub segments: Arc<InMemorySegmentStore>,
    pub routes: Arc<InMemoryRouteStore>,
    pub credentials: Arc<InMemoryCredentialStore>,
    pub queues: Arc<InMemoryQueueStore>,
    pub tickets: Arc<InMemoryTicketStore>,
    pub events: Arc<InMemoryCheckInEventStore>,
    pub wait_logs: Arc<InMemoryWaitTimeLogStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            practices: Arc::new(InMemoryPracticeStore::new()),
            patients: Arc::new(InMemoryPatientDirectory::new()),
            devices: Arc::new(InMemoryDeviceStore::new()),
            commands: Arc::new(InMemoryDeviceCommandStore::new()),
            zones: Arc::new(InMemoryZoneStore::new()),
            segments: Arc::new(InMemorySegmentStore::new()),
            routes: Arc::new(InMemoryRouteStore::new()),
            credentials: Arc::new(InMemoryCredentialStore::new()),
            queues: Arc::new(InMemoryQueueStore::new()),
            tickets: Arc::new(InMemoryTicketStore::new()),
            events: Arc::new(InMemoryCheckInEventStore::new()),
            wait_logs: Arc::new(InMemoryWaitTimeLogStore::new()),
        }
    }
}

/// handlers 共享的应用状态。
#[derive(Clone)]
pub struct AppState {
    pub staff_tokens: Arc<StaffTokenVerifier>,
    pub registry: Arc<DeviceRegistry>,
    pub credentials: Arc<CredentialResolver>,
    pub queues: Arc<QueueManager>,
    pub wayfinding: WayfindingEngine,
    pub broadcaster: Arc<Broadcaster>,
    pub checkin: Arc<CheckInOrchestrator>,
    pub visualizer: Arc<WaitTimeVisualizer>,
}

impl AppState {
    /// 按配置装配各能力组件。
    ///
    /// 命令总线、LED 下发通道与通知协作方由调用方选择后传入。
    pub fn build(
        config: &AppConfig,
        stores: &Stores,
        bus: Arc<dyn CommandBus>,
        sink: Arc<dyn LedCommandSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CredentialError> {
        let topics = Topics::new(config.mqtt_topic_root.clone());
        let hasher = LookupHasher::new(config.credential_lookup_key.as_bytes())?;
        let cipher = IdentifierCipher::from_base64(&config.credential_encryption_key)?;

        let registry = Arc::new(DeviceRegistry::new(
            stores.devices.clone(),
            stores.commands.clone(),
        ));
        let credentials = Arc::new(CredentialResolver::new(
            stores.credentials.clone(),
            stores.patients.clone(),
            hasher,
            cipher,
        ));
        let queues = Arc::new(QueueManager::new(
            stores.queues.clone(),
            stores.tickets.clone(),
            stores.practices.clone(),
            QueueSettings {
                min_wait_minutes: config.ticket_min_wait_minutes,
                default_utc_offset_minutes: config.default_utc_offset_minutes,
            },
        ));
        let broadcaster = Arc::new(
            Broadcaster::new(config.ws_client_buffer).with_bus_mirror(bus.clone(), topics.clone()),
        );
        let wayfinding = WayfindingEngine::new(
            stores.routes.clone(),
            stores.segments.clone(),
            stores.devices.clone(),
            sink,
        )
        .with_announcer(bus, topics);
        let checkin = Arc::new(CheckInOrchestrator::new(CheckInDeps {
            registry: registry.clone(),
            credentials: credentials.clone(),
            patients: stores.patients.clone(),
            queues: queues.clone(),
            routes: stores.routes.clone(),
            zones: stores.zones.clone(),
            events: stores.events.clone(),
            wayfinding: Some(wayfinding.clone()),
            broadcaster: broadcaster.clone(),
            notifier,
        }));
        let visualizer = Arc::new(
            WaitTimeVisualizer::new(
                stores.practices.clone(),
                stores.zones.clone(),
                stores.queues.clone(),
                stores.tickets.clone(),
                stores.wait_logs.clone(),
                broadcaster.clone(),
            )
            .with_wayfinding(wayfinding.clone()),
        );

        Ok(Self {
            staff_tokens: Arc::new(StaffTokenVerifier::new(config.jwt_secret.clone())),
            registry,
            credentials,
            queues,
            wayfinding,
            broadcaster,
            checkin,
            visualizer,
        })
    }
}
