use domain::{DeviceCategory, DeviceStatus, PracticeContext};
use reception_storage::{
    DeviceCommandStore, DeviceRecord, DeviceStore, DeviceUpdate, InMemoryDeviceCommandStore,
    InMemoryDeviceStore, PendingCommandRecord,
};
use serde_json::json;

fn device(device_id: &str, practice_id: &str, serial: &str) -> DeviceRecord {
    DeviceRecord {
        device_id: device_id.to_string(),
        practice_id: practice_id.to_string(),
        category: DeviceCategory::Reader,
        serial: serial.to_string(),
        name: format!("Reader {}", serial),
        secret_hash: "hash".to_string(),
        address: None,
        status: DeviceStatus::Online,
        zone_id: None,
        firmware_version: None,
        uptime_seconds: None,
        is_active: true,
        last_seen_at_ms: Some(1_000),
        created_at_ms: 1_000,
    }
}

#[tokio::test]
async fn serial_is_unique_across_practices() {
    let store = InMemoryDeviceStore::new();
    let ctx = PracticeContext::system();
    store
        .create_device(&ctx, device("dev-1", "practice-1", "SN-1"))
        .await
        .expect("create");
    let err = store
        .create_device(&ctx, device("dev-2", "practice-2", "SN-1"))
        .await
        .expect_err("duplicate serial");
    assert_eq!(err.message(), "device serial exists");
}

#[tokio::test]
async fn scoped_context_cannot_see_other_practice() {
    let store = InMemoryDeviceStore::new();
    store
        .create_device(&PracticeContext::system(), device("dev-1", "practice-1", "SN-1"))
        .await
        .expect("create");

    let other = PracticeContext::system().scoped_to("practice-2");
    let found = store.find_device(&other, "dev-1").await.expect("find");
    assert!(found.is_none());
    assert!(store.list_devices(&other, "practice-1").await.is_err());

    let own = PracticeContext::system().scoped_to("practice-1");
    let found = store.find_device(&own, "dev-1").await.expect("find");
    assert!(found.is_some());
}

#[tokio::test]
async fn update_applies_only_given_fields() {
    let store = InMemoryDeviceStore::new();
    let ctx = PracticeContext::system();
    store
        .create_device(&ctx, device("dev-1", "practice-1", "SN-1"))
        .await
        .expect("create");
    let updated = store
        .update_device(
            &ctx,
            "dev-1",
            DeviceUpdate {
                status: Some(DeviceStatus::Maintenance),
                firmware_version: Some("1.2.0".to_string()),
                ..DeviceUpdate::default()
            },
        )
        .await
        .expect("update")
        .expect("device");
    assert_eq!(updated.status, DeviceStatus::Maintenance);
    assert_eq!(updated.firmware_version.as_deref(), Some("1.2.0"));
    assert_eq!(updated.name, "Reader SN-1");

    let missing = store
        .update_device(&ctx, "dev-x", DeviceUpdate::default())
        .await
        .expect("update");
    assert!(missing.is_none());
}

#[tokio::test]
async fn stale_online_devices_go_offline() {
    let store = InMemoryDeviceStore::new();
    let ctx = PracticeContext::system();
    store
        .create_device(&ctx, device("dev-1", "practice-1", "SN-1"))
        .await
        .expect("create");
    let mut fresh = device("dev-2", "practice-1", "SN-2");
    fresh.last_seen_at_ms = Some(9_000);
    store.create_device(&ctx, fresh).await.expect("create");

    let changed = store.mark_stale_offline(&ctx, 5_000).await.expect("sweep");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].device_id, "dev-1");

    let again = store.mark_stale_offline(&ctx, 5_000).await.expect("sweep");
    assert!(again.is_empty());
}

#[tokio::test]
async fn pending_commands_drain_in_order() {
    let store = InMemoryDeviceCommandStore::new();
    let ctx = PracticeContext::system();
    for idx in 0..3 {
        store
            .enqueue_command(
                &ctx,
                "practice-1",
                PendingCommandRecord {
                    command_id: format!("cmd-{}", idx),
                    device_id: "dev-1".to_string(),
                    payload: json!({ "seq": idx }),
                    created_at_ms: idx,
                },
            )
            .await
            .expect("enqueue");
    }
    let drained = store.drain_commands(&ctx, "dev-1").await.expect("drain");
    let ids: Vec<&str> = drained.iter().map(|c| c.command_id.as_str()).collect();
    assert_eq!(ids, vec!["cmd-0", "cmd-1", "cmd-2"]);
    let drained = store.drain_commands(&ctx, "dev-1").await.expect("drain");
    assert!(drained.is_empty());
}
