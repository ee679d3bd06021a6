use domain::{DeviceCategory, DeviceStatus, PracticeContext};
use reception_auth::{AuthError, DeviceRegistry, HeartbeatMetadata, NewDevice};
use reception_storage::{DeviceUpdate, InMemoryDeviceCommandStore, InMemoryDeviceStore};
use serde_json::json;
use std::sync::Arc;

fn registry() -> DeviceRegistry {
    DeviceRegistry::new(
        Arc::new(InMemoryDeviceStore::new()),
        Arc::new(InMemoryDeviceCommandStore::new()),
    )
}

fn reader(serial: &str) -> NewDevice {
    NewDevice {
        practice_id: "practice-1".to_string(),
        category: DeviceCategory::Reader,
        serial: serial.to_string(),
        name: "Eingang".to_string(),
        address: None,
        zone_id: None,
    }
}

#[tokio::test]
async fn register_returns_secret_once_and_stores_hash() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (device, secret) = registry.register(&ctx, reader("SN-1")).await.expect("register");
    assert_eq!(secret.len(), 64);
    assert_ne!(device.secret_hash, secret);
    assert!(device.secret_hash.starts_with("$argon2"));
    assert_eq!(device.status, DeviceStatus::Offline);

    let err = registry.register(&ctx, reader("SN-1")).await.expect_err("duplicate");
    assert!(matches!(err, AuthError::DuplicateSerial));
}

#[tokio::test]
async fn heartbeat_brings_device_online_then_check_in_auth_succeeds() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (device, secret) = registry.register(&ctx, reader("SN-1")).await.expect("register");

    // 新注册设备离线，签到认证拒绝
    assert!(registry.authenticate(&device.device_id, &secret).await.is_err());

    let outcome = registry
        .record_heartbeat(
            "SN-1",
            &secret,
            HeartbeatMetadata {
                firmware_version: Some("2.1.0".to_string()),
                uptime_seconds: Some(42),
            },
        )
        .await
        .expect("heartbeat");
    assert_eq!(outcome.device.status, DeviceStatus::Online);
    assert!(outcome.device.last_seen_at_ms.is_some());
    assert_eq!(outcome.device.firmware_version.as_deref(), Some("2.1.0"));

    let authed = registry
        .authenticate(&device.device_id, &secret)
        .await
        .expect("auth");
    assert_eq!(authed.device_id, device.device_id);
}

#[tokio::test]
async fn unknown_device_and_wrong_secret_fail_identically() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (device, secret) = registry.register(&ctx, reader("SN-1")).await.expect("register");
    registry
        .record_heartbeat("SN-1", &secret, HeartbeatMetadata::default())
        .await
        .expect("heartbeat");

    let unknown = registry
        .authenticate("no-such-device", &secret)
        .await
        .expect_err("unknown");
    let wrong = registry
        .authenticate(&device.device_id, "wrong-secret")
        .await
        .expect_err("wrong");
    assert!(matches!(unknown, AuthError::AuthenticationFailed));
    assert!(matches!(wrong, AuthError::AuthenticationFailed));
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn deactivated_or_maintenance_device_rejected() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (device, secret) = registry.register(&ctx, reader("SN-1")).await.expect("register");
    registry
        .update(
            &ctx,
            &device.device_id,
            DeviceUpdate {
                status: Some(DeviceStatus::Maintenance),
                ..DeviceUpdate::default()
            },
        )
        .await
        .expect("update");
    assert!(
        registry
            .record_heartbeat("SN-1", &secret, HeartbeatMetadata::default())
            .await
            .is_err()
    );

    registry
        .update(
            &ctx,
            &device.device_id,
            DeviceUpdate {
                status: Some(DeviceStatus::Offline),
                ..DeviceUpdate::default()
            },
        )
        .await
        .expect("update");
    registry
        .record_heartbeat("SN-1", &secret, HeartbeatMetadata::default())
        .await
        .expect("heartbeat");
    registry.deactivate(&ctx, &device.device_id).await.expect("deactivate");
    let err = registry
        .authenticate(&device.device_id, &secret)
        .await
        .expect_err("inactive");
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn online_status_cannot_be_forced() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (device, _) = registry.register(&ctx, reader("SN-1")).await.expect("register");
    let err = registry
        .update(
            &ctx,
            &device.device_id,
            DeviceUpdate {
                status: Some(DeviceStatus::Online),
                ..DeviceUpdate::default()
            },
        )
        .await
        .expect_err("online");
    assert!(matches!(err, AuthError::InvalidInput(_)));
}

#[tokio::test]
async fn rotated_secret_replaces_old_one() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (_, old_secret) = registry.register(&ctx, reader("SN-1")).await.expect("register");
    let device = registry
        .list_devices(&ctx, "practice-1")
        .await
        .expect("list")
        .remove(0);
    let (_, new_secret) = registry
        .rotate_secret(&ctx, &device.device_id)
        .await
        .expect("rotate");
    assert!(
        registry
            .record_heartbeat("SN-1", &old_secret, HeartbeatMetadata::default())
            .await
            .is_err()
    );
    registry
        .record_heartbeat("SN-1", &new_secret, HeartbeatMetadata::default())
        .await
        .expect("heartbeat");
}

#[tokio::test]
async fn heartbeat_drains_pending_commands() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (device, secret) = registry.register(&ctx, reader("SN-1")).await.expect("register");
    registry
        .enqueue_command(&ctx, &device.device_id, json!({ "action": "reboot" }))
        .await
        .expect("enqueue");

    let outcome = registry
        .record_heartbeat("SN-1", &secret, HeartbeatMetadata::default())
        .await
        .expect("heartbeat");
    assert_eq!(outcome.pending_commands.len(), 1);
    assert_eq!(outcome.pending_commands[0].payload["action"], "reboot");

    let outcome = registry
        .record_heartbeat("SN-1", &secret, HeartbeatMetadata::default())
        .await
        .expect("heartbeat");
    assert!(outcome.pending_commands.is_empty());
}

#[tokio::test]
async fn stale_devices_marked_offline() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (device, secret) = registry.register(&ctx, reader("SN-1")).await.expect("register");
    let outcome = registry
        .record_heartbeat("SN-1", &secret, HeartbeatMetadata::default())
        .await
        .expect("heartbeat");
    let seen = outcome.device.last_seen_at_ms.expect("seen");

    let changed = registry
        .mark_stale_offline(seen + 1_000, 120)
        .await
        .expect("sweep");
    assert!(changed.is_empty());

    let changed = registry
        .mark_stale_offline(seen + 121_000, 120)
        .await
        .expect("sweep");
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].device_id, device.device_id);
}

#[tokio::test]
async fn huge_offline_window_marks_nothing() {
    let registry = registry();
    let ctx = PracticeContext::system().scoped_to("practice-1");
    let (_, secret) = registry.register(&ctx, reader("SN-1")).await.expect("register");
    let outcome = registry
        .record_heartbeat("SN-1", &secret, HeartbeatMetadata::default())
        .await
        .expect("heartbeat");
    let seen = outcome.device.last_seen_at_ms.expect("seen");

    let changed = registry
        .mark_stale_offline(seen + 1_000, u64::MAX)
        .await
        .expect("sweep");
    assert!(changed.is_empty());
}
