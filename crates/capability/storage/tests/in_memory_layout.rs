use domain::{CheckInMethod, LedPattern, PracticeContext, SegmentRole};
use reception_storage::{
    CheckInEventRecord, CheckInEventStore, CredentialRecord, CredentialStore,
    InMemoryCheckInEventStore, InMemoryCredentialStore, InMemoryRouteStore, InMemorySegmentStore,
    RouteRecord, RouteStore, SegmentRecord, SegmentStore,
};

fn segment(segment_id: &str, index: u8, start_led: u32, end_led: u32) -> SegmentRecord {
    SegmentRecord {
        segment_id: segment_id.to_string(),
        practice_id: "practice-1".to_string(),
        zone_id: "zone-1".to_string(),
        controller_id: "ctrl-1".to_string(),
        index,
        start_led,
        end_led,
        role: SegmentRole::Path,
        default_color: "#FFFFFF".to_string(),
    }
}

#[tokio::test]
async fn overlapping_segments_rejected() {
    let store = InMemorySegmentStore::new();
    let ctx = PracticeContext::system();
    store.create_segment(&ctx, segment("s-1", 0, 0, 29)).await.expect("create");
    store.create_segment(&ctx, segment("s-2", 1, 30, 59)).await.expect("create");

    let err = store
        .create_segment(&ctx, segment("s-3", 2, 59, 80))
        .await
        .expect_err("overlap");
    assert_eq!(err.message(), "segment overlaps existing segment");

    let zone_segments = store.list_zone_segments(&ctx, "zone-1").await.expect("list");
    assert_eq!(zone_segments.len(), 2);
}

#[tokio::test]
async fn route_to_zone_skips_inactive() {
    let store = InMemoryRouteStore::new();
    let ctx = PracticeContext::system();
    let mut route = RouteRecord {
        route_id: "r-1".to_string(),
        practice_id: "practice-1".to_string(),
        name: "A Eingang".to_string(),
        from_zone_id: None,
        to_zone_id: "zone-wait".to_string(),
        segment_ids: vec!["s-1".to_string()],
        color: "#00FF00".to_string(),
        pattern: LedPattern::Chase,
        duration_seconds: 30,
        is_active: false,
    };
    store.create_route(&ctx, route.clone()).await.expect("create");
    route.route_id = "r-2".to_string();
    route.name = "B Eingang".to_string();
    route.is_active = true;
    store.create_route(&ctx, route).await.expect("create");

    let found = store
        .find_route_to_zone(&ctx, "practice-1", None, "zone-wait")
        .await
        .expect("find")
        .expect("route");
    assert_eq!(found.route_id, "r-2");
}

#[tokio::test]
async fn route_to_zone_follows_reader_origin() {
    let store = InMemoryRouteStore::new();
    let ctx = PracticeContext::system();
    let route = |route_id: &str, name: &str, from_zone_id: Option<&str>| RouteRecord {
        route_id: route_id.to_string(),
        practice_id: "practice-1".to_string(),
        name: name.to_string(),
        from_zone_id: from_zone_id.map(str::to_string),
        to_zone_id: "zone-wait".to_string(),
        segment_ids: vec!["s-1".to_string()],
        color: "#00FF00".to_string(),
        pattern: LedPattern::Chase,
        duration_seconds: 30,
        is_active: true,
    };
    store
        .create_route(&ctx, route("r-main", "A Haupteingang", Some("zone-main")))
        .await
        .expect("create");
    store
        .create_route(&ctx, route("r-side", "B Seiteneingang", Some("zone-side")))
        .await
        .expect("create");

    let from_side = store
        .find_route_to_zone(&ctx, "practice-1", Some("zone-side"), "zone-wait")
        .await
        .expect("find")
        .expect("route");
    assert_eq!(from_side.route_id, "r-side");

    // 其他起点的路线不会被误用
    let from_lift = store
        .find_route_to_zone(&ctx, "practice-1", Some("zone-lift"), "zone-wait")
        .await
        .expect("find");
    assert!(from_lift.is_none());

    store
        .create_route(&ctx, route("r-any", "C Beliebig", None))
        .await
        .expect("create");
    let from_lift = store
        .find_route_to_zone(&ctx, "practice-1", Some("zone-lift"), "zone-wait")
        .await
        .expect("find")
        .expect("route");
    assert_eq!(from_lift.route_id, "r-any");
    let from_main = store
        .find_route_to_zone(&ctx, "practice-1", Some("zone-main"), "zone-wait")
        .await
        .expect("find")
        .expect("route");
    assert_eq!(from_main.route_id, "r-main");
}

#[tokio::test]
async fn credential_deactivate_once() {
    let store = InMemoryCredentialStore::new();
    let ctx = PracticeContext::system();
    store
        .create_credential(
            &ctx,
            CredentialRecord {
                token_id: "tok-1".to_string(),
                practice_id: "practice-1".to_string(),
                patient_id: "p-1".to_string(),
                lookup_digest: "digest".to_string(),
                encrypted_identifier: "cipher".to_string(),
                card_type: domain::CredentialType::Egk,
                label: None,
                expires_at_ms: None,
                is_active: true,
                issued_at_ms: 1,
                last_used_at_ms: None,
                revoked_at_ms: None,
            },
        )
        .await
        .expect("create");

    assert!(store.deactivate_credential(&ctx, "tok-1", 5).await.expect("revoke"));
    assert!(!store.deactivate_credential(&ctx, "tok-1", 6).await.expect("revoke"));
    let found = store
        .find_by_digest(&ctx, "digest")
        .await
        .expect("find")
        .expect("credential");
    assert!(!found.is_active);
    assert_eq!(found.revoked_at_ms, Some(5));
}

#[tokio::test]
async fn check_in_events_newest_first() {
    let store = InMemoryCheckInEventStore::new();
    let ctx = PracticeContext::system();
    for idx in 0..5 {
        store
            .append_event(
                &ctx,
                CheckInEventRecord {
                    event_id: format!("evt-{}", idx),
                    practice_id: "practice-1".to_string(),
                    device_id: None,
                    credential_id: None,
                    ticket_id: None,
                    patient_id: None,
                    method: CheckInMethod::Nfc,
                    success: idx % 2 == 0,
                    failure_reason: None,
                    route_id: None,
                    lookup_digest: None,
                    checked_in_at_ms: idx,
                },
            )
            .await
            .expect("append");
    }
    let events = store.list_events(&ctx, "practice-1", 2).await.expect("list");
    let ids: Vec<&str> = events.iter().map(|e| e.event_id.as_str()).collect();
    assert_eq!(ids, vec!["evt-4", "evt-3"]);
}
