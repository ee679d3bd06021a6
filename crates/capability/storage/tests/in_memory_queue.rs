use domain::{PracticeContext, TicketPriority, TicketStatus};
use reception_storage::{
    InMemoryQueueStore, InMemoryTicketStore, QueueRecord, QueueStore, TicketRecord, TicketStore,
};

fn queue(queue_id: &str, is_active: bool) -> QueueRecord {
    QueueRecord {
        queue_id: queue_id.to_string(),
        practice_id: "practice-1".to_string(),
        name: "Allgemein".to_string(),
        code: "A".to_string(),
        zone_id: None,
        current_number: 0,
        average_wait_minutes: 10,
        is_active,
        created_at_ms: 0,
    }
}

fn ticket(ticket_id: &str, number: &str, patient_id: &str, created_at_ms: i64) -> TicketRecord {
    TicketRecord {
        ticket_id: ticket_id.to_string(),
        queue_id: "queue-1".to_string(),
        practice_id: "practice-1".to_string(),
        patient_id: Some(patient_id.to_string()),
        number: number.to_string(),
        status: TicketStatus::Waiting,
        priority: TicketPriority::Normal,
        estimated_wait_minutes: 5,
        created_at_ms,
        called_at_ms: None,
        completed_at_ms: None,
        called_by: None,
    }
}

#[tokio::test]
async fn counter_increments_only_for_active_queue() {
    let store = InMemoryQueueStore::new();
    let ctx = PracticeContext::system();
    store.create_queue(&ctx, queue("queue-1", true)).await.expect("create");
    store.create_queue(&ctx, queue("queue-2", false)).await.expect("create");

    assert_eq!(store.increment_counter(&ctx, "queue-1").await.expect("inc"), Some(1));
    assert_eq!(store.increment_counter(&ctx, "queue-1").await.expect("inc"), Some(2));
    assert_eq!(store.increment_counter(&ctx, "queue-2").await.expect("inc"), None);
    assert_eq!(store.increment_counter(&ctx, "missing").await.expect("inc"), None);
}

#[tokio::test]
async fn ticket_number_unique_within_queue() {
    let store = InMemoryTicketStore::new();
    let ctx = PracticeContext::system();
    store
        .create_ticket(&ctx, ticket("t-1", "A-001", "p-1", 10))
        .await
        .expect("create");
    let err = store
        .create_ticket(&ctx, ticket("t-2", "A-001", "p-2", 11))
        .await
        .expect_err("duplicate number");
    assert_eq!(err.message(), "ticket number exists");
}

#[tokio::test]
async fn transition_is_compare_and_set() {
    let store = InMemoryTicketStore::new();
    let ctx = PracticeContext::system();
    store
        .create_ticket(&ctx, ticket("t-1", "A-001", "p-1", 10))
        .await
        .expect("create");

    let called = store
        .transition_ticket(&ctx, "t-1", TicketStatus::Waiting, TicketStatus::Called, 50, Some("staff-1"))
        .await
        .expect("transition")
        .expect("called");
    assert_eq!(called.called_at_ms, Some(50));
    assert_eq!(called.called_by.as_deref(), Some("staff-1"));

    let stale = store
        .transition_ticket(&ctx, "t-1", TicketStatus::Waiting, TicketStatus::Called, 60, None)
        .await
        .expect("transition");
    assert!(stale.is_none());
}

#[tokio::test]
async fn active_ticket_respects_day_start() {
    let store = InMemoryTicketStore::new();
    let ctx = PracticeContext::system();
    store
        .create_ticket(&ctx, ticket("t-old", "A-001", "p-1", 10))
        .await
        .expect("create");
    store
        .create_ticket(&ctx, ticket("t-new", "A-002", "p-1", 100))
        .await
        .expect("create");

    let found = store
        .find_active_ticket(&ctx, "queue-1", "p-1", 50)
        .await
        .expect("find")
        .expect("ticket");
    assert_eq!(found.ticket_id, "t-new");

    store
        .transition_ticket(&ctx, "t-new", TicketStatus::Waiting, TicketStatus::Cancelled, 120, None)
        .await
        .expect("transition");
    let found = store
        .find_active_ticket(&ctx, "queue-1", "p-1", 50)
        .await
        .expect("find");
    assert!(found.is_none());
}
