use domain::{PracticeContext, TicketPriority, TicketStatus};
use reception_queue::{IssueTicket, QueueError, QueueManager, QueueSettings};
use reception_storage::{
    InMemoryPracticeStore, InMemoryQueueStore, InMemoryTicketStore, PracticeRecord, QueueRecord,
    QueueStore, TicketRecord, TicketStore,
};
use std::collections::HashSet;
use std::sync::Arc;

struct Fixture {
    tickets: Arc<InMemoryTicketStore>,
    manager: Arc<QueueManager>,
}

async fn fixture() -> Fixture {
    let queues = Arc::new(InMemoryQueueStore::new());
    let tickets = Arc::new(InMemoryTicketStore::new());
    let practices = Arc::new(InMemoryPracticeStore::new());
    practices
        .insert_practice(PracticeRecord {
            practice_id: "practice-1".to_string(),
            name: "Praxis Mitte".to_string(),
            utc_offset_minutes: Some(60),
            is_active: true,
        })
        .expect("practice");
    let ctx = PracticeContext::system();
    for (queue_id, code, is_active, created_at_ms) in
        [("queue-a", "A", true, 1), ("queue-b", "B", true, 2), ("queue-x", "X", false, 0)]
    {
        queues
            .create_queue(
                &ctx,
                QueueRecord {
                    queue_id: queue_id.to_string(),
                    practice_id: "practice-1".to_string(),
                    name: format!("Queue {}", code),
                    code: code.to_string(),
                    zone_id: None,
                    current_number: 0,
                    average_wait_minutes: 10,
                    is_active,
                    created_at_ms,
                },
            )
            .await
            .expect("queue");
    }
    let manager = Arc::new(QueueManager::new(
        queues,
        tickets.clone(),
        practices,
        QueueSettings::default(),
    ));
    Fixture { tickets, manager }
}

fn issue(queue_id: &str, patient_id: Option<&str>, priority: TicketPriority) -> IssueTicket {
    IssueTicket {
        queue_id: queue_id.to_string(),
        patient_id: patient_id.map(str::to_string),
        priority,
    }
}

fn raw_ticket(ticket_id: &str, number: &str, priority: TicketPriority, created_at_ms: i64) -> TicketRecord {
    TicketRecord {
        ticket_id: ticket_id.to_string(),
        queue_id: "queue-a".to_string(),
        practice_id: "practice-1".to_string(),
        patient_id: None,
        number: number.to_string(),
        status: TicketStatus::Waiting,
        priority,
        estimated_wait_minutes: 5,
        created_at_ms,
        called_at_ms: None,
        completed_at_ms: None,
        called_by: None,
    }
}

#[tokio::test]
async fn numbers_increase_and_inactive_queue_rejected() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    assert_eq!(fx.manager.next_ticket_number(&ctx, "queue-a").await.expect("n"), "A-001");
    assert_eq!(fx.manager.next_ticket_number(&ctx, "queue-a").await.expect("n"), "A-002");
    let err = fx
        .manager
        .next_ticket_number(&ctx, "queue-x")
        .await
        .expect_err("inactive");
    assert!(matches!(err, QueueError::QueueNotFound));
    let err = fx
        .manager
        .next_ticket_number(&ctx, "missing")
        .await
        .expect_err("missing");
    assert!(matches!(err, QueueError::QueueNotFound));
}

#[tokio::test]
async fn second_issue_for_same_patient_resumes() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    let first = fx
        .manager
        .issue_ticket(&ctx, issue("queue-a", Some("p-1"), TicketPriority::Normal))
        .await
        .expect("issue");
    assert!(first.created);
    assert_eq!(first.ticket.number, "A-001");
    assert_eq!(first.queue.current_number, 1);

    let again = fx
        .manager
        .issue_ticket(&ctx, issue("queue-a", Some("p-1"), TicketPriority::Normal))
        .await
        .expect("issue");
    assert!(!again.created);
    assert_eq!(again.ticket.ticket_id, first.ticket.ticket_id);

    // 另一个队列不受影响
    let other = fx
        .manager
        .issue_ticket(&ctx, issue("queue-b", Some("p-1"), TicketPriority::Normal))
        .await
        .expect("issue");
    assert!(other.created);
    assert_eq!(other.ticket.number, "B-001");
}

#[tokio::test]
async fn estimated_wait_uses_occupancy_with_floor() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    let first = fx
        .manager
        .issue_ticket(&ctx, issue("queue-a", Some("p-1"), TicketPriority::Normal))
        .await
        .expect("issue");
    assert_eq!(first.ticket.estimated_wait_minutes, 5);
    let second = fx
        .manager
        .issue_ticket(&ctx, issue("queue-a", Some("p-2"), TicketPriority::Normal))
        .await
        .expect("issue");
    assert_eq!(second.ticket.estimated_wait_minutes, 10);
    let third = fx
        .manager
        .issue_ticket(&ctx, issue("queue-a", Some("p-3"), TicketPriority::Normal))
        .await
        .expect("issue");
    assert_eq!(third.ticket.estimated_wait_minutes, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_scans_for_same_patient_yield_one_ticket() {
    let fx = fixture().await;
    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = fx.manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .issue_ticket(
                    &PracticeContext::system(),
                    issue("queue-a", Some("p-1"), TicketPriority::Normal),
                )
                .await
        }));
    }
    let mut numbers = HashSet::new();
    let mut created = 0;
    for handle in futures::future::join_all(handles).await {
        let issued = handle.expect("join").expect("issue");
        if issued.created {
            created += 1;
        }
        numbers.insert(issued.ticket.number);
    }
    assert_eq!(created, 1);
    assert_eq!(numbers.len(), 1);
    let tickets = fx
        .tickets
        .list_tickets(&PracticeContext::system(), "queue-a")
        .await
        .expect("list");
    assert_eq!(tickets.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_issuance_numbers_are_unique() {
    let fx = fixture().await;
    let mut handles = Vec::new();
    for idx in 0..20 {
        let manager = fx.manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .issue_ticket(
                    &PracticeContext::system(),
                    issue("queue-a", Some(&format!("p-{}", idx)), TicketPriority::Normal),
                )
                .await
        }));
    }
    let mut numbers = HashSet::new();
    for handle in futures::future::join_all(handles).await {
        let issued = handle.expect("join").expect("issue");
        assert!(issued.created);
        numbers.insert(issued.ticket.number);
    }
    assert_eq!(numbers.len(), 20);
    assert!(numbers.contains("A-001"));
    assert!(numbers.contains("A-020"));
}

#[tokio::test]
async fn call_next_prefers_priority_then_fifo() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    fx.tickets
        .create_ticket(&ctx, raw_ticket("t-b", "A-001", TicketPriority::Normal, 100))
        .await
        .expect("ticket");
    fx.tickets
        .create_ticket(&ctx, raw_ticket("t-a", "A-002", TicketPriority::Emergency, 200))
        .await
        .expect("ticket");
    let called = fx
        .manager
        .call_next(&ctx, "queue-a", Some("staff-1"))
        .await
        .expect("call");
    assert_eq!(called.ticket_id, "t-a");
    assert_eq!(called.status, TicketStatus::Called);
    assert!(called.called_at_ms.is_some());
    assert_eq!(called.called_by.as_deref(), Some("staff-1"));

    let called = fx.manager.call_next(&ctx, "queue-a", None).await.expect("call");
    assert_eq!(called.ticket_id, "t-b");

    let err = fx.manager.call_next(&ctx, "queue-a", None).await.expect_err("empty");
    assert!(matches!(err, QueueError::QueueEmpty));
}

#[tokio::test]
async fn call_next_fifo_on_equal_priority() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    fx.tickets
        .create_ticket(&ctx, raw_ticket("t-late", "A-002", TicketPriority::Normal, 200))
        .await
        .expect("ticket");
    fx.tickets
        .create_ticket(&ctx, raw_ticket("t-early", "A-001", TicketPriority::Normal, 100))
        .await
        .expect("ticket");
    let called = fx.manager.call_next(&ctx, "queue-a", None).await.expect("call");
    assert_eq!(called.ticket_id, "t-early");
}

#[tokio::test]
async fn transitions_follow_state_machine() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    let issued = fx
        .manager
        .issue_ticket(&ctx, issue("queue-a", Some("p-1"), TicketPriority::High))
        .await
        .expect("issue");
    let id = issued.ticket.ticket_id;

    let err = fx
        .manager
        .transition(&ctx, &id, TicketStatus::Completed, None)
        .await
        .expect_err("skip");
    assert!(matches!(
        err,
        QueueError::InvalidTransition {
            from: TicketStatus::Waiting,
            to: TicketStatus::Completed
        }
    ));

    fx.manager
        .transition(&ctx, &id, TicketStatus::Called, Some("staff-1"))
        .await
        .expect("called");
    fx.manager
        .transition(&ctx, &id, TicketStatus::InProgress, None)
        .await
        .expect("in progress");
    let done = fx
        .manager
        .transition(&ctx, &id, TicketStatus::Completed, None)
        .await
        .expect("completed");
    assert!(done.completed_at_ms.is_some());

    let err = fx
        .manager
        .transition(&ctx, &id, TicketStatus::Cancelled, None)
        .await
        .expect_err("terminal");
    assert!(matches!(err, QueueError::InvalidTransition { .. }));

    let stats = fx.manager.queue_stats(&ctx, "queue-a").await.expect("stats");
    assert_eq!(stats.completed_today, 1);
    assert_eq!(stats.waiting_count, 0);
    assert_eq!(stats.current_number, 1);

    // 完成后同一患者可再次出票
    let again = fx
        .manager
        .issue_ticket(&ctx, issue("queue-a", Some("p-1"), TicketPriority::Normal))
        .await
        .expect("issue");
    assert!(again.created);
    assert_eq!(again.ticket.number, "A-002");
}

#[tokio::test]
async fn summary_reports_now_serving() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    for patient in ["p-1", "p-2", "p-3"] {
        fx.manager
            .issue_ticket(&ctx, issue("queue-a", Some(patient), TicketPriority::Normal))
            .await
            .expect("issue");
    }
    fx.manager.call_next(&ctx, "queue-a", None).await.expect("call");

    let summary = fx.manager.public_summary(&ctx, "practice-1").await.expect("summary");
    assert_eq!(summary.now_serving.as_deref(), Some("A-001"));
    assert_eq!(summary.queues.len(), 2);
    let queue_a = summary
        .queues
        .iter()
        .find(|item| item.queue_id == "queue-a")
        .expect("queue a");
    assert_eq!(queue_a.waiting_count, 2);

    let default = fx.manager.default_queue(&ctx, "practice-1").await.expect("default");
    assert_eq!(default.queue_id, "queue-a");

    let found = fx.manager.find_by_number(&ctx, "queue-a", "A-003").await.expect("find");
    assert_eq!(found.patient_id.as_deref(), Some("p-3"));

    let waiting = fx
        .manager
        .list_tickets(&ctx, "queue-a", Some(TicketStatus::Waiting))
        .await
        .expect("list");
    assert_eq!(waiting.len(), 2);
}

#[tokio::test]
async fn same_millisecond_tickets_called_in_counter_order() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    fx.tickets
        .create_ticket(&ctx, raw_ticket("t-1000", "A-1000", TicketPriority::Normal, 100))
        .await
        .expect("ticket");
    fx.tickets
        .create_ticket(&ctx, raw_ticket("t-999", "A-999", TicketPriority::Normal, 100))
        .await
        .expect("ticket");
    let called = fx.manager.call_next(&ctx, "queue-a", None).await.expect("call");
    assert_eq!(called.ticket_id, "t-999");
}

#[tokio::test]
async fn unknown_queue_ids_leave_no_lock_entries() {
    let fx = fixture().await;
    let ctx = PracticeContext::system();
    for idx in 0..5 {
        let err = fx
            .manager
            .call_next(&ctx, &format!("ghost-{}", idx), None)
            .await
            .expect_err("unknown queue");
        assert!(matches!(err, QueueError::QueueNotFound));
        let err = fx
            .manager
            .issue_ticket(&ctx, issue(&format!("ghost-{}", idx), None, TicketPriority::Normal))
            .await
            .expect_err("unknown queue");
        assert!(matches!(err, QueueError::QueueNotFound));
    }
    assert_eq!(fx.manager.tracked_queue_locks(), 0);

    fx.manager
        .issue_ticket(&ctx, issue("queue-a", Some("p-1"), TicketPriority::Normal))
        .await
        .expect("issue");
    fx.manager.call_next(&ctx, "queue-a", None).await.expect("call");
    assert_eq!(fx.manager.tracked_queue_locks(), 1);
}
