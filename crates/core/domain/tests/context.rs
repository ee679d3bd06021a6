use domain::{PracticeContext, TicketPriority, TicketStatus};

#[test]
fn practice_context_builds() {
    let ctx = PracticeContext::new(
        "staff-1",
        vec!["mfa".to_string()],
        vec!["QUEUE.READ".to_string()],
        Some("practice-1".to_string()),
    );

    assert_eq!(ctx.actor_id, "staff-1");
    assert_eq!(ctx.roles.len(), 1);
    assert!(ctx.has_permission("QUEUE.READ"));
    assert!(!ctx.has_permission("QUEUE.OPERATE"));
    assert_eq!(ctx.practice_scope.as_deref(), Some("practice-1"));
}

#[test]
fn device_context_is_scoped() {
    let ctx = PracticeContext::for_device("reader-1", "practice-1");
    assert_eq!(ctx.actor_id, "device:reader-1");
    assert_eq!(ctx.practice_scope.as_deref(), Some("practice-1"));
    assert!(PracticeContext::system().practice_scope.is_none());
}

#[test]
fn ticket_state_machine_edges() {
    assert!(TicketStatus::Waiting.can_transition_to(TicketStatus::Called));
    assert!(TicketStatus::Called.can_transition_to(TicketStatus::InProgress));
    assert!(TicketStatus::InProgress.can_transition_to(TicketStatus::Completed));
    assert!(TicketStatus::Called.can_transition_to(TicketStatus::NoShow));
    assert!(!TicketStatus::Waiting.can_transition_to(TicketStatus::Completed));
    assert!(!TicketStatus::InProgress.can_transition_to(TicketStatus::Cancelled));
    assert!(!TicketStatus::Completed.can_transition_to(TicketStatus::Waiting));
}

#[test]
fn priority_orders_emergency_first() {
    let mut items = vec![
        TicketPriority::Normal,
        TicketPriority::Emergency,
        TicketPriority::High,
    ];
    items.sort_by(|a, b| b.cmp(a));
    assert_eq!(
        items,
        vec![
            TicketPriority::Emergency,
            TicketPriority::High,
            TicketPriority::Normal
        ]
    );
}
