use reception_telemetry::{metrics, new_request_ids, record_check_in, record_ticket_issued};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, ids.trace_id);
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_check_in(true);
    record_check_in(false);
    record_ticket_issued();
    let after = metrics().snapshot();
    assert!(after.check_ins >= before.check_ins + 2);
    assert!(after.check_in_success > before.check_in_success);
    assert!(after.check_in_failure > before.check_in_failure);
    assert!(after.tickets_issued > before.tickets_issued);
}
