use api_contract::{ApiResponse, QueueSummaryDto, QueueSummaryItemDto};
use serde_json::json;

#[test]
fn success_envelope_wraps_summary() {
    let summary = QueueSummaryDto {
        practice_id: "p1".to_string(),
        now_serving: Some("A-004".to_string()),
        queues: vec![QueueSummaryItemDto {
            queue_id: "q1".to_string(),
            name: "Allgemein".to_string(),
            code: "A".to_string(),
            waiting_count: 3,
            now_serving: Some("A-004".to_string()),
        }],
    };
    let value = serde_json::to_value(ApiResponse::success(summary)).expect("json");
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["error"], json!(null));
    assert_eq!(value["data"]["nowServing"], json!("A-004"));
    assert_eq!(value["data"]["queues"][0]["waitingCount"], json!(3));
}

#[test]
fn error_envelope_carries_code_only() {
    let value = serde_json::to_value(ApiResponse::<()>::error("LED.UNREACHABLE", "led unreachable"))
        .expect("json");
    assert_eq!(value["success"], json!(false));
    assert_eq!(value["data"], json!(null));
    assert_eq!(value["error"]["code"], json!("LED.UNREACHABLE"));
}
