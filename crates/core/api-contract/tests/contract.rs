use api_contract::{
    CheckInRequest, CheckInResponse, ClientMessage, EventEnvelope, EventType, HeartbeatRequest,
};
use serde_json::{Value, json};

#[test]
fn check_in_request_accepts_camel_case() {
    let payload = r#"{"rawIdentifier":"04:A2:B3","deviceId":"reader-1","deviceSecret":"s"}"#;
    let req: CheckInRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.raw_identifier, "04:A2:B3");
    assert_eq!(req.device_id, "reader-1");
    assert!(req.method.is_none());
}

#[test]
fn check_in_request_accepts_uid_alias() {
    let payload = r#"{"uid":"04A2B3","device_id":"reader-1","device_secret":"s"}"#;
    let req: CheckInRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.raw_identifier, "04A2B3");
}

#[test]
fn check_in_failure_omits_ticket_fields() {
    let response = CheckInResponse {
        success: false,
        ticket_number: None,
        queue_name: None,
        estimated_wait_minutes: None,
        route_id: None,
        patient_first_name: None,
        message: "not registered".to_string(),
    };
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value.get("success"), Some(&Value::Bool(false)));
    assert!(value.get("ticketNumber").is_none());
    assert!(value.get("rawIdentifier").is_none());
}

#[test]
fn heartbeat_request_optional_fields() {
    let payload = r#"{"deviceSerial":"SN-1","deviceSecret":"s","uptimeSeconds":42}"#;
    let req: HeartbeatRequest = serde_json::from_str(payload).expect("parse");
    assert_eq!(req.device_serial, "SN-1");
    assert_eq!(req.uptime_seconds, Some(42));
    assert!(req.firmware_version.is_none());
}

#[test]
fn event_envelope_uses_dotted_type() {
    let envelope = EventEnvelope::new(
        EventType::TicketCreated,
        json!({"ticketNumber": "A-001"}),
        "2026-01-01T00:00:00Z",
    );
    let value = serde_json::to_value(envelope).expect("serialize");
    assert_eq!(value["type"], "ticket.created");
    assert_eq!(value["data"]["ticketNumber"], "A-001");
    assert!(value.get("timestamp").is_some());
}

#[test]
fn client_message_topics_default_empty() {
    let ping: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).expect("parse");
    assert_eq!(ping.kind, "ping");
    assert!(ping.topics().is_empty());

    let sub: ClientMessage =
        serde_json::from_str(r#"{"type":"subscribe","data":{"topics":["queue:q1","led"]}}"#)
            .expect("parse");
    assert_eq!(sub.topics(), ["queue:q1".to_string(), "led".to_string()]);
}
