//! 健康检查与 Telemetry 指标快照。
//!
//! - GET /health
//! - GET /metrics

use api_contract::{ApiResponse, MetricsDto};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::permissions;
use reception_telemetry::metrics;

use crate::{
    AppState,
    middleware::{require_permission, require_staff},
};

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

pub async fn get_metrics(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let ctx = match require_staff(&state, &headers) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&ctx, permissions::METRICS_READ) {
        return response;
    }

    let snapshot = metrics().snapshot();
    (
        StatusCode::OK,
        Json(ApiResponse::success(MetricsDto {
            check_ins: snapshot.check_ins,
            check_in_success: snapshot.check_in_success,
            check_in_failure: snapshot.check_in_failure,
            tickets_issued: snapshot.tickets_issued,
            tickets_resumed: snapshot.tickets_resumed,
            device_auth_failures: snapshot.device_auth_failures,
            route_activations: snapshot.route_activations,
            segment_dispatch_failures: snapshot.segment_dispatch_failures,
            bus_publish_failures: snapshot.bus_publish_failures,
            broadcast_deliveries: snapshot.broadcast_deliveries,
            connections_pruned: snapshot.connections_pruned,
            post_action_failures: snapshot.post_action_failures,
        })),
    )
        .into_response()
}
