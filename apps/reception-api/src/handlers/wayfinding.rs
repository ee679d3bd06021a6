//! 导引与 LED 控制 handlers
//!
//! - POST /api/practices/{id}/routes/{rid}/activate - 手动点亮路线
//! - POST /api/practices/{id}/routes/{rid}/deactivate - 提前熄灭路线
//! - POST /api/practices/{id}/led/command - 直接控制单个灯段
//! - POST /api/practices/{id}/led/off - 熄灭全部灯段
//!
//! 权限要求：WAYFINDING.OPERATE。状态变化以 `led.status` 事件广播到诊所范围与 `led` 主题。

use crate::AppState;
use crate::middleware::{require_permission, require_practice_scope};
use crate::utils::normalize_required;
use crate::utils::parse_enum;
use crate::utils::response::{bad_request_error, wayfinding_failure};
use api_contract::{
    ApiResponse, EventEnvelope, EventType, LedCommandRequest, LedCommandResponse, LedOffResponse,
    RouteActivationDto, RouteDeactivationDto,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{LedPattern, PracticeContext, Rgb, permissions};
use reception_realtime::timestamp_now;
use reception_wayfinding::{ROUTE_BRIGHTNESS, SegmentCommand};
use serde_json::{Value, json};

#[derive(serde::Deserialize)]
pub struct PracticePath {
    practice_id: String,
}

#[derive(serde::Deserialize)]
pub struct RoutePath {
    practice_id: String,
    route_id: String,
}

fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    practice_id: &str,
) -> Result<PracticeContext, Response> {
    let ctx = require_practice_scope(state, headers, practice_id)?;
    require_permission(&ctx, permissions::WAYFINDING_OPERATE)?;
    Ok(ctx)
}

async fn publish_led_status(state: &AppState, practice_id: &str, data: Value) {
    let event = EventEnvelope::new(EventType::LedStatus, data, timestamp_now());
    state
        .broadcaster
        .broadcast_to_scope(practice_id, &event)
        .await;
    state
        .broadcaster
        .broadcast_to_topic(practice_id, "led", &event)
        .await;
}

/// 点亮路线
///
/// 部分控制器不可达时仍返回 200，`partial` 为 true。
pub async fn activate_route(
    State(state): State<AppState>,
    Path(path): Path<RoutePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.wayfinding.activate_route(&ctx, &path.route_id).await {
        Ok(activation) => {
            publish_led_status(
                &state,
                &path.practice_id,
                json!({
                    "routeId": activation.route_id,
                    "active": true,
                    "partial": activation.partial,
                    "expiresAtMs": activation.expires_at_ms,
                }),
            )
            .await;
            let dto = RouteActivationDto {
                route_id: activation.route_id,
                lit_segments: activation.lit_segments.len(),
                failed_segments: activation.failed_segments.len(),
                partial: activation.partial,
                expires_at_ms: activation.expires_at_ms,
            };
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => wayfinding_failure(err),
    }
}

/// 熄灭路线并取消定时任务
pub async fn deactivate_route(
    State(state): State<AppState>,
    Path(path): Path<RoutePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.wayfinding.deactivate_route(&ctx, &path.route_id).await {
        Ok(deactivation) => {
            publish_led_status(
                &state,
                &path.practice_id,
                json!({ "routeId": deactivation.route_id, "active": false }),
            )
            .await;
            let dto = RouteDeactivationDto {
                route_id: deactivation.route_id,
                segments_off: deactivation.segments_off,
            };
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => wayfinding_failure(err),
    }
}

/// 直接控制单个灯段
pub async fn led_command(
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
    headers: HeaderMap,
    Json(req): Json<LedCommandRequest>,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let controller_id = match normalize_required(req.controller_id, "controllerId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let Some(color) = Rgb::from_hex(&req.color) else {
        return bad_request_error("color invalid");
    };
    let pattern = match req.pattern.as_deref() {
        Some(value) => match parse_enum(value, "pattern", LedPattern::parse) {
            Ok(pattern) => pattern,
            Err(response) => return response,
        },
        None => LedPattern::Solid,
    };
    let brightness = req.brightness.unwrap_or(ROUTE_BRIGHTNESS);
    let command = SegmentCommand::on(req.segment_index, color, brightness, pattern);
    match state
        .wayfinding
        .send_segment_command(&ctx, &path.practice_id, &controller_id, command)
        .await
    {
        Ok(()) => {
            let response = LedCommandResponse {
                controller_id,
                segment_index: req.segment_index,
                success: true,
            };
            (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
        }
        Err(err) => wayfinding_failure(err),
    }
}

/// 熄灭诊所全部灯段（同时取消所有路线定时任务）
pub async fn led_off(
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.wayfinding.set_all_off(&ctx, &path.practice_id).await {
        Ok(segments_off) => {
            publish_led_status(
                &state,
                &path.practice_id,
                json!({ "allOff": true, "segmentsOff": segments_off }),
            )
            .await;
            (
                StatusCode::OK,
                Json(ApiResponse::success(LedOffResponse { segments_off })),
            )
                .into_response()
        }
        Err(err) => wayfinding_failure(err),
    }
}
