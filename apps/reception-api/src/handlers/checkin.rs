//! 设备接口与签到审计 handlers
//!
//! - POST /api/check-in - 读卡器签到（设备密钥认证）
//! - POST /api/devices/heartbeat - 设备心跳，拉取待下发命令
//! - GET /api/practices/{id}/check-ins - 签到审计记录（员工）
//!
//! 设备认证失败一律返回相同的 401 响应体，不区分未知设备与密钥错误。

use crate::AppState;
use crate::middleware::{require_permission, require_practice_scope};
use crate::utils::parse_enum;
use crate::utils::response::{
    auth_error, auth_failure, check_in_event_to_dto, internal_error, outcome_to_response,
};
use api_contract::{
    ApiResponse, CheckInEventDto, CheckInRequest, CheckInResponse, HeartbeatRequest,
    HeartbeatResponse, LimitQuery,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{CheckInMethod, permissions};
use reception_auth::HeartbeatMetadata;
use reception_checkin::{CheckInError, MSG_UNAVAILABLE, ScanRequest};
use reception_realtime::timestamp_now;

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 500;

#[derive(serde::Deserialize)]
pub struct PracticePath {
    practice_id: String,
}

/// 读卡器签到
///
/// 成功或业务失败（卡未注册、无可用队列）均返回 200，由 `success` 区分；
/// 只有设备认证失败返回 401，基础设施故障返回 503。
pub async fn check_in(State(state): State<AppState>, Json(req): Json<CheckInRequest>) -> Response {
    let method = match req.method.as_deref() {
        Some(value) => match parse_enum(value, "method", CheckInMethod::parse) {
            Ok(method) => method,
            Err(response) => return response,
        },
        None => CheckInMethod::Nfc,
    };
    let scan = ScanRequest {
        raw_identifier: req.raw_identifier,
        device_id: req.device_id,
        device_secret: req.device_secret,
        method,
    };
    match state.checkin.check_in(scan).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome_to_response(&outcome))).into_response(),
        Err(CheckInError::AuthenticationFailed) => auth_error(StatusCode::UNAUTHORIZED),
        Err(err) => {
            tracing::warn!(target: "reception.api", error = %err, "check_in_unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(CheckInResponse {
                    success: false,
                    ticket_number: None,
                    queue_name: None,
                    estimated_wait_minutes: None,
                    route_id: None,
                    patient_first_name: None,
                    message: MSG_UNAVAILABLE.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// 设备心跳
pub async fn heartbeat(
    State(state): State<AppState>,
    Json(req): Json<HeartbeatRequest>,
) -> Response {
    let metadata = HeartbeatMetadata {
        firmware_version: req.firmware_version,
        uptime_seconds: req.uptime_seconds,
    };
    match state
        .registry
        .record_heartbeat(&req.device_serial, &req.device_secret, metadata)
        .await
    {
        Ok(outcome) => {
            let response = HeartbeatResponse {
                success: true,
                server_time: timestamp_now(),
                pending_commands: outcome
                    .pending_commands
                    .into_iter()
                    .map(|command| command.payload)
                    .collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => auth_failure(err),
    }
}

/// 最近签到记录（按时间倒序）
pub async fn list_check_ins(
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
    Query(query): Query<LimitQuery>,
    headers: HeaderMap,
) -> Response {
    let ctx = match require_practice_scope(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&ctx, permissions::CHECKIN_READ) {
        return response;
    }
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    match state.checkin.history(&ctx, &path.practice_id, limit).await {
        Ok(items) => {
            let data: Vec<CheckInEventDto> = items.into_iter().map(check_in_event_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => internal_error(err),
    }
}
