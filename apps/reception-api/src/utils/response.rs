//! HTTP 响应辅助函数和 DTO 转换
//!
//! 提供统一的错误响应构造函数和 DTO 转换函数：
//! - 错误响应：auth_error, forbidden_error, bad_request_error, not_found_error, conflict_error, internal_error
//! - 能力错误映射：auth_failure, credential_failure, queue_failure, wayfinding_failure
//! - DTO 转换：device_to_dto, credential_to_dto, ticket_to_dto, check_in_event_to_dto, outcome_to_response
//!
//! 设计约束：
//! - 所有错误返回统一的 ApiResponse 格式（设备签到接口除外，返回扁平的签到结果）
//! - 内部错误详情只写日志，不进入响应体
//! - 原始卡号、设备密钥永不出现在响应中

use api_contract::{
    ApiResponse, CheckInEventDto, CheckInResponse, CredentialDto, DeviceDto, TicketDto,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reception_auth::AuthError;
use reception_checkin::CheckInOutcome;
use reception_credential::{CredentialError, CredentialView};
use reception_queue::QueueError;
use reception_storage::{CheckInEventRecord, DeviceRecord, TicketRecord};
use reception_wayfinding::WayfindingError;
use std::fmt::Display;
use tracing::warn;

fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(ApiResponse::<()>::error(code, message.into()))).into_response()
}

/// 认证错误响应（设备与员工共用，不区分原因）
pub fn auth_error(status: StatusCode) -> Response {
    error_response(status, "AUTH.UNAUTHORIZED", "unauthorized")
}

/// 禁止访问错误响应
pub fn forbidden_error() -> Response {
    error_response(StatusCode::FORBIDDEN, "AUTH.FORBIDDEN", "forbidden")
}

/// 错误请求响应
pub fn bad_request_error(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, "INVALID.REQUEST", message)
}

/// 资源未找到错误响应
pub fn not_found_error() -> Response {
    error_response(StatusCode::NOT_FOUND, "RESOURCE.NOT_FOUND", "not found")
}

/// 资源冲突响应
pub fn conflict_error(code: &str, message: impl Into<String>) -> Response {
    error_response(StatusCode::CONFLICT, code, message)
}

/// 下游设备不可达
pub fn unavailable_error(code: &str) -> Response {
    error_response(StatusCode::BAD_GATEWAY, code, "downstream unavailable")
}

/// 内部错误响应：详情只进日志
pub fn internal_error(err: impl Display) -> Response {
    warn!(target: "reception.api", error = %err, "internal_error");
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL.ERROR",
        "internal error",
    )
}

pub fn auth_failure(err: AuthError) -> Response {
    match err {
        AuthError::AuthenticationFailed | AuthError::TokenInvalid | AuthError::TokenExpired => {
            auth_error(StatusCode::UNAUTHORIZED)
        }
        AuthError::DuplicateSerial => {
            conflict_error("DEVICE.DUPLICATE_SERIAL", "serial already registered")
        }
        AuthError::DeviceNotFound => not_found_error(),
        AuthError::InvalidInput(message) => bad_request_error(message),
        err @ (AuthError::Storage(_) | AuthError::Internal(_)) => internal_error(err),
    }
}

pub fn credential_failure(err: CredentialError) -> Response {
    match err {
        CredentialError::NotFound | CredentialError::PatientNotFound => not_found_error(),
        CredentialError::AlreadyRegistered => {
            conflict_error("CREDENTIAL.ALREADY_REGISTERED", "credential already registered")
        }
        CredentialError::InvalidIdentifier => bad_request_error("rawIdentifier invalid"),
        err @ (CredentialError::InvalidKey(_)
        | CredentialError::Crypto(_)
        | CredentialError::Storage(_)) => internal_error(err),
    }
}

pub fn queue_failure(err: QueueError) -> Response {
    match err {
        QueueError::QueueNotFound | QueueError::TicketNotFound => not_found_error(),
        QueueError::QueueUnavailable => {
            conflict_error("QUEUE.UNAVAILABLE", "no active queue available")
        }
        QueueError::QueueEmpty => conflict_error("QUEUE.EMPTY", "no waiting tickets"),
        err @ QueueError::InvalidTransition { .. } => {
            conflict_error("TICKET.INVALID_TRANSITION", err.to_string())
        }
        err @ QueueError::Storage(_) => internal_error(err),
    }
}

pub fn wayfinding_failure(err: WayfindingError) -> Response {
    match err {
        WayfindingError::RouteNotFound | WayfindingError::ControllerNotFound => not_found_error(),
        WayfindingError::RouteInactive => conflict_error("ROUTE.INACTIVE", "route inactive"),
        WayfindingError::InvalidColor(value) => bad_request_error(format!("invalid color {value}")),
        err @ (WayfindingError::ControllerUnreachable(_) | WayfindingError::DispatchFailed(_)) => {
            warn!(target: "reception.api", error = %err, "led_dispatch_failed");
            unavailable_error("LED.UNREACHABLE")
        }
        err @ WayfindingError::Storage(_) => internal_error(err),
    }
}

/// DeviceRecord 转 DeviceDto（不含密钥摘要）
pub fn device_to_dto(record: DeviceRecord) -> DeviceDto {
    DeviceDto {
        device_id: record.device_id,
        practice_id: record.practice_id,
        category: record.category.as_str().to_string(),
        serial: record.serial,
        name: record.name,
        address: record.address,
        status: record.status.as_str().to_string(),
        zone_id: record.zone_id,
        firmware_version: record.firmware_version,
        is_active: record.is_active,
        last_seen_at_ms: record.last_seen_at_ms,
    }
}

/// CredentialView 转 CredentialDto
pub fn credential_to_dto(view: CredentialView) -> CredentialDto {
    let record = view.record;
    CredentialDto {
        token_id: record.token_id,
        patient_id: record.patient_id,
        card_type: record.card_type.as_str().to_string(),
        label: record.label,
        masked_identifier: view.masked_identifier,
        expires_at_ms: record.expires_at_ms,
        is_active: record.is_active,
        issued_at_ms: record.issued_at_ms,
        last_used_at_ms: record.last_used_at_ms,
    }
}

pub fn ticket_to_dto(record: TicketRecord) -> TicketDto {
    TicketDto {
        ticket_id: record.ticket_id,
        queue_id: record.queue_id,
        number: record.number,
        status: record.status.as_str().to_string(),
        priority: record.priority.as_str().to_string(),
        estimated_wait_minutes: record.estimated_wait_minutes,
        created_at_ms: record.created_at_ms,
        called_at_ms: record.called_at_ms,
        completed_at_ms: record.completed_at_ms,
    }
}

/// 审计记录转 DTO（不含查找摘要与患者 ID）
pub fn check_in_event_to_dto(record: CheckInEventRecord) -> CheckInEventDto {
    CheckInEventDto {
        event_id: record.event_id,
        device_id: record.device_id,
        credential_id: record.credential_id,
        ticket_id: record.ticket_id,
        method: record.method.as_str().to_string(),
        success: record.success,
        failure_reason: record.failure_reason,
        route_id: record.route_id,
        checked_in_at_ms: record.checked_in_at_ms,
    }
}

/// 签到结果转设备响应
pub fn outcome_to_response(outcome: &CheckInOutcome) -> CheckInResponse {
    CheckInResponse {
        success: outcome.success,
        ticket_number: outcome.ticket_number().map(str::to_string),
        queue_name: outcome.queue_name.clone(),
        estimated_wait_minutes: outcome.estimated_wait_minutes(),
        route_id: outcome.route_id.clone(),
        patient_first_name: outcome.patient_first_name.clone(),
        message: outcome.message.clone(),
    }
}
