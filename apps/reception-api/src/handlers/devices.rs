//! 设备管理 handlers
//!
//! - GET /api/practices/{id}/devices - 列出设备
//! - POST /api/practices/{id}/devices - 注册设备（密钥仅返回一次）
//! - PUT /api/practices/{id}/devices/{did} - 更新元数据
//! - DELETE /api/practices/{id}/devices/{did} - 停用设备
//! - POST /api/practices/{id}/devices/{did}/rotate-secret - 轮换密钥
//! - POST /api/practices/{id}/devices/{did}/commands - 入队待下发命令
//!
//! 权限要求：读取需要 DEVICE.READ，其余需要 DEVICE.MANAGE。

use crate::AppState;
use crate::middleware::{require_permission, require_practice_scope};
use crate::utils::response::{auth_failure, device_to_dto};
use crate::utils::{normalize_optional, normalize_required, parse_enum};
use api_contract::{
    ApiResponse, DeviceDto, EnqueueCommandRequest, EnqueueCommandResponse,
    RegisterDeviceRequest, RegisterDeviceResponse, RotateSecretResponse, UpdateDeviceRequest,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{DeviceCategory, DeviceStatus, PracticeContext, permissions};
use reception_auth::NewDevice;
use reception_storage::DeviceUpdate;
use tracing::info;

#[derive(serde::Deserialize)]
pub struct PracticePath {
    practice_id: String,
}

#[derive(serde::Deserialize)]
pub struct DevicePath {
    practice_id: String,
    device_id: String,
}

fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    practice_id: &str,
    permission: &str,
) -> Result<PracticeContext, Response> {
    let ctx = require_practice_scope(state, headers, practice_id)?;
    require_permission(&ctx, permission)?;
    Ok(ctx)
}

/// 列出设备
pub async fn list_devices(
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::DEVICE_READ) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.registry.list_devices(&ctx, &path.practice_id).await {
        Ok(items) => {
            let data: Vec<DeviceDto> = items.into_iter().map(device_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => auth_failure(err),
    }
}

/// 注册设备
///
/// 生成一次性密钥，只保存其 argon2 哈希；明文密钥只在本响应中出现。
pub async fn register_device(
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
    headers: HeaderMap,
    Json(req): Json<RegisterDeviceRequest>,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::DEVICE_MANAGE) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let category = match parse_enum(&req.category, "category", DeviceCategory::parse) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let serial = match normalize_required(req.serial, "serial") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let name = match normalize_required(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let address = match normalize_optional(req.address, "address") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let zone_id = match normalize_optional(req.zone_id, "zoneId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let input = NewDevice {
        practice_id: path.practice_id,
        category,
        serial,
        name,
        address,
        zone_id,
    };
    match state.registry.register(&ctx, input).await {
        Ok((device, secret)) => {
            info!(
                target: "reception.api",
                device_id = %device.device_id,
                actor = %ctx.actor_id,
                "device_registered"
            );
            let response = RegisterDeviceResponse {
                device: device_to_dto(device),
                device_secret: secret,
            };
            (StatusCode::CREATED, Json(ApiResponse::success(response))).into_response()
        }
        Err(err) => auth_failure(err),
    }
}

/// 更新设备元数据
///
/// 状态只能手动设为 maintenance 或 offline；online 由心跳驱动。
pub async fn update_device(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
    Json(req): Json<UpdateDeviceRequest>,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::DEVICE_MANAGE) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let name = match normalize_optional(req.name, "name") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let status = match req.status.as_deref() {
        Some(value) => match parse_enum(value, "status", DeviceStatus::parse) {
            Ok(status) => Some(status),
            Err(response) => return response,
        },
        None => None,
    };
    let update = DeviceUpdate {
        name,
        address: req.address,
        zone_id: req.zone_id,
        status,
        ..DeviceUpdate::default()
    };
    match state.registry.update(&ctx, &path.device_id, update).await {
        Ok(device) => (StatusCode::OK, Json(ApiResponse::success(device_to_dto(device))))
            .into_response(),
        Err(err) => auth_failure(err),
    }
}

/// 停用设备（软删除，停用后设备无法认证）
pub async fn deactivate_device(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::DEVICE_MANAGE) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.registry.deactivate(&ctx, &path.device_id).await {
        Ok(device) => (StatusCode::OK, Json(ApiResponse::success(device_to_dto(device))))
            .into_response(),
        Err(err) => auth_failure(err),
    }
}

/// 轮换设备密钥
pub async fn rotate_secret(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::DEVICE_MANAGE) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.registry.rotate_secret(&ctx, &path.device_id).await {
        Ok((device, secret)) => {
            let response = RotateSecretResponse {
                device_id: device.device_id,
                device_secret: secret,
            };
            (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
        }
        Err(err) => auth_failure(err),
    }
}

/// 入队待下发命令，设备下次心跳时拉取
pub async fn enqueue_command(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
    headers: HeaderMap,
    Json(req): Json<EnqueueCommandRequest>,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::DEVICE_MANAGE) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state
        .registry
        .enqueue_command(&ctx, &path.device_id, req.payload)
        .await
    {
        Ok(command) => {
            let response = EnqueueCommandResponse {
                command_id: command.command_id,
                device_id: command.device_id,
                created_at_ms: command.created_at_ms,
            };
            (StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response()
        }
        Err(err) => auth_failure(err),
    }
}
