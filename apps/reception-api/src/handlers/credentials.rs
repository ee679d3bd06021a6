//! 凭证管理 handlers
//!
//! - POST /api/practices/{id}/credentials - 为患者签发凭证
//! - GET /api/practices/{id}/patients/{pid}/credentials - 列出患者凭证（标识掩码）
//! - DELETE /api/practices/{id}/credentials/{tid} - 吊销凭证
//!
//! 原始标识只出现在签发请求中，任何响应都只返回掩码。

use crate::AppState;
use crate::middleware::{require_permission, require_practice_scope};
use crate::utils::response::{credential_failure, credential_to_dto};
use crate::utils::{normalize_optional, normalize_required, parse_enum};
use api_contract::{ApiResponse, CredentialDto, IssueCredentialRequest, RevokeCredentialResponse};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{CredentialType, permissions};
use reception_credential::{CredentialView, IssueCredential, mask_identifier, normalize_identifier};

#[derive(serde::Deserialize)]
pub struct PracticePath {
    practice_id: String,
}

#[derive(serde::Deserialize)]
pub struct PatientPath {
    practice_id: String,
    patient_id: String,
}

#[derive(serde::Deserialize)]
pub struct TokenPath {
    practice_id: String,
    token_id: String,
}

/// 签发凭证
pub async fn issue_credential(
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
    headers: HeaderMap,
    Json(req): Json<IssueCredentialRequest>,
) -> Response {
    let ctx = match require_practice_scope(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&ctx, permissions::CREDENTIAL_MANAGE) {
        return response;
    }
    let patient_id = match normalize_required(req.patient_id, "patientId") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let card_type = match parse_enum(&req.card_type, "cardType", CredentialType::parse) {
        Ok(value) => value,
        Err(response) => return response,
    };
    let label = match normalize_optional(req.label, "label") {
        Ok(value) => value,
        Err(response) => return response,
    };
    let masked_identifier = mask_identifier(&normalize_identifier(&req.raw_identifier));
    let input = IssueCredential {
        practice_id: path.practice_id,
        patient_id,
        raw_identifier: req.raw_identifier,
        card_type,
        label,
        expires_at_ms: req.expires_at_ms,
    };
    match state.credentials.issue(&ctx, input).await {
        Ok(record) => {
            let dto = credential_to_dto(CredentialView {
                record,
                masked_identifier,
            });
            (StatusCode::CREATED, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => credential_failure(err),
    }
}

/// 列出患者凭证
pub async fn list_patient_credentials(
    State(state): State<AppState>,
    Path(path): Path<PatientPath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match require_practice_scope(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&ctx, permissions::CREDENTIAL_READ) {
        return response;
    }
    match state
        .credentials
        .list_for_patient(&ctx, &path.patient_id)
        .await
    {
        Ok(items) => {
            let data: Vec<CredentialDto> = items.into_iter().map(credential_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => credential_failure(err),
    }
}

/// 吊销凭证（停用，保留摘要以便重新绑定）
pub async fn revoke_credential(
    State(state): State<AppState>,
    Path(path): Path<TokenPath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match require_practice_scope(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&ctx, permissions::CREDENTIAL_MANAGE) {
        return response;
    }
    match state.credentials.revoke(&ctx, &path.token_id).await {
        Ok(revoked) => {
            let response = RevokeCredentialResponse {
                token_id: path.token_id,
                revoked,
            };
            (StatusCode::OK, Json(ApiResponse::success(response))).into_response()
        }
        Err(err) => credential_failure(err),
    }
}
