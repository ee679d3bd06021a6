//! 等待时间概览
//!
//! - GET /api/practices/{id}/wait-times

use crate::AppState;
use crate::middleware::{require_permission, require_practice_scope};
use crate::utils::response::internal_error;
use api_contract::{ApiResponse, WaitTimeOverviewDto, WaitTimeZoneDto};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::permissions;

#[derive(serde::Deserialize)]
pub struct PracticePath {
    practice_id: String,
}

pub async fn wait_time_overview(
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match require_practice_scope(&state, &headers, &path.practice_id) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&ctx, permissions::QUEUE_READ) {
        return response;
    }
    match state.visualizer.overview(&ctx, &path.practice_id).await {
        Ok(overview) => {
            let dto = WaitTimeOverviewDto {
                zones: overview
                    .zones
                    .into_iter()
                    .map(|zone| WaitTimeZoneDto {
                        zone_id: zone.zone_id,
                        zone_name: zone.zone_name,
                        patient_count: zone.patient_count,
                        average_wait_minutes: zone.average_wait_minutes,
                        max_wait_minutes: zone.max_wait_minutes,
                        status: zone.status.as_str().to_string(),
                        color: zone.status.color().to_string(),
                    })
                    .collect(),
                total_waiting: overview.total_waiting,
                average_wait_minutes: overview.average_wait_minutes,
                updated_at_ms: overview.updated_at_ms,
            };
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => internal_error(err),
    }
}
