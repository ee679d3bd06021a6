//! 队列与叫号 handlers
//!
//! - GET /api/practices/{id}/queues - 候诊屏公共看板（无需 token，不含个人信息）
//! - GET /api/practices/{id}/queues/{qid}/stats - 队列统计
//! - GET /api/practices/{id}/queues/{qid}/tickets - 票据列表（可按状态过滤）
//! - POST /api/practices/{id}/queues/{qid}/call-next - 叫下一位
//! - POST /api/practices/{id}/tickets/{tid}/status - 票据状态变更
//!
//! 叫号与状态变更会向诊所作用域及 `queue:{id}` 主题广播实时事件。

use crate::AppState;
use crate::middleware::{require_permission, require_practice_scope};
use crate::utils::parse_enum;
use crate::utils::response::{queue_failure, ticket_to_dto};
use api_contract::{
    ApiResponse, EventEnvelope, EventType, QueueStatsDto, QueueSummaryDto, QueueSummaryItemDto,
    TicketDto, TicketQuery, TransitionTicketRequest,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use domain::{PracticeContext, TicketStatus, permissions};
use reception_realtime::timestamp_now;
use reception_storage::TicketRecord;
use serde_json::json;
use tracing::info;

#[derive(serde::Deserialize)]
pub struct PracticePath {
    practice_id: String,
}

#[derive(serde::Deserialize)]
pub struct QueuePath {
    practice_id: String,
    queue_id: String,
}

#[derive(serde::Deserialize)]
pub struct TicketPath {
    practice_id: String,
    ticket_id: String,
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

/// 候诊屏公共看板
pub async fn queue_summary(
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
) -> Response {
    let ctx = PracticeContext::system().scoped_to(&path.practice_id);
    match state.queues.public_summary(&ctx, &path.practice_id).await {
        Ok(summary) => {
            let dto = QueueSummaryDto {
                practice_id: summary.practice_id,
                now_serving: summary.now_serving,
                queues: summary
                    .queues
                    .into_iter()
                    .map(|item| QueueSummaryItemDto {
                        queue_id: item.queue_id,
                        name: item.queue_name,
                        code: item.code,
                        waiting_count: item.waiting_count,
                        now_serving: item.now_serving,
                    })
                    .collect(),
            };
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => queue_failure(err),
    }
}

/// 队列统计
pub async fn queue_stats(
    State(state): State<AppState>,
    Path(path): Path<QueuePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::QUEUE_READ) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state.queues.queue_stats(&ctx, &path.queue_id).await {
        Ok(stats) => {
            let dto = QueueStatsDto {
                queue_id: stats.queue_id,
                queue_name: stats.queue_name,
                waiting_count: stats.waiting_count,
                called_count: stats.called_count,
                in_progress_count: stats.in_progress_count,
                completed_today: stats.completed_today,
                current_number: stats.current_number,
                estimated_wait_minutes: stats.estimated_wait_minutes,
            };
            (StatusCode::OK, Json(ApiResponse::success(dto))).into_response()
        }
        Err(err) => queue_failure(err),
    }
}

/// 票据列表（优先级降序，同优先级按出票时间）
pub async fn list_tickets(
    State(state): State<AppState>,
    Path(path): Path<QueuePath>,
    Query(query): Query<TicketQuery>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::QUEUE_READ) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let status = match query.status.as_deref() {
        Some(value) => match parse_enum(value, "status", TicketStatus::parse) {
            Ok(status) => Some(status),
            Err(response) => return response,
        },
        None => None,
    };
    if let Err(err) = state.queues.find_queue(&ctx, &path.queue_id).await {
        return queue_failure(err);
    }
    match state.queues.list_tickets(&ctx, &path.queue_id, status).await {
        Ok(items) => {
            let data: Vec<TicketDto> = items.into_iter().map(ticket_to_dto).collect();
            (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
        }
        Err(err) => queue_failure(err),
    }
}

/// 叫下一位：紧急优先，同优先级先到先叫
pub async fn call_next(
    State(state): State<AppState>,
    Path(path): Path<QueuePath>,
    headers: HeaderMap,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::QUEUE_OPERATE) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    match state
        .queues
        .call_next(&ctx, &path.queue_id, Some(ctx.actor_id.as_str()))
        .await
    {
        Ok(ticket) => {
            info!(
                target: "reception.api",
                queue_id = %ticket.queue_id,
                ticket_number = %ticket.number,
                actor = %ctx.actor_id,
                "ticket_called"
            );
            publish_ticket_event(&state, EventType::TicketCalled, &ticket).await;
            (StatusCode::OK, Json(ApiResponse::success(ticket_to_dto(ticket)))).into_response()
        }
        Err(err) => queue_failure(err),
    }
}

/// 票据状态变更
pub async fn transition_ticket(
    State(state): State<AppState>,
    Path(path): Path<TicketPath>,
    headers: HeaderMap,
    Json(req): Json<TransitionTicketRequest>,
) -> Response {
    let ctx = match authorize(&state, &headers, &path.practice_id, permissions::QUEUE_OPERATE) {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    let next = match parse_enum(&req.status, "status", TicketStatus::parse) {
        Ok(status) => status,
        Err(response) => return response,
    };
    match state
        .queues
        .transition(&ctx, &path.ticket_id, next, Some(ctx.actor_id.as_str()))
        .await
    {
        Ok(ticket) => {
            let event_type = match ticket.status {
                TicketStatus::Called => Some(EventType::TicketCalled),
                TicketStatus::Completed => Some(EventType::TicketCompleted),
                TicketStatus::Cancelled => Some(EventType::TicketCancelled),
                _ => None,
            };
            match event_type {
                Some(event_type) => publish_ticket_event(&state, event_type, &ticket).await,
                None => publish_queue_updated(&state, &ticket).await,
            }
            (StatusCode::OK, Json(ApiResponse::success(ticket_to_dto(ticket)))).into_response()
        }
        Err(err) => queue_failure(err),
    }
}

async fn publish_ticket_event(state: &AppState, event_type: EventType, ticket: &TicketRecord) {
    let event = EventEnvelope::new(
        event_type,
        json!({
            "ticketId": ticket.ticket_id,
            "ticketNumber": ticket.number,
            "queueId": ticket.queue_id,
            "status": ticket.status.as_str(),
            "calledBy": ticket.called_by,
        }),
        timestamp_now(),
    );
    state
        .broadcaster
        .broadcast_to_scope(&ticket.practice_id, &event)
        .await;
    // 队列屏订阅 queue:{id}，患者端订阅自己的 ticket:{number}
    for topic in [
        format!("queue:{}", ticket.queue_id),
        format!("ticket:{}", ticket.number),
    ] {
        state
            .broadcaster
            .broadcast_to_topic(&ticket.practice_id, &topic, &event)
            .await;
    }
    publish_queue_updated(state, ticket).await;
}

async fn publish_queue_updated(state: &AppState, ticket: &TicketRecord) {
    let event = EventEnvelope::new(
        EventType::QueueUpdated,
        json!({ "queueId": ticket.queue_id, "ticketNumber": ticket.number }),
        timestamp_now(),
    );
    let topic = format!("queue:{}", ticket.queue_id);
    state
        .broadcaster
        .broadcast_to_topic(&ticket.practice_id, &topic, &event)
        .await;
}
