//! 路由定义
//!
//! 集中管理所有 API 路由，将路径映射到对应的 handlers。
//! 路由包括：
//! - 健康检查与指标：/health, /metrics
//! - 设备接口：/api/check-in, /api/devices/heartbeat
//! - 员工接口：/api/practices/{id}/*
//! - 实时事件：/ws/events/{id}

use crate::AppState;
use crate::handlers::*;
use crate::middleware::request_context;
use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};

/// 创建 API 路由
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/api/check-in", post(check_in))
        .route("/api/devices/heartbeat", post(heartbeat))
        .route(
            "/api/practices/:practice_id/devices",
            get(list_devices).post(register_device),
        )
        .route(
            "/api/practices/:practice_id/devices/:device_id",
            put(update_device).delete(deactivate_device),
        )
        .route(
            "/api/practices/:practice_id/devices/:device_id/rotate-secret",
            post(rotate_secret),
        )
        .route(
            "/api/practices/:practice_id/devices/:device_id/commands",
            post(enqueue_command),
        )
        .route(
            "/api/practices/:practice_id/credentials",
            post(issue_credential),
        )
        .route(
            "/api/practices/:practice_id/credentials/:token_id",
            delete(revoke_credential),
        )
        .route(
            "/api/practices/:practice_id/patients/:patient_id/credentials",
            get(list_patient_credentials),
        )
        .route("/api/practices/:practice_id/queues", get(queue_summary))
        .route(
            "/api/practices/:practice_id/queues/:queue_id/stats",
            get(queue_stats),
        )
        .route(
            "/api/practices/:practice_id/queues/:queue_id/tickets",
            get(list_tickets),
        )
        .route(
            "/api/practices/:practice_id/queues/:queue_id/call-next",
            post(call_next),
        )
        .route(
            "/api/practices/:practice_id/tickets/:ticket_id/status",
            post(transition_ticket),
        )
        .route("/api/practices/:practice_id/check-ins", get(list_check_ins))
        .route(
            "/api/practices/:practice_id/routes/:route_id/activate",
            post(activate_route),
        )
        .route(
            "/api/practices/:practice_id/routes/:route_id/deactivate",
            post(deactivate_route),
        )
        .route("/api/practices/:practice_id/led/command", post(led_command))
        .route("/api/practices/:practice_id/led/off", post(led_off))
        .route(
            "/api/practices/:practice_id/wait-times",
            get(wait_time_overview),
        )
        .route("/ws/events/:practice_id", get(events_ws))
}

/// 组装完整应用：路由 + 状态 + 请求上下文中间件
pub fn create_router(state: AppState) -> Router {
    create_api_router()
        .with_state(state)
        .layer(middleware::from_fn(request_context))
}
