//! 实时事件 WebSocket
//!
//! - GET /ws/events/{practice_id}?topics=a,b&token=...
//!
//! 浏览器无法为 WebSocket 设置 Authorization 头，token 也可放在查询参数中。
//! 连接生命周期：
//! 1. 升级前校验 token、诊所归属与 EVENTS.SUBSCRIBE 权限
//! 2. 在 Broadcaster 注册连接（欢迎消息由 Broadcaster 写入）
//! 3. 出站：转发连接队列中的消息；入站：交给 Broadcaster 处理控制消息
//! 4. 任一方向结束即注销连接

use crate::AppState;
use crate::middleware::{
    bearer_token, ensure_practice, require_permission, verify_staff_token,
};
use crate::utils::response::auth_error;
use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::Response,
};
use domain::permissions;
use futures::{SinkExt, StreamExt};
use reception_realtime::Broadcaster;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(serde::Deserialize)]
pub struct PracticePath {
    practice_id: String,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct EventsQuery {
    pub topics: Option<String>,
    pub token: Option<String>,
}

/// 逗号分隔的主题列表
pub fn parse_topics(raw: Option<&str>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|topic| !topic.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

pub async fn events_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(path): Path<PracticePath>,
    Query(query): Query<EventsQuery>,
    headers: HeaderMap,
) -> Response {
    let token = match bearer_token(&headers).or(query.token.as_deref()) {
        Some(token) => token,
        None => return auth_error(StatusCode::UNAUTHORIZED),
    };
    let ctx = match verify_staff_token(&state, token)
        .and_then(|ctx| ensure_practice(ctx, &path.practice_id))
    {
        Ok(ctx) => ctx,
        Err(response) => return response,
    };
    if let Err(response) = require_permission(&ctx, permissions::EVENTS_SUBSCRIBE) {
        return response;
    }
    let topics = parse_topics(query.topics.as_deref());
    let broadcaster = state.broadcaster.clone();
    let practice_id = path.practice_id;
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster, practice_id, topics))
}

async fn handle_socket(
    socket: WebSocket,
    broadcaster: Arc<Broadcaster>,
    practice_id: String,
    topics: Vec<String>,
) {
    let (mut sender, mut receiver) = socket.split();
    let mut handle = broadcaster.connect(&practice_id, &topics).await;
    let connection_id = handle.id;

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = handle.receiver.recv().await {
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let inbound = broadcaster.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    inbound.handle_client_message(connection_id, &text).await;
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(err) => {
                    debug!(
                        target: "reception.api",
                        connection_id,
                        error = %err,
                        "ws_receive_failed"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    broadcaster.disconnect(connection_id).await;
    info!(
        target: "reception.api",
        practice_id = %practice_id,
        connection_id,
        "ws_closed"
    );
}

#[cfg(test)]
mod tests {
    use super::parse_topics;

    #[test]
    fn splits_topic_list() {
        assert_eq!(
            parse_topics(Some("queue:q1, wait_times,,")),
            vec!["queue:q1".to_string(), "wait_times".to_string()]
        );
        assert!(parse_topics(None).is_empty());
    }
}
