//! 认证和授权中间件
//!
//! - request_context：请求上下文中间件，注入 request_id/trace_id
//! - bearer_token：从 Authorization 头提取 Bearer token
//! - require_staff：校验员工 token，得到 PracticeContext
//! - require_practice_scope：token 所属诊所必须与路径一致
//! - require_permission：校验操作权限码
//!
//! 设备接口不经过这里，设备只用设备密钥认证。

use axum::{
    body::Body,
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use domain::PracticeContext;
use reception_telemetry::new_request_ids;
use tracing::{Instrument, info_span};

use crate::AppState;
use crate::utils::response::{auth_error, auth_failure, forbidden_error};

/// 请求上下文中间件：注入 request_id/trace_id
pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let ids = new_request_ids();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response: Response = next.run(req).instrument(span).await;
    response.headers_mut().insert(
        "x-request-id",
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        "x-trace-id",
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response
}

/// 从请求头中提取 Bearer token
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header_value = headers.get(header::AUTHORIZATION)?;
    let auth_str = header_value.to_str().ok()?;
    auth_str.strip_prefix("Bearer ")
}

/// 校验 token 字符串
pub fn verify_staff_token(state: &AppState, token: &str) -> Result<PracticeContext, Response> {
    state.staff_tokens.verify(token).map_err(auth_failure)
}

/// 验证 Bearer token 并提取员工上下文
pub fn require_staff(state: &AppState, headers: &HeaderMap) -> Result<PracticeContext, Response> {
    let token = match bearer_token(headers) {
        Some(token) => token,
        None => return Err(auth_error(StatusCode::UNAUTHORIZED)),
    };
    verify_staff_token(state, token)
}

/// 验证诊所归属：token 的诊所必须与路径中的诊所一致
pub fn require_practice_scope(
    state: &AppState,
    headers: &HeaderMap,
    practice_id: &str,
) -> Result<PracticeContext, Response> {
    let ctx = require_staff(state, headers)?;
    ensure_practice(ctx, practice_id)
}

pub fn ensure_practice(
    ctx: PracticeContext,
    practice_id: &str,
) -> Result<PracticeContext, Response> {
    if ctx.practice_scope.as_deref() == Some(practice_id) {
        Ok(ctx)
    } else {
        Err(forbidden_error())
    }
}

/// 验证操作权限码
pub fn require_permission(ctx: &PracticeContext, permission: &str) -> Result<(), Response> {
    if ctx.has_permission(permission) {
        Ok(())
    } else {
        Err(forbidden_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_extracts() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer token-1"),
        );
        assert_eq!(bearer_token(&headers), Some("token-1"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn practice_scope_must_match() {
        let ctx = PracticeContext::new(
            "staff-1",
            Vec::new(),
            vec!["QUEUE.READ".to_string()],
            Some("practice-1".to_string()),
        );
        assert!(ensure_practice(ctx.clone(), "practice-1").is_ok());
        assert!(ensure_practice(ctx.clone(), "practice-2").is_err());
        assert!(require_permission(&ctx, "QUEUE.READ").is_ok());
        assert!(require_permission(&ctx, "DEVICE.MANAGE").is_err());
    }
}
