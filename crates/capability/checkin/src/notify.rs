//! 推送通知协作方
//!
//! 实际投递由外部服务完成；本服务只把通知 POST 到配置的 webhook，
//! 并附带 `X-Signature-256: sha256=<hex>` 签名头。

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::{Value, json};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification unavailable: {0}")]
    Unavailable(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// 通知接收方。
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Audience {
    Patient { patient_id: String },
    Staff { role: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub practice_id: String,
    pub audience: Audience,
    pub notification_type: &'static str,
    pub title: String,
    pub body: String,
    pub data: Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// 未配置 webhook 时使用。
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    secret: Option<String>,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        secret: Option<String>,
        timeout_ms: u64,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| NotifyError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
            secret,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = serde_json::to_string(&json!({ "notification": notification }))
            .map_err(|err| NotifyError::Rejected(err.to_string()))?;
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.secret {
            let signature = sign_payload(&body, secret)?;
            request = request.header("X-Signature-256", format!("sha256={}", signature));
        }
        let response = request
            .body(body)
            .send()
            .await
            .map_err(|err| NotifyError::Unavailable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(format!(
                "webhook responded {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// hex(HMAC-SHA256(secret, payload))。
pub fn sign_payload(payload: &str, secret: &str) -> Result<String, NotifyError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| NotifyError::Rejected(err.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_stable_and_keyed() {
        let first = sign_payload(r#"{"a":1}"#, "secret").expect("sign");
        let again = sign_payload(r#"{"a":1}"#, "secret").expect("sign");
        let other = sign_payload(r#"{"a":1}"#, "other").expect("sign");
        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn audience_is_tagged() {
        let value = serde_json::to_value(Audience::Staff {
            role: "mfa".to_string(),
        })
        .expect("json");
        assert_eq!(value, json!({ "kind": "staff", "role": "mfa" }));
    }
}
