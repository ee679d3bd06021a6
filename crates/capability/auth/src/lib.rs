//! 认证能力：设备注册与认证、员工 token 校验。

mod jwt;
mod registry;
mod secret;

pub use jwt::{StaffClaims, StaffTokenVerifier};
pub use registry::{DeviceRegistry, HeartbeatMetadata, HeartbeatOutcome, NewDevice};
pub use secret::{generate_secret, hash_secret, verify_secret};

/// 认证相关错误。
///
/// `AuthenticationFailed` 对外不区分原因（未知设备、密钥错误、设备停用）。
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("device serial already registered")]
    DuplicateSerial,
    #[error("device not found")]
    DeviceNotFound,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("token expired")]
    TokenExpired,
    #[error("token invalid")]
    TokenInvalid,
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reception_storage::StorageError> for AuthError {
    fn from(err: reception_storage::StorageError) -> Self {
        AuthError::Storage(err.to_string())
    }
}
