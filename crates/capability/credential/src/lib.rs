//! 凭证解析能力：卡片/手机/二维码标识到患者身份的映射。
//!
//! 原始标识只以两种形式落库：
//! - 查找摘要：hex(HMAC-SHA256(lookup key, 规范化标识))，全局唯一
//! - 加密副本：base64(nonce ‖ AES-256-GCM 密文)

mod cipher;
mod digest;
mod resolver;

pub use cipher::IdentifierCipher;
pub use digest::{LookupHasher, mask_identifier, normalize_identifier};
pub use resolver::{CredentialResolver, CredentialView, IssueCredential, Resolution};

/// 凭证相关错误。
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential not found")]
    NotFound,
    #[error("credential already registered")]
    AlreadyRegistered,
    #[error("patient not found")]
    PatientNotFound,
    #[error("invalid identifier")]
    InvalidIdentifier,
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("crypto error: {0}")]
    Crypto(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reception_storage::StorageError> for CredentialError {
    fn from(err: reception_storage::StorageError) -> Self {
        CredentialError::Storage(err.to_string())
    }
}
