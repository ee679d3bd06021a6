use crate::CredentialError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// 标识规范化：去首尾空白、转大写、去掉 `:`、`-` 与空白。
///
/// 读卡器上报的 UID 可能是 `04:a2:3b:...` 或 `04A23B...`，两者须得到同一摘要。
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-' && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// 掩码展示：只保留最后 4 个字符。
pub fn mask_identifier(identifier: &str) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

/// 带密钥的查找摘要。
#[derive(Clone)]
pub struct LookupHasher {
    key: Vec<u8>,
}

impl LookupHasher {
    pub fn new(key: &[u8]) -> Result<Self, CredentialError> {
        if key.is_empty() {
            return Err(CredentialError::InvalidKey("lookup key empty".to_string()));
        }
        Ok(Self { key: key.to_vec() })
    }

    /// 对已规范化的标识计算摘要。
    pub fn digest(&self, normalized: &str) -> Result<String, CredentialError> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|err| CredentialError::InvalidKey(err.to_string()))?;
        mac.update(normalized.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}
