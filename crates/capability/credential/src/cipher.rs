use crate::CredentialError;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand_core::{OsRng, RngCore};

const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;

/// 原始标识加密（AES-256-GCM）。
#[derive(Clone)]
pub struct IdentifierCipher {
    key: [u8; KEY_SIZE],
}

impl IdentifierCipher {
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// 从 base64 配置值构造，要求解码后正好 32 字节。
    pub fn from_base64(value: &str) -> Result<Self, CredentialError> {
        let bytes = BASE64
            .decode(value.trim())
            .map_err(|err| CredentialError::InvalidKey(err.to_string()))?;
        let key: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| {
            CredentialError::InvalidKey(format!("encryption key must be {} bytes", KEY_SIZE))
        })?;
        Ok(Self::new(key))
    }

    /// 加密，输出 base64(nonce ‖ ciphertext)。
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CredentialError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CredentialError> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        if bytes.len() <= NONCE_SIZE {
            return Err(CredentialError::Crypto("ciphertext too short".to_string()));
        }
        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|err| CredentialError::Crypto(err.to_string()))?;
        String::from_utf8(plaintext).map_err(|err| CredentialError::Crypto(err.to_string()))
    }
}
