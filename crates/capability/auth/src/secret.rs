use crate::AuthError;
use argon2::{
    Argon2,
    PasswordHash,
    PasswordHasher,
    PasswordVerifier,
    password_hash::SaltString,
};
use rand_core::{OsRng, RngCore};
use std::sync::OnceLock;

/// 设备密钥字节数（十六进制后 64 字符）。
const SECRET_BYTES: usize = 32;

/// 生成一次性设备密钥。
pub fn generate_secret() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// argon2 哈希（同步，调用方负责放到阻塞线程池）。
pub fn hash_secret(secret: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|err| AuthError::Internal(err.to_string()))?;
    Ok(hash.to_string())
}

/// 校验密钥；哈希无法解析时视为不匹配。
pub fn verify_secret(stored_hash: &str, secret: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

/// 在阻塞线程池中生成哈希。
pub(crate) async fn hash_secret_blocking(secret: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || hash_secret(&secret))
        .await
        .map_err(|err| AuthError::Internal(err.to_string()))?
}

/// 在阻塞线程池中校验密钥。
///
/// `stored_hash` 为 None（未知设备）时对占位哈希做一次校验，使耗时与真实设备一致。
pub(crate) async fn verify_secret_blocking(
    stored_hash: Option<String>,
    secret: String,
) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || match stored_hash {
        Some(hash) => Ok(verify_secret(&hash, &secret)),
        None => {
            let dummy = dummy_hash()?;
            let _ = verify_secret(dummy, &secret);
            Ok(false)
        }
    })
    .await
    .map_err(|err| AuthError::Internal(err.to_string()))?
}

fn dummy_hash() -> Result<&'static str, AuthError> {
    static DUMMY: OnceLock<String> = OnceLock::new();
    if let Some(hash) = DUMMY.get() {
        return Ok(hash.as_str());
    }
    let hash = hash_secret(&generate_secret())?;
    Ok(DUMMY.get_or_init(|| hash).as_str())
}
