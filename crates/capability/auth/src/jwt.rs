use crate::AuthError;
use domain::PracticeContext;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// 员工 access token claims（由身份服务签发）。
#[derive(Debug, Serialize, Deserialize)]
pub struct StaffClaims {
    pub sub: String,
    pub practice_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize,
}

/// 员工 token 校验（只校验，不签发）。
pub struct StaffTokenVerifier {
    secret: Vec<u8>,
}

impl StaffTokenVerifier {
    pub fn new(secret: String) -> Self {
        Self {
            secret: secret.into_bytes(),
        }
    }

    /// 校验 token 并转换为限定到诊所的 PracticeContext。
    pub fn verify(&self, token: &str) -> Result<PracticeContext, AuthError> {
        let claims = self.decode_claims(token)?;
        if claims.practice_id.is_empty() {
            return Err(AuthError::TokenInvalid);
        }
        Ok(PracticeContext::new(
            claims.sub,
            claims.roles,
            claims.permissions,
            Some(claims.practice_id),
        ))
    }

    fn decode_claims(&self, token: &str) -> Result<StaffClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let decoded = jsonwebtoken::decode::<StaffClaims>(
            token,
            &DecodingKey::from_secret(&self.secret),
            &validation,
        )
        .map_err(map_jwt_error)?;
        Ok(decoded.claims)
    }
}

/// 将 jwt 库错误映射为业务错误。
fn map_jwt_error(err: jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid,
    }
}
