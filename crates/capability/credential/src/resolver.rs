//! 凭证生命周期：签发、解析、撤销、按患者列出。

use crate::cipher::IdentifierCipher;
use crate::digest::{LookupHasher, mask_identifier, normalize_identifier};
use crate::CredentialError;
use domain::{CredentialType, PracticeContext};
use reception_storage::{CredentialRecord, CredentialStore, PatientDirectory};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// 签发凭证输入。
#[derive(Debug, Clone)]
pub struct IssueCredential {
    pub practice_id: String,
    pub patient_id: String,
    pub raw_identifier: String,
    pub card_type: CredentialType,
    pub label: Option<String>,
    pub expires_at_ms: Option<i64>,
}

/// 解析结果。
///
/// 未命中时带回查找摘要，供签到审计记录。
#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved(CredentialRecord),
    NotFound { lookup_digest: String },
    Expired(CredentialRecord),
    Inactive(CredentialRecord),
}

impl Resolution {
    pub fn credential(&self) -> Option<&CredentialRecord> {
        match self {
            Resolution::Resolved(record) => Some(record),
            _ => None,
        }
    }

    /// 审计用失败原因；成功时为 None。
    pub fn failure_reason(&self) -> Option<&'static str> {
        match self {
            Resolution::Resolved(_) => None,
            Resolution::NotFound { .. } => Some("credential_not_found"),
            Resolution::Expired(_) => Some("credential_expired"),
            Resolution::Inactive(_) => Some("credential_inactive"),
        }
    }

    pub fn lookup_digest(&self) -> &str {
        match self {
            Resolution::Resolved(record)
            | Resolution::Expired(record)
            | Resolution::Inactive(record) => &record.lookup_digest,
            Resolution::NotFound { lookup_digest } => lookup_digest,
        }
    }
}

/// 面向员工的凭证视图（标识已掩码）。
#[derive(Debug, Clone)]
pub struct CredentialView {
    pub record: CredentialRecord,
    pub masked_identifier: String,
}

/// 凭证解析器。
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
    patients: Arc<dyn PatientDirectory>,
    hasher: LookupHasher,
    cipher: IdentifierCipher,
}

impl CredentialResolver {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        patients: Arc<dyn PatientDirectory>,
        hasher: LookupHasher,
        cipher: IdentifierCipher,
    ) -> Self {
        Self {
            store,
            patients,
            hasher,
            cipher,
        }
    }

    /// 签发凭证。
    ///
    /// 摘要已被启用凭证占用时返回 `AlreadyRegistered`；
    /// 被本诊所已停用凭证占用时重新绑定该凭证。
    pub async fn issue(
        &self,
        ctx: &PracticeContext,
        input: IssueCredential,
    ) -> Result<CredentialRecord, CredentialError> {
        let normalized = normalize_identifier(&input.raw_identifier);
        if normalized.is_empty() {
            return Err(CredentialError::InvalidIdentifier);
        }
        let patient = self
            .patients
            .find_patient(ctx, &input.patient_id)
            .await?
            .filter(|patient| patient.practice_id == input.practice_id && patient.is_active)
            .ok_or(CredentialError::PatientNotFound)?;

        let lookup_digest = self.hasher.digest(&normalized)?;
        let encrypted_identifier = self.cipher.encrypt(&normalized)?;
        let now = now_epoch_ms();
        let existing = self
            .store
            .find_by_digest(&PracticeContext::system(), &lookup_digest)
            .await?;

        let record = CredentialRecord {
            token_id: uuid::Uuid::new_v4().to_string(),
            practice_id: input.practice_id,
            patient_id: patient.patient_id,
            lookup_digest,
            encrypted_identifier,
            card_type: input.card_type,
            label: input.label,
            expires_at_ms: input.expires_at_ms,
            is_active: true,
            issued_at_ms: now,
            last_used_at_ms: None,
            revoked_at_ms: None,
        };

        let record = match existing {
            None => self.store.create_credential(ctx, record).await.map_err(|err| {
                if err.message() == "credential identifier exists" {
                    CredentialError::AlreadyRegistered
                } else {
                    CredentialError::from(err)
                }
            })?,
            Some(existing) if existing.is_active || existing.practice_id != record.practice_id => {
                return Err(CredentialError::AlreadyRegistered);
            }
            Some(existing) => {
                let rebound = CredentialRecord {
                    token_id: existing.token_id,
                    ..record
                };
                if !self.store.replace_credential(ctx, rebound.clone()).await? {
                    return Err(CredentialError::AlreadyRegistered);
                }
                rebound
            }
        };
        info!(
            target: "reception.credential",
            practice_id = %record.practice_id,
            token_id = %record.token_id,
            card_type = record.card_type.as_str(),
            digest_prefix = digest_prefix(&record.lookup_digest),
            "credential_issued"
        );
        Ok(record)
    }

    /// 解析原始标识；过期、停用或未找到时返回 None。
    pub async fn resolve(
        &self,
        ctx: &PracticeContext,
        raw_identifier: &str,
    ) -> Result<Option<CredentialRecord>, CredentialError> {
        match self.resolve_detailed(ctx, raw_identifier).await? {
            Resolution::Resolved(record) => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    /// 解析原始标识并区分失败原因。成功时记录最近使用时间。
    pub async fn resolve_detailed(
        &self,
        ctx: &PracticeContext,
        raw_identifier: &str,
    ) -> Result<Resolution, CredentialError> {
        let normalized = normalize_identifier(raw_identifier);
        let lookup_digest = self.hasher.digest(&normalized)?;
        if normalized.is_empty() {
            return Ok(Resolution::NotFound { lookup_digest });
        }
        let Some(record) = self.store.find_by_digest(ctx, &lookup_digest).await? else {
            warn!(
                target: "reception.credential",
                digest_prefix = digest_prefix(&lookup_digest),
                "credential_not_found"
            );
            return Ok(Resolution::NotFound { lookup_digest });
        };
        if !record.is_active {
            return Ok(Resolution::Inactive(record));
        }
        let now = now_epoch_ms();
        if record.expires_at_ms.is_some_and(|expires| now >= expires) {
            return Ok(Resolution::Expired(record));
        }
        self.store
            .touch_credential(ctx, &record.token_id, now)
            .await?;
        Ok(Resolution::Resolved(CredentialRecord {
            last_used_at_ms: Some(now),
            ..record
        }))
    }

    /// 撤销凭证（幂等）；返回本次是否实际停用。
    pub async fn revoke(
        &self,
        ctx: &PracticeContext,
        token_id: &str,
    ) -> Result<bool, CredentialError> {
        if self.store.find_credential(ctx, token_id).await?.is_none() {
            return Err(CredentialError::NotFound);
        }
        let revoked = self
            .store
            .deactivate_credential(ctx, token_id, now_epoch_ms())
            .await?;
        if revoked {
            info!(target: "reception.credential", token_id = %token_id, "credential_revoked");
        }
        Ok(revoked)
    }

    /// 列出患者凭证，标识解密后只保留末 4 位。
    pub async fn list_for_patient(
        &self,
        ctx: &PracticeContext,
        patient_id: &str,
    ) -> Result<Vec<CredentialView>, CredentialError> {
        let records = self.store.list_patient_credentials(ctx, patient_id).await?;
        records
            .into_iter()
            .map(|record| {
                let plain = self.cipher.decrypt(&record.encrypted_identifier)?;
                Ok(CredentialView {
                    masked_identifier: mask_identifier(&plain),
                    record,
                })
            })
            .collect()
    }
}

fn digest_prefix(digest: &str) -> &str {
    digest.get(..8).unwrap_or(digest)
}

/// 当前时间戳（毫秒）。
fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
