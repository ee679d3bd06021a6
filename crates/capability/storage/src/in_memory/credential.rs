//! 凭证内存存储实现

use crate::error::StorageError;
use crate::models::CredentialRecord;
use crate::traits::CredentialStore;
use crate::validation::{ensure_practice_scope, in_scope};
use domain::PracticeContext;
use std::collections::HashMap;
use std::sync::RwLock;

/// 凭证内存存储
///
/// 以 token_id 为主键，查找摘要全局唯一。
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<String, CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            credentials: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn create_credential(
        &self,
        ctx: &PracticeContext,
        record: CredentialRecord,
    ) -> Result<CredentialRecord, StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        let mut map = self
            .credentials
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if map.contains_key(&record.token_id) {
            return Err(StorageError::new("credential exists"));
        }
        if map
            .values()
            .any(|item| item.lookup_digest == record.lookup_digest)
        {
            return Err(StorageError::new("credential identifier exists"));
        }
        map.insert(record.token_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_digest(
        &self,
        ctx: &PracticeContext,
        lookup_digest: &str,
    ) -> Result<Option<CredentialRecord>, StorageError> {
        let item = self
            .credentials
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .values()
            .find(|item| item.lookup_digest == lookup_digest)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn find_credential(
        &self,
        ctx: &PracticeContext,
        token_id: &str,
    ) -> Result<Option<CredentialRecord>, StorageError> {
        let item = self
            .credentials
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(token_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }

    async fn replace_credential(
        &self,
        ctx: &PracticeContext,
        record: CredentialRecord,
    ) -> Result<bool, StorageError> {
        ensure_practice_scope(ctx, &record.practice_id)?;
        let mut map = self
            .credentials
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        match map.get_mut(&record.token_id) {
            Some(existing) if in_scope(ctx, &existing.practice_id) => {
                *existing = record;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_patient_credentials(
        &self,
        ctx: &PracticeContext,
        patient_id: &str,
    ) -> Result<Vec<CredentialRecord>, StorageError> {
        let map = self
            .credentials
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<CredentialRecord> = map
            .values()
            .filter(|item| item.patient_id == patient_id && in_scope(ctx, &item.practice_id))
            .cloned()
            .collect();
        items.sort_by_key(|item| item.issued_at_ms);
        Ok(items)
    }

    async fn deactivate_credential(
        &self,
        ctx: &PracticeContext,
        token_id: &str,
        at_ms: i64,
    ) -> Result<bool, StorageError> {
        let mut map = self
            .credentials
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        match map.get_mut(token_id) {
            Some(item) if in_scope(ctx, &item.practice_id) && item.is_active => {
                item.is_active = false;
                item.revoked_at_ms = Some(at_ms);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn touch_credential(
        &self,
        ctx: &PracticeContext,
        token_id: &str,
        at_ms: i64,
    ) -> Result<(), StorageError> {
        let mut map = self
            .credentials
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if let Some(item) = map.get_mut(token_id) {
            if in_scope(ctx, &item.practice_id) {
                item.last_used_at_ms = Some(at_ms);
            }
        }
        Ok(())
    }
}
