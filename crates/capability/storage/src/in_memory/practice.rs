//! 诊所与患者目录内存实现
//!
//! 诊所和患者由外部管理面维护，这里只提供插入（种子数据）与只读查询。

use crate::error::StorageError;
use crate::models::{PatientRecord, PracticeRecord};
use crate::traits::{PatientDirectory, PracticeStore};
use crate::validation::in_scope;
use domain::PracticeContext;
use std::collections::HashMap;
use std::sync::RwLock;

/// 诊所内存存储
pub struct InMemoryPracticeStore {
    practices: RwLock<HashMap<String, PracticeRecord>>,
}

impl InMemoryPracticeStore {
    pub fn new() -> Self {
        Self {
            practices: RwLock::new(HashMap::new()),
        }
    }

    /// 插入或覆盖诊所（种子数据）
    pub fn insert_practice(&self, record: PracticeRecord) -> Result<(), StorageError> {
        let mut map = self
            .practices
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(record.practice_id.clone(), record);
        Ok(())
    }
}

impl Default for InMemoryPracticeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PracticeStore for InMemoryPracticeStore {
    async fn list_practices(
        &self,
        ctx: &PracticeContext,
    ) -> Result<Vec<PracticeRecord>, StorageError> {
        let map = self
            .practices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut items: Vec<PracticeRecord> = map
            .values()
            .filter(|item| in_scope(ctx, &item.practice_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn find_practice(
        &self,
        ctx: &PracticeContext,
        practice_id: &str,
    ) -> Result<Option<PracticeRecord>, StorageError> {
        let item = self
            .practices
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(practice_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }
}

/// 患者目录内存实现
pub struct InMemoryPatientDirectory {
    patients: RwLock<HashMap<String, PatientRecord>>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self {
            patients: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert_patient(&self, record: PatientRecord) -> Result<(), StorageError> {
        let mut map = self
            .patients
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        map.insert(record.patient_id.clone(), record);
        Ok(())
    }
}

impl Default for InMemoryPatientDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn find_patient(
        &self,
        ctx: &PracticeContext,
        patient_id: &str,
    ) -> Result<Option<PatientRecord>, StorageError> {
        let item = self
            .patients
            .read()
            .map_err(|_| StorageError::new("lock failed"))?
            .get(patient_id)
            .cloned()
            .filter(|item| in_scope(ctx, &item.practice_id));
        Ok(item)
    }
}
