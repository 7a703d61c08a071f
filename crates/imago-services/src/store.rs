//! In-memory record store
//!
//! Mutex-guarded map implementing `RecordStore`, used by the integration
//! tests and by single-process deployments that do not need durable
//! storage. The `compare_and_update` guard is checked under the same lock
//! as the write, so it is a real compare-and-swap.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use imago_core::error::AppError;
use imago_core::hooks::RecordStore;
use imago_core::models::{ImageRecord, ImageStatus};

#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<HashMap<Uuid, ImageRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ImageRecord>> {
        // Lock poisoning only happens if a holder panicked; the map itself
        // is still consistent because every write is a whole-record insert.
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, id: Uuid) -> Result<Option<ImageRecord>, AppError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn get_by_custom_id(&self, custom_id: &str) -> Result<Option<ImageRecord>, AppError> {
        Ok(self
            .lock()
            .values()
            .find(|r| r.custom_id.as_deref() == Some(custom_id))
            .cloned())
    }

    async fn get_by_remote_id(&self, remote_id: &str) -> Result<Option<ImageRecord>, AppError> {
        Ok(self
            .lock()
            .values()
            .find(|r| r.remote_identifier() == Some(remote_id))
            .cloned())
    }

    async fn create(&self, record: &ImageRecord) -> Result<(), AppError> {
        let mut records = self.lock();
        if let Some(custom_id) = record.custom_id.as_deref() {
            let taken = records.values().any(|r| {
                r.custom_id.as_deref() == Some(custom_id) && r.status != ImageStatus::Deleted
            });
            if taken {
                return Err(AppError::DuplicateCustomId(custom_id.to_string()));
            }
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn compare_and_update(
        &self,
        id: Uuid,
        expected_status: ImageStatus,
        record: &ImageRecord,
    ) -> Result<(), AppError> {
        let mut records = self.lock();
        let current = records
            .get(&id)
            .ok_or_else(|| AppError::UnknownRecord(id.to_string()))?;
        if current.status != expected_status {
            return Err(AppError::Conflict(format!(
                "expected status {} but found {}",
                expected_status, current.status
            )));
        }
        records.insert(id, record.clone());
        Ok(())
    }

    async fn list_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ImageRecord>, AppError> {
        Ok(self
            .lock()
            .values()
            .filter(|r| {
                r.status == ImageStatus::Pending
                    && r.upload_expires_at.map(|at| now > at).unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}
