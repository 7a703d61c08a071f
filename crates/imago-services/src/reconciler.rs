//! Expiry reconciler
//!
//! Periodic sweep that expires pending records whose upload deadline has
//! passed. Each record is committed with a compare-and-swap expecting
//! `pending`; a webhook landing mid-sweep wins the race and the record is
//! skipped. The sweep never fails as a whole over one contested record.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use imago_core::error::AppError;
use imago_core::hooks::RecordStore;
use imago_core::lifecycle::{apply, LifecycleEvent};
use imago_core::models::ImageStatus;

pub struct ExpiryReconciler {
    store: Arc<dyn RecordStore>,
}

impl ExpiryReconciler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Expire overdue pending records as of `now`. Returns how many were
    /// transitioned.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let candidates = self.store.list_expired_pending(now).await?;
        let mut expired = 0usize;

        for record in candidates {
            let transition = match apply(&record, &LifecycleEvent::Expire, now) {
                Ok(t) => t,
                Err(err) => {
                    // Candidate list can lag the store; a record already
                    // moved on is not this sweep's problem.
                    tracing::debug!(record_id = %record.id, error = %err, "Skipping candidate");
                    continue;
                }
            };

            match self
                .store
                .compare_and_update(record.id, ImageStatus::Pending, &transition.record)
                .await
            {
                Ok(()) => {
                    expired += 1;
                    tracing::info!(record_id = %record.id, "Pending upload expired");
                }
                Err(AppError::Conflict(_)) | Err(AppError::UnknownRecord(_)) => {
                    // A webhook won the race.
                    tracing::debug!(record_id = %record.id, "Lost expiry race, skipping");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use chrono::Duration;
    use imago_core::models::ImageRecord;

    fn pending_expiring_at(at: DateTime<Utc>, now: DateTime<Utc>) -> ImageRecord {
        ImageRecord::new_pending(None, uuid::Uuid::new_v4().to_string(), false, None, at, now)
    }

    #[tokio::test]
    async fn test_sweep_expires_only_overdue() {
        let store = Arc::new(InMemoryRecordStore::new());
        let now = Utc::now();
        let overdue = pending_expiring_at(now - Duration::seconds(10), now);
        let fresh = pending_expiring_at(now + Duration::seconds(3600), now);
        store.create(&overdue).await.unwrap();
        store.create(&fresh).await.unwrap();

        let reconciler = ExpiryReconciler::new(store.clone());
        assert_eq!(reconciler.sweep(now).await.unwrap(), 1);

        let overdue = store.get(overdue.id).await.unwrap().unwrap();
        assert_eq!(overdue.status, ImageStatus::Expired);
        // Leaving pending still promotes the upload reference.
        assert!(overdue.remote_id.is_some());

        let fresh = store.get(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, ImageStatus::Pending);
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let store = Arc::new(InMemoryRecordStore::new());
        let now = Utc::now();
        let overdue = pending_expiring_at(now - Duration::seconds(10), now);
        store.create(&overdue).await.unwrap();

        let reconciler = ExpiryReconciler::new(store.clone());
        assert_eq!(reconciler.sweep(now).await.unwrap(), 1);
        assert_eq!(reconciler.sweep(now).await.unwrap(), 0);
    }

    /// Store whose candidate listing lags the stored state, to force the
    /// sweep into the compare-and-swap conflict path.
    struct StaleListStore {
        inner: InMemoryRecordStore,
        stale: ImageRecord,
    }

    #[async_trait::async_trait]
    impl RecordStore for StaleListStore {
        async fn get(&self, id: uuid::Uuid) -> Result<Option<ImageRecord>, AppError> {
            self.inner.get(id).await
        }

        async fn get_by_custom_id(
            &self,
            custom_id: &str,
        ) -> Result<Option<ImageRecord>, AppError> {
            self.inner.get_by_custom_id(custom_id).await
        }

        async fn get_by_remote_id(
            &self,
            remote_id: &str,
        ) -> Result<Option<ImageRecord>, AppError> {
            self.inner.get_by_remote_id(remote_id).await
        }

        async fn create(&self, record: &ImageRecord) -> Result<(), AppError> {
            self.inner.create(record).await
        }

        async fn compare_and_update(
            &self,
            id: uuid::Uuid,
            expected_status: ImageStatus,
            record: &ImageRecord,
        ) -> Result<(), AppError> {
            self.inner.compare_and_update(id, expected_status, record).await
        }

        async fn list_expired_pending(
            &self,
            _now: DateTime<Utc>,
        ) -> Result<Vec<ImageRecord>, AppError> {
            Ok(vec![self.stale.clone()])
        }
    }

    #[tokio::test]
    async fn test_lost_race_is_skipped() {
        let inner = InMemoryRecordStore::new();
        let now = Utc::now();
        let overdue = pending_expiring_at(now - Duration::seconds(10), now);
        inner.create(&overdue).await.unwrap();

        // A webhook lands after the candidate listing was taken but before
        // the sweep commits: the stored record is already uploaded while
        // the listing still reports it pending.
        let transition = apply(&overdue, &LifecycleEvent::UploadComplete { seq: 1 }, now).unwrap();
        inner
            .compare_and_update(overdue.id, ImageStatus::Pending, &transition.record)
            .await
            .unwrap();

        let store = Arc::new(StaleListStore {
            inner,
            stale: overdue.clone(),
        });
        let reconciler = ExpiryReconciler::new(store.clone());
        assert_eq!(reconciler.sweep(now).await.unwrap(), 0);
        let record = store.get(overdue.id).await.unwrap().unwrap();
        assert_eq!(record.status, ImageStatus::Uploaded);
    }
}
