//! Webhook ingestion service
//!
//! Authenticates and applies inbound lifecycle notifications from the
//! remote API. Verification order is fixed: signature first, then
//! timestamp freshness, then body parsing. Rejection messages stay terse
//! so the endpoint is not an oracle for signature probing.
//!
//! Delivery is at-least-once, so application is idempotent: duplicates
//! and out-of-order re-deliveries are acknowledged without changing the
//! record. Commits go through the store's compare-and-swap; a conflict
//! means another writer won the race and the caller should redeliver.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use imago_core::error::AppError;
use imago_core::hooks::{Clock, RecordStore};
use imago_core::lifecycle::{apply, LifecycleEvent};
use imago_core::models::{ImageRecord, WebhookEnvelope, WebhookEventKind};

type HmacSha256 = Hmac<Sha256>;

/// Result of ingesting a webhook delivery.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub record: ImageRecord,
    /// False when the delivery was a duplicate and nothing changed.
    pub applied: bool,
}

pub struct WebhookIngestionService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    secret: String,
    tolerance_seconds: i64,
}

impl WebhookIngestionService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        secret: impl Into<String>,
        tolerance_seconds: u64,
    ) -> Self {
        Self {
            store,
            clock,
            secret: secret.into(),
            tolerance_seconds: tolerance_seconds as i64,
        }
    }

    /// Verify and apply one webhook delivery.
    ///
    /// `signature` is the hex HMAC-SHA256 of `"{timestamp}.{body}"` keyed
    /// with the shared secret, with or without a `v1=` prefix. `timestamp`
    /// is the Unix-seconds value used in that computation.
    #[tracing::instrument(skip(self, body, signature))]
    pub async fn ingest(
        &self,
        body: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<IngestOutcome, AppError> {
        self.verify_signature(body, signature, timestamp)?;
        self.verify_freshness(timestamp)?;

        let envelope: WebhookEnvelope = serde_json::from_str(body)?;
        let event = match envelope.event {
            WebhookEventKind::UploadCompleted => LifecycleEvent::UploadComplete {
                seq: envelope.sequence,
            },
            WebhookEventKind::ImageReady => LifecycleEvent::Ready {
                seq: envelope.sequence,
                variants: envelope.variants.unwrap_or_default(),
            },
            WebhookEventKind::ImageFailed => LifecycleEvent::Failed {
                seq: envelope.sequence,
                reason: envelope
                    .reason
                    .unwrap_or_else(|| "unspecified".to_string()),
            },
        };

        let record = match self.store.get_by_remote_id(&envelope.id).await? {
            Some(record) => record,
            None => {
                // Possibly a webhook racing record creation; non-fatal for
                // the caller, who may redeliver.
                tracing::debug!(remote_id = %envelope.id, "Webhook for unknown record");
                return Err(AppError::UnknownRecord(envelope.id));
            }
        };

        let transition = apply(&record, &event, self.clock.now())?;
        if transition.applied {
            self.store
                .compare_and_update(record.id, record.status, &transition.record)
                .await?;
            tracing::info!(
                record_id = %record.id,
                event = event.name(),
                status = %transition.record.status,
                "Webhook applied"
            );
        } else {
            tracing::debug!(
                record_id = %record.id,
                event = event.name(),
                sequence = envelope.sequence,
                "Duplicate webhook delivery ignored"
            );
        }

        Ok(IngestOutcome {
            record: transition.record,
            applied: transition.applied,
        })
    }

    fn verify_signature(
        &self,
        body: &str,
        signature: &str,
        timestamp: i64,
    ) -> Result<(), AppError> {
        let provided = signature.strip_prefix("v1=").unwrap_or(signature);
        let provided = hex::decode(provided).map_err(|_| AppError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body.as_bytes());

        // Constant-time comparison.
        mac.verify_slice(&provided)
            .map_err(|_| AppError::InvalidSignature)
    }

    fn verify_freshness(&self, timestamp: i64) -> Result<(), AppError> {
        let skew_seconds = (self.clock.now().timestamp() - timestamp).abs();
        if skew_seconds > self.tolerance_seconds {
            return Err(AppError::StaleTimestamp { skew_seconds });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryRecordStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use imago_core::models::ImageStatus;

    const SECRET: &str = "whsec_test";

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn sign(body: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, body).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn service_with_pending() -> (WebhookIngestionService, ImageRecord) {
        let store = Arc::new(InMemoryRecordStore::new());
        let record = ImageRecord::new_pending(
            None,
            "r-1".to_string(),
            false,
            None,
            now() + Duration::seconds(3600),
            now(),
        );
        store.create(&record).await.unwrap();
        let service = WebhookIngestionService::new(
            store,
            Arc::new(FixedClock(now())),
            SECRET,
            300,
        );
        (service, record)
    }

    #[tokio::test]
    async fn test_valid_delivery_applies() {
        let (service, record) = service_with_pending().await;
        let body = r#"{"id":"r-1","event":"upload.completed","sequence":1}"#;
        let ts = now().timestamp();

        let outcome = service.ingest(body, &sign(body, ts), ts).await.unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.record.id, record.id);
        assert_eq!(outcome.record.status, ImageStatus::Uploaded);
        assert_eq!(outcome.record.remote_id.as_deref(), Some("r-1"));
    }

    #[tokio::test]
    async fn test_v1_prefixed_signature_accepted() {
        let (service, _) = service_with_pending().await;
        let body = r#"{"id":"r-1","event":"upload.completed","sequence":1}"#;
        let ts = now().timestamp();
        let signature = format!("v1={}", sign(body, ts));

        assert!(service.ingest(body, &signature, ts).await.is_ok());
    }

    #[tokio::test]
    async fn test_bad_signature_rejected_before_parsing() {
        let (service, _) = service_with_pending().await;
        // Body is not even JSON; the signature check must fire first.
        let body = "not json";
        let ts = now().timestamp();

        let err = service.ingest(body, "deadbeef", ts).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
        assert_eq!(err.to_string(), "Invalid webhook signature");
    }

    #[tokio::test]
    async fn test_tampered_body_rejected() {
        let (service, _) = service_with_pending().await;
        let body = r#"{"id":"r-1","event":"upload.completed","sequence":1}"#;
        let ts = now().timestamp();
        let signature = sign(body, ts);
        let tampered = r#"{"id":"r-1","event":"image.ready","sequence":1}"#;

        let err = service.ingest(tampered, &signature, ts).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidSignature));
    }

    #[tokio::test]
    async fn test_stale_timestamp_rejected() {
        let (service, _) = service_with_pending().await;
        let body = r#"{"id":"r-1","event":"upload.completed","sequence":1}"#;
        let ts = now().timestamp() - 301;

        let err = service.ingest(body, &sign(body, ts), ts).await.unwrap_err();
        assert!(matches!(err, AppError::StaleTimestamp { skew_seconds: 301 }));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_acknowledged_noop() {
        let (service, _) = service_with_pending().await;
        let body = r#"{"id":"r-1","event":"upload.completed","sequence":1}"#;
        let ts = now().timestamp();
        let signature = sign(body, ts);

        let first = service.ingest(body, &signature, ts).await.unwrap();
        assert!(first.applied);

        let second = service.ingest(body, &signature, ts).await.unwrap();
        assert!(!second.applied);
        assert_eq!(second.record.status, ImageStatus::Uploaded);
    }

    #[tokio::test]
    async fn test_ready_while_pending_coalesces() {
        let (service, _) = service_with_pending().await;
        let body =
            r#"{"id":"r-1","event":"image.ready","sequence":2,"variants":["public","thumbnail"]}"#;
        let ts = now().timestamp();

        let outcome = service.ingest(body, &sign(body, ts), ts).await.unwrap();
        assert!(outcome.applied);
        assert_eq!(outcome.record.status, ImageStatus::Ready);
        assert!(outcome.record.variants_available.contains("public"));
    }

    #[tokio::test]
    async fn test_unknown_record_is_non_fatal() {
        let (service, _) = service_with_pending().await;
        let body = r#"{"id":"r-other","event":"upload.completed","sequence":1}"#;
        let ts = now().timestamp();

        let err = service.ingest(body, &sign(body, ts), ts).await.unwrap_err();
        assert!(err.is_non_fatal());
    }

    #[tokio::test]
    async fn test_failed_event_records_reason() {
        let (service, _) = service_with_pending().await;
        let upload = r#"{"id":"r-1","event":"upload.completed","sequence":1}"#;
        let ts = now().timestamp();
        service.ingest(upload, &sign(upload, ts), ts).await.unwrap();

        let failed = r#"{"id":"r-1","event":"image.failed","sequence":2,"reason":"decode error"}"#;
        let outcome = service.ingest(failed, &sign(failed, ts), ts).await.unwrap();
        assert_eq!(outcome.record.status, ImageStatus::Failed);
        assert_eq!(outcome.record.failure_reason.as_deref(), Some("decode error"));
    }
}
