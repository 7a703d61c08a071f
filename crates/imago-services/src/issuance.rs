//! Upload issuance service
//!
//! Issues one-time direct-upload authorizations: validates the request,
//! reserves the custom id, makes exactly one remote call, and persists a
//! `pending` record. A failed remote call leaves no partial record behind.
//! Also hosts caller-initiated deletion, which is remote-first so a local
//! `deleted` status always means the remote copy is gone.

use std::sync::Arc;

use chrono::Duration;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use imago_core::error::AppError;
use imago_core::hooks::{Clock, RecordStore, RemoteImageApi};
use imago_core::lifecycle::{apply, LifecycleEvent};
use imago_core::models::{ImageRecord, ImageStatus};

// Upload authorizations are short-lived; anything past a day is a caller
// bug, and unbounded values would overflow the expiry arithmetic.
const MAX_UPLOAD_TTL_SECONDS: u64 = 86_400;

/// Caller request for a new upload authorization.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct IssueUploadRequest {
    /// Optional caller-chosen identifier, unique among live records.
    #[validate(length(
        min = 1,
        max = 256,
        message = "Custom id must be between 1 and 256 characters"
    ))]
    pub custom_id: Option<String>,
    /// Whether delivery URLs for this image must be signed.
    #[serde(default)]
    pub require_signed_urls: bool,
    /// Opaque metadata stored with the record and forwarded to the remote.
    pub metadata: Option<serde_json::Value>,
    /// Override of the configured upload TTL, in seconds.
    pub ttl_seconds: Option<u64>,
}

fn validate_custom_id(custom_id: &str) -> Result<(), AppError> {
    // UUID-shaped custom ids collide with the remote's own identifier
    // space and are rejected up front.
    if Uuid::parse_str(custom_id).is_ok() {
        return Err(AppError::validation(
            "custom_id",
            "cannot be UUID-shaped",
        ));
    }
    if custom_id.contains('/') || custom_id.chars().any(char::is_whitespace) {
        return Err(AppError::validation(
            "custom_id",
            "cannot contain '/' or whitespace",
        ));
    }
    Ok(())
}

/// Successful issuance: the persisted record plus the URL the end client
/// uploads to. The upload URL is returned once and never stored.
#[derive(Debug, Clone)]
pub struct IssuedUpload {
    pub record: ImageRecord,
    pub upload_url: String,
}

pub struct UploadIssuanceService {
    store: Arc<dyn RecordStore>,
    remote: Arc<dyn RemoteImageApi>,
    clock: Arc<dyn Clock>,
    default_ttl_seconds: u64,
}

impl UploadIssuanceService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        remote: Arc<dyn RemoteImageApi>,
        clock: Arc<dyn Clock>,
        default_ttl_seconds: u64,
    ) -> Self {
        Self {
            store,
            remote,
            clock,
            default_ttl_seconds,
        }
    }

    /// Issue a one-time upload authorization and persist a pending record.
    #[tracing::instrument(skip(self, request), fields(custom_id = ?request.custom_id))]
    pub async fn issue_upload(
        &self,
        request: IssueUploadRequest,
    ) -> Result<IssuedUpload, AppError> {
        request.validate()?;

        if let Some(custom_id) = request.custom_id.as_deref() {
            validate_custom_id(custom_id)?;
            if let Some(existing) = self.store.get_by_custom_id(custom_id).await? {
                if existing.status != ImageStatus::Deleted {
                    return Err(AppError::DuplicateCustomId(custom_id.to_string()));
                }
            }
        }

        let now = self.clock.now();
        let ttl = request.ttl_seconds.unwrap_or(self.default_ttl_seconds);
        if ttl == 0 || ttl > MAX_UPLOAD_TTL_SECONDS {
            return Err(AppError::validation(
                "ttl_seconds",
                format!("must be between 1 and {}", MAX_UPLOAD_TTL_SECONDS),
            ));
        }
        let requested_expiry = now + Duration::seconds(ttl as i64);

        let auth = self
            .remote
            .request_upload_url(
                request.require_signed_urls,
                request.metadata.as_ref(),
                requested_expiry,
            )
            .await?;

        // The remote's own deadline wins when it reports one; local TTL is
        // only the request.
        let expires_at = auth.expires_at.unwrap_or(requested_expiry);

        let record = ImageRecord::new_pending(
            request.custom_id,
            auth.remote_id,
            request.require_signed_urls,
            request.metadata,
            expires_at,
            now,
        );
        self.store.create(&record).await?;

        tracing::info!(
            record_id = %record.id,
            expires_at = %expires_at,
            "Issued direct upload authorization"
        );

        Ok(IssuedUpload {
            record,
            upload_url: auth.upload_url,
        })
    }

    /// Delete an image: remote first, then the local lifecycle transition.
    ///
    /// Legal from `ready`, `failed`, and `expired`. Pending and uploaded
    /// records cannot be deleted; cancelation of an in-flight upload is not
    /// supported.
    #[tracing::instrument(skip(self))]
    pub async fn delete_image(&self, id: Uuid) -> Result<ImageRecord, AppError> {
        let record = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::UnknownRecord(id.to_string()))?;

        // Reject illegal states before touching the remote.
        let now = self.clock.now();
        let transition = apply(&record, &LifecycleEvent::Delete, now)?;

        if let Some(remote_id) = record.remote_identifier() {
            self.remote.delete_remote(remote_id).await?;
        }

        self.store
            .compare_and_update(record.id, record.status, &transition.record)
            .await?;

        tracing::info!(record_id = %id, "Image deleted");
        Ok(transition.record)
    }
}
