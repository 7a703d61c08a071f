//! Hooks and traits for host integration
//!
//! This module provides trait interfaces that allow the core to work with
//! host-provided collaborators (persistence, the remote image API, wall
//! clocks, URL signing) without directly depending on them. Services take
//! these as injected trait objects, so every side effect is mockable in
//! tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ImageRecord, ImageStatus};

/// One-time upload authorization issued by the remote API.
#[derive(Debug, Clone)]
pub struct IssuedUploadAuth {
    /// Identifier the remote API assigned to the future image.
    pub remote_id: String,
    /// URL the end client uploads the file bytes to.
    pub upload_url: String,
    /// Remote-reported deadline for the upload, when provided.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Persistence for image records.
///
/// Implementations must provide atomic `compare_and_update`: the write only
/// lands if the stored status still equals `expected_status`, otherwise
/// `AppError::Conflict` is returned and the caller re-reads.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ImageRecord>, AppError>;

    async fn get_by_custom_id(&self, custom_id: &str) -> Result<Option<ImageRecord>, AppError>;

    /// Look up by the identifier the remote API uses. Matches `remote_id`
    /// or, for records still pending, `upload_ref`.
    async fn get_by_remote_id(&self, remote_id: &str) -> Result<Option<ImageRecord>, AppError>;

    /// Insert a fresh record. Fails with `DuplicateCustomId` if another
    /// live record already claims the same custom id.
    async fn create(&self, record: &ImageRecord) -> Result<(), AppError>;

    /// Guarded write: persists `record` only while the stored status still
    /// equals `expected_status`.
    async fn compare_and_update(
        &self,
        id: Uuid,
        expected_status: ImageStatus,
        record: &ImageRecord,
    ) -> Result<(), AppError>;

    /// Pending records whose upload deadline has passed as of `now`.
    async fn list_expired_pending(&self, now: DateTime<Utc>)
        -> Result<Vec<ImageRecord>, AppError>;
}

/// The remote image API surface the services need.
#[async_trait]
pub trait RemoteImageApi: Send + Sync {
    /// Request a one-time direct-upload authorization.
    async fn request_upload_url(
        &self,
        require_signed_urls: bool,
        metadata: Option<&serde_json::Value>,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedUploadAuth, AppError>;

    /// Delete the remote image. Deleting an already-absent image is not an
    /// error for implementations that can tell.
    async fn delete_remote(&self, remote_id: &str) -> Result<(), AppError>;
}

/// Wall-clock source, injected so expiry logic is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Capability to sign a delivery URL until `expiry`.
///
/// No production implementation ships here; hosts wire in their own.
pub trait UrlSigner: Send + Sync {
    fn sign(&self, url: &str, expiry: DateTime<Utc>) -> Result<String, AppError>;
}
