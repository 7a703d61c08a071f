//! Image record model
//!
//! An `ImageRecord` tracks one image through its remote-API lifecycle:
//! issuance of a one-time upload authorization, webhook confirmation,
//! expiry of unclaimed uploads, and caller-initiated deletion. Status is
//! only ever changed through the lifecycle state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle status of an image record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ImageStatus {
    Pending,
    Uploaded,
    Ready,
    Failed,
    Expired,
    Deleted,
}

impl Display for ImageStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ImageStatus::Pending => write!(f, "pending"),
            ImageStatus::Uploaded => write!(f, "uploaded"),
            ImageStatus::Ready => write!(f, "ready"),
            ImageStatus::Failed => write!(f, "failed"),
            ImageStatus::Expired => write!(f, "expired"),
            ImageStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl FromStr for ImageStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ImageStatus::Pending),
            "uploaded" => Ok(ImageStatus::Uploaded),
            "ready" => Ok(ImageStatus::Ready),
            "failed" => Ok(ImageStatus::Failed),
            "expired" => Ok(ImageStatus::Expired),
            "deleted" => Ok(ImageStatus::Deleted),
            _ => Err(anyhow::anyhow!("Invalid image status: {}", s)),
        }
    }
}

/// One image tracked through its remote-API lifecycle.
///
/// `remote_id` is `None` while the record is `pending`; the identifier the
/// remote API assigned at issuance lives in `upload_ref` until the first
/// transition out of `pending` promotes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub custom_id: Option<String>,
    pub status: ImageStatus,
    pub remote_id: Option<String>,
    pub upload_ref: Option<String>,
    pub require_signed_urls: bool,
    pub variants_available: BTreeSet<String>,
    pub metadata: Option<serde_json::Value>,
    pub upload_expires_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Highest webhook event sequence applied to this record. Events at or
    /// below this sequence are duplicates and must no-op.
    pub last_event_seq: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImageRecord {
    /// Construct a fresh pending record from a successful issuance.
    pub fn new_pending(
        custom_id: Option<String>,
        upload_ref: String,
        require_signed_urls: bool,
        metadata: Option<serde_json::Value>,
        upload_expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            custom_id,
            status: ImageStatus::Pending,
            remote_id: None,
            upload_ref: Some(upload_ref),
            require_signed_urls,
            variants_available: BTreeSet::new(),
            metadata,
            upload_expires_at: Some(upload_expires_at),
            failure_reason: None,
            last_event_seq: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// The remote identifier webhooks and deletion calls should use.
    pub fn remote_identifier(&self) -> Option<&str> {
        self.remote_id.as_deref().or(self.upload_ref.as_deref())
    }
}
