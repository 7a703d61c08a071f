//! Inbound webhook wire model
//!
//! The remote API delivers lifecycle notifications as signed JSON bodies.
//! Headers carry a hex-encoded HMAC-SHA256 signature over
//! `"{timestamp}.{raw_body}"` (optionally prefixed `v1=`) and the Unix
//! timestamp used in that computation.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Webhook event kinds the remote API can report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WebhookEventKind {
    #[serde(rename = "upload.completed")]
    UploadCompleted,
    #[serde(rename = "image.ready")]
    ImageReady,
    #[serde(rename = "image.failed")]
    ImageFailed,
}

impl Display for WebhookEventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            WebhookEventKind::UploadCompleted => write!(f, "upload.completed"),
            WebhookEventKind::ImageReady => write!(f, "image.ready"),
            WebhookEventKind::ImageFailed => write!(f, "image.failed"),
        }
    }
}

impl FromStr for WebhookEventKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload.completed" => Ok(WebhookEventKind::UploadCompleted),
            "image.ready" => Ok(WebhookEventKind::ImageReady),
            "image.failed" => Ok(WebhookEventKind::ImageFailed),
            _ => Err(anyhow::anyhow!("Invalid webhook event kind: {}", s)),
        }
    }
}

/// Parsed webhook body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    /// Remote-assigned image id this event refers to.
    pub id: String,
    pub event: WebhookEventKind,
    /// Monotonically increasing per-image delivery sequence.
    pub sequence: i64,
    /// Failure reason, present on `image.failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Variants confirmed present, delivered with `image.ready`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variants: Option<Vec<String>>,
}
