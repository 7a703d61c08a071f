//! Error types module
//!
//! This module provides the core error types used throughout the Imago
//! library. All errors are unified under the `AppError` enum which can
//! represent validation, remote-API, webhook-authenticity, and lifecycle
//! errors.
//!
//! Every error kind is returned as an explicit `Result`; the library never
//! panics on bad input and never retries on the caller's behalf. The
//! `is_recoverable` metadata tells the caller which kinds are worth
//! retrying with backoff.

use crate::models::ImageStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Duplicate custom id: {0}")]
    DuplicateCustomId(String),

    #[error("Remote API unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote API rejected request with status {status}: {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Malformed remote API response: {0}")]
    MalformedResponse(String),

    // Deliberately terse: no detail about why verification failed.
    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Webhook timestamp outside tolerance window ({skew_seconds}s skew)")]
    StaleTimestamp { skew_seconds: i64 },

    #[error("Illegal lifecycle transition: {event} event in {from} state")]
    InvalidTransition { from: ImageStatus, event: &'static str },

    #[error("No record found for remote id: {0}")]
    UnknownRecord(String),

    #[error("Optimistic concurrency conflict: {0}")]
    Conflict(String),

    #[error("Record requires signed URLs but no signing capability was supplied")]
    SigningRequired,
}

impl AppError {
    /// Convenience constructor for field validation failures.
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Machine-readable error code (e.g., "INVALID_SIGNATURE").
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::DuplicateCustomId(_) => "DUPLICATE_CUSTOM_ID",
            AppError::RemoteUnavailable(_) => "REMOTE_UNAVAILABLE",
            AppError::RemoteRejected { .. } => "REMOTE_REJECTED",
            AppError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::StaleTimestamp { .. } => "STALE_TIMESTAMP",
            AppError::InvalidTransition { .. } => "INVALID_TRANSITION",
            AppError::UnknownRecord(_) => "UNKNOWN_RECORD",
            AppError::Conflict(_) => "CONFLICT",
            AppError::SigningRequired => "SIGNING_REQUIRED",
        }
    }

    /// Whether the caller may retry the operation. The library itself
    /// performs no retries; retry policy belongs to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::RemoteUnavailable(_) | AppError::Conflict(_)
        )
    }

    /// Non-fatal outcomes the caller may choose to log and ignore
    /// (e.g. a webhook racing with record creation).
    pub fn is_non_fatal(&self) -> bool {
        matches!(self, AppError::UnknownRecord(_))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let field = err
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "request".to_string());
        AppError::Validation {
            field,
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MalformedResponse(format!("JSON parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = AppError::validation("quality", "must be between 1 and 100");
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
        assert!(!err.is_recoverable());

        let err = AppError::Conflict("status changed under us".to_string());
        assert_eq!(err.error_code(), "CONFLICT");
        assert!(err.is_recoverable());

        let err = AppError::RemoteUnavailable("connection refused".to_string());
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_signature_error_is_terse() {
        // Rejection must not leak why verification failed.
        let err = AppError::InvalidSignature;
        assert_eq!(err.to_string(), "Invalid webhook signature");
    }

    #[test]
    fn test_unknown_record_non_fatal() {
        let err = AppError::UnknownRecord("r-123".to_string());
        assert!(err.is_non_fatal());
        assert!(!AppError::InvalidSignature.is_non_fatal());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = AppError::InvalidTransition {
            from: ImageStatus::Deleted,
            event: "ready",
        };
        assert!(err.to_string().contains("deleted"));
        assert!(err.to_string().contains("ready"));
    }
}
