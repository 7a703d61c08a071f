//! Direct-upload and deletion endpoints, plus the `RemoteImageApi`
//! implementation the services consume.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use imago_core::error::AppError;
use imago_core::hooks::{IssuedUploadAuth, RemoteImageApi};

use crate::ApiClient;

#[derive(Debug, Serialize)]
struct DirectUploadRequest<'a> {
    #[serde(rename = "requireSignedURLs")]
    require_signed_urls: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a serde_json::Value>,
    /// RFC 3339 deadline for claiming the upload URL.
    expiry: String,
}

#[derive(Debug, Deserialize)]
struct DirectUploadResult {
    id: String,
    #[serde(rename = "uploadURL")]
    upload_url: String,
    #[serde(default)]
    expiry: Option<DateTime<Utc>>,
}

impl ApiClient {
    /// Request a one-time direct-upload URL.
    #[tracing::instrument(skip(self, metadata))]
    pub async fn create_direct_upload(
        &self,
        require_signed_urls: bool,
        metadata: Option<&serde_json::Value>,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedUploadAuth, AppError> {
        let request = DirectUploadRequest {
            require_signed_urls,
            metadata,
            expiry: expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        let result: DirectUploadResult = self
            .post_json(&self.account_path("/images/v2/direct_upload"), &request)
            .await?;

        tracing::debug!(remote_id = %result.id, "Direct upload URL issued");
        Ok(IssuedUploadAuth {
            remote_id: result.id,
            upload_url: result.upload_url,
            expires_at: result.expiry,
        })
    }

    /// Delete an image from the remote.
    #[tracing::instrument(skip(self))]
    pub async fn delete_image(&self, remote_id: &str) -> Result<(), AppError> {
        self.delete(&self.account_path(&format!("/images/v1/{}", remote_id)))
            .await
    }
}

#[async_trait]
impl RemoteImageApi for ApiClient {
    async fn request_upload_url(
        &self,
        require_signed_urls: bool,
        metadata: Option<&serde_json::Value>,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedUploadAuth, AppError> {
        self.create_direct_upload(require_signed_urls, metadata, expires_at)
            .await
    }

    async fn delete_remote(&self, remote_id: &str) -> Result<(), AppError> {
        self.delete_image(remote_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_upload_request_shape() {
        let metadata = serde_json::json!({"album": "spring"});
        let request = DirectUploadRequest {
            require_signed_urls: true,
            metadata: Some(&metadata),
            expiry: "2026-03-14T13:00:00Z".to_string(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["requireSignedURLs"], true);
        assert_eq!(value["metadata"]["album"], "spring");
        assert_eq!(value["expiry"], "2026-03-14T13:00:00Z");
    }

    #[test]
    fn test_direct_upload_result_parses() {
        let body = r#"{"id":"r-1","uploadURL":"https://upload.example.com/one-time/abc","expiry":"2026-03-14T13:00:00Z"}"#;
        let result: DirectUploadResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.id, "r-1");
        assert!(result.upload_url.contains("one-time"));
        assert!(result.expiry.is_some());

        // Expiry is optional.
        let body = r#"{"id":"r-2","uploadURL":"https://upload.example.com/one-time/def"}"#;
        let result: DirectUploadResult = serde_json::from_str(body).unwrap();
        assert!(result.expiry.is_none());
    }
}
