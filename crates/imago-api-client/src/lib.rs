//! HTTP client for the remote image-delivery API.
//!
//! Provides a minimal client with Bearer auth, the direct-upload and
//! deletion endpoints, and an implementation of
//! [`imago_core::hooks::RemoteImageApi`] over them. Responses arrive in
//! the remote's standard envelope (`result` / `success` / `errors`).

pub mod api;

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use imago_core::config::ImagesConfig;
use imago_core::error::AppError;

/// Authentication strategy for the remote API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
}

/// Response envelope every remote endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub result: Option<T>,
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ApiMessage {
    pub code: i64,
    pub message: String,
}

/// HTTP client for the remote image API.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    account_id: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        account_id: &str,
        auth: Auth,
        timeout_seconds: u64,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::RemoteUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            auth,
        })
    }

    pub fn from_config(config: &ImagesConfig) -> Result<Self, AppError> {
        Self::new(
            &config.api_base_url,
            &config.account_id,
            Auth::Bearer(config.api_token.clone()),
            config.http_timeout_seconds,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
        }
    }

    /// POST JSON body and unwrap the response envelope.
    pub(crate) async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.post(&url).json(body));
        let response = request
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;
        Self::unwrap_envelope(response).await
    }

    /// DELETE and unwrap the response envelope, discarding the payload.
    pub(crate) async fn delete(&self, path: &str) -> Result<(), AppError> {
        let url = self.build_url(path);
        let request = self.apply_auth(self.client.delete(&url));
        let response = request
            .send()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        // Deleting an already-absent image is treated as done.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(AppError::RemoteRejected {
                status: status.as_u16(),
                message: text,
            });
        }
        // Deletion responses carry an empty (or null) result; only the
        // success flag matters.
        let envelope: ApiEnvelope<serde_json::Value> = serde_json::from_str(&text)
            .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
        if !envelope.success {
            let message = envelope
                .errors
                .into_iter()
                .next()
                .map(|e| e.message)
                .unwrap_or_else(|| "request unsuccessful".to_string());
            return Err(AppError::RemoteRejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::RemoteUnavailable(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&text)
                .ok()
                .and_then(|envelope| envelope.errors.into_iter().next())
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(AppError::RemoteRejected {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<T> = serde_json::from_str(&text)
            .map_err(|e| AppError::MalformedResponse(e.to_string()))?;
        if !envelope.success {
            let message = envelope
                .errors
                .into_iter()
                .next()
                .map(|e| format!("{} ({})", e.message, e.code))
                .unwrap_or_else(|| "request unsuccessful".to_string());
            return Err(AppError::RemoteRejected {
                status: status.as_u16(),
                message,
            });
        }
        envelope
            .result
            .ok_or_else(|| AppError::MalformedResponse("missing result".to_string()))
    }

    pub(crate) fn account_path(&self, suffix: &str) -> String {
        format!("/accounts/{}{}", self.account_id, suffix)
    }
}
