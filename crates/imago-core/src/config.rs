//! Configuration module
//!
//! Environment-driven configuration for the remote image-delivery API,
//! webhook verification, and upload issuance defaults.

use std::env;

// Defaults
const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";
const DEFAULT_DELIVERY_BASE_URL: &str = "https://imagedelivery.net";
const DEFAULT_UPLOAD_TTL_SECONDS: u64 = 3600;
const DEFAULT_WEBHOOK_TOLERANCE_SECONDS: u64 = 300;
const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Configuration for the image lifecycle toolkit.
#[derive(Clone, Debug)]
pub struct ImagesConfig {
    /// Remote API account identifier (used in API paths).
    pub account_id: String,
    /// Delivery account hash (used in delivery URLs).
    pub account_hash: String,
    /// Bearer token for the remote API.
    pub api_token: String,
    /// Base URL of the remote API.
    pub api_base_url: String,
    /// Base URL images are delivered from.
    pub delivery_base_url: String,
    /// Shared secret for inbound webhook signature verification.
    pub webhook_secret: String,
    /// Seconds a pending upload authorization stays claimable.
    pub upload_ttl_seconds: u64,
    /// Maximum accepted skew between a webhook timestamp and now.
    pub webhook_tolerance_seconds: u64,
    /// Timeout applied to remote API calls.
    pub http_timeout_seconds: u64,
}

impl ImagesConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let config = Self {
            account_id: env::var("IMAGO_ACCOUNT_ID").unwrap_or_default(),
            account_hash: env::var("IMAGO_ACCOUNT_HASH").unwrap_or_default(),
            api_token: env::var("IMAGO_API_TOKEN").unwrap_or_default(),
            api_base_url: env::var("IMAGO_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            delivery_base_url: env::var("IMAGO_DELIVERY_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_DELIVERY_BASE_URL.to_string()),
            webhook_secret: env::var("IMAGO_WEBHOOK_SECRET").unwrap_or_default(),
            upload_ttl_seconds: env::var("IMAGO_UPLOAD_TTL_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_UPLOAD_TTL_SECONDS),
            webhook_tolerance_seconds: env::var("IMAGO_WEBHOOK_TOLERANCE_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECONDS),
            http_timeout_seconds: env::var("IMAGO_HTTP_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECONDS),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.account_id.trim().is_empty() {
            return Err(anyhow::anyhow!("IMAGO_ACCOUNT_ID must be set"));
        }
        if self.account_hash.trim().is_empty() {
            return Err(anyhow::anyhow!("IMAGO_ACCOUNT_HASH must be set"));
        }
        if self.api_token.trim().is_empty() {
            return Err(anyhow::anyhow!("IMAGO_API_TOKEN must be set"));
        }
        if self.webhook_secret.trim().is_empty() {
            return Err(anyhow::anyhow!("IMAGO_WEBHOOK_SECRET must be set"));
        }
        if self.upload_ttl_seconds == 0 {
            return Err(anyhow::anyhow!("IMAGO_UPLOAD_TTL_SECONDS must be > 0"));
        }
        if self.webhook_tolerance_seconds == 0 {
            return Err(anyhow::anyhow!(
                "IMAGO_WEBHOOK_TOLERANCE_SECONDS must be > 0"
            ));
        }
        Ok(())
    }
}
