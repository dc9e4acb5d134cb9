//! Runtime configuration
//!
//! The JSON document handed to the binary with `--config` (or inline with
//! `--config-json`). Only `refresh_token` is required; everything else has
//! a default matching the public ShipHero API.

use crate::auth::{AuthConfig, DEFAULT_AUTH_URL};
use crate::error::{Error, Result};
use crate::http::{
    default_user_agent, HttpClientConfig, RateLimiterConfig, RetryConfig, DEFAULT_API_URL,
};
use crate::template::parse_timestamp;
use crate::types::{BackoffType, OptionStringExt};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Source configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct TapConfig {
    /// Long-lived refresh token exchanged for an access token at startup
    pub refresh_token: String,

    /// Lower bound for streams without a bookmark
    #[serde(default)]
    pub start_date: Option<String>,

    /// Custom `User-Agent` header
    #[serde(default)]
    pub user_agent: Option<String>,

    /// GraphQL endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Token refresh endpoint
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Checkpoint state after every page instead of once per stream
    #[serde(default = "default_true")]
    pub page_checkpoint: bool,

    /// HTTP and retry settings
    #[serde(default)]
    pub http: HttpSettings,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_auth_url() -> String {
    DEFAULT_AUTH_URL.to_string()
}

fn default_true() -> bool {
    true
}

impl TapConfig {
    /// Create a config with defaults around a refresh token
    pub fn new(refresh_token: impl Into<String>) -> Self {
        Self {
            refresh_token: refresh_token.into(),
            start_date: None,
            user_agent: None,
            api_url: default_api_url(),
            auth_url: default_auth_url(),
            page_checkpoint: true,
            http: HttpSettings::default(),
        }
    }

    /// Load and validate a config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate inline JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::config(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check required fields and value formats
    pub fn validate(&self) -> Result<()> {
        if self.refresh_token.trim().is_empty() {
            return Err(Error::missing_field("refresh_token"));
        }

        url::Url::parse(&self.api_url)
            .map_err(|e| Error::invalid_value("api_url", e.to_string()))?;
        url::Url::parse(&self.auth_url)
            .map_err(|e| Error::invalid_value("auth_url", e.to_string()))?;

        if let Some(start) = self.start_date.clone().none_if_empty() {
            if parse_timestamp(&start).is_none() {
                return Err(Error::invalid_value(
                    "start_date",
                    format!("'{start}' is not an ISO 8601 date or timestamp"),
                ));
            }
        }

        if self.http.max_attempts == 0 {
            return Err(Error::invalid_value("http.max_attempts", "must be at least 1"));
        }
        if self.http.requests_per_second == Some(0) {
            return Err(Error::invalid_value(
                "http.requests_per_second",
                "must be at least 1",
            ));
        }

        Ok(())
    }

    /// The configured start date, parsed
    pub fn start_date_timestamp(&self) -> Option<DateTime<Utc>> {
        self.start_date
            .clone()
            .none_if_empty()
            .and_then(|s| parse_timestamp(&s))
    }

    /// Settings for the GraphQL client
    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder()
            .endpoint(&self.api_url)
            .timeout(Duration::from_secs(self.http.timeout_seconds))
            .user_agent(
                self.user_agent
                    .clone()
                    .none_if_empty()
                    .unwrap_or_else(default_user_agent),
            );
        if let Some(rps) = self.http.requests_per_second {
            builder = builder.rate_limit(RateLimiterConfig::new(rps, rps));
        }
        builder.build()
    }

    /// Settings for the retry policy
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.http.max_attempts,
            fallback_wait: Duration::from_secs(self.http.fallback_wait_seconds),
            rate_limit_margin: Duration::from_secs(self.http.rate_limit_margin_seconds),
            initial_backoff: Duration::from_millis(self.http.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.http.max_backoff_ms),
            backoff_type: self.http.backoff_type,
            ..RetryConfig::default()
        }
    }

    /// Settings for the token refresh
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(&self.auth_url, &self.refresh_token)
    }
}

impl std::fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TapConfig")
            .field("refresh_token", &"***")
            .field("start_date", &self.start_date)
            .field("user_agent", &self.user_agent)
            .field("api_url", &self.api_url)
            .field("auth_url", &self.auth_url)
            .field("page_checkpoint", &self.page_checkpoint)
            .field("http", &self.http)
            .finish()
    }
}

// ============================================================================
// HTTP Settings
// ============================================================================

/// HTTP client and retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Total attempts per request
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Wait after a GraphQL error without a vendor hint
    #[serde(default = "default_fallback_wait")]
    pub fallback_wait_seconds: u64,

    /// Added to the vendor's rate-limit wait
    #[serde(default = "default_rate_limit_margin")]
    pub rate_limit_margin_seconds: u64,

    /// First transport backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum transport backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Growth of transport backoff delays
    #[serde(default)]
    pub backoff_type: BackoffType,

    /// Client-side throttle; unset leaves pacing to the vendor
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            max_attempts: default_max_attempts(),
            fallback_wait_seconds: default_fallback_wait(),
            rate_limit_margin_seconds: default_rate_limit_margin(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_type: BackoffType::default(),
            requests_per_second: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    5
}

fn default_fallback_wait() -> u64 {
    5
}

fn default_rate_limit_margin() -> u64 {
    1
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60000
}

// ============================================================================
// Tests
// ============================================================================
