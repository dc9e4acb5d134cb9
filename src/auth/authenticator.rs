//! Authenticator implementation
//!
//! Exchanges the refresh token for an access token and caches it.

use super::types::{AuthConfig, CachedToken, RefreshResponse};
use crate::error::{Error, Result};
use reqwest::Client;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Default ShipHero refresh endpoint
pub const DEFAULT_AUTH_URL: &str = "https://public-api.shiphero.com/auth/refresh";

/// Obtains and caches bearer access tokens
pub struct Authenticator {
    /// Auth configuration
    config: AuthConfig,
    /// Token from the last exchange
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// HTTP client for token requests
    http_client: Client,
}

impl Authenticator {
    /// Create an authenticator with a custom HTTP client
    pub fn with_client(config: AuthConfig, http_client: Client) -> Self {
        Self {
            config,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Create an authenticator with its own HTTP client
    pub fn new(config: AuthConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(config, client))
    }

    /// Get a valid access token, exchanging the refresh token if necessary
    ///
    /// Failures are never retried: a rejected refresh token will not get
    /// better by asking again.
    pub async fn access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.cached_token.write().await;

        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let new_token = self.refresh().await?;
        let token_str = new_token.token.clone();
        *cached = Some(new_token);

        Ok(token_str)
    }

    /// Exchange the refresh token
    async fn refresh(&self) -> Result<CachedToken> {
        if self.config.refresh_token.trim().is_empty() {
            return Err(Error::missing_field("refresh_token"));
        }

        debug!("Requesting access token from {}", self.config.auth_url);

        let response = self
            .http_client
            .post(&self.config.auth_url)
            .json(&json!({ "refresh_token": self.config.refresh_token }))
            .send()
            .await
            .map_err(|e| Error::TokenRefresh {
                message: format!("Failed to refresh access token: {e}"),
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::TokenRefresh {
                message: format!("Refresh token request failed with status {status}: {body}"),
            });
        }

        let body: RefreshResponse = response.json().await.map_err(|e| Error::TokenRefresh {
            message: format!("Refresh response is not valid JSON: {e}"),
        })?;

        let token = body
            .into_cached_token()
            .ok_or_else(|| Error::auth("No access_token found in refresh response"))?;

        info!("Successfully obtained access token");
        Ok(token)
    }

    /// Drop the cached token so the next call exchanges again
    pub async fn clear_cache(&self) {
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }

    /// Get the current auth config
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
