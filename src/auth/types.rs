//! Auth configuration types

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Refresh-token exchange settings
#[derive(Clone)]
pub struct AuthConfig {
    /// Refresh endpoint
    pub auth_url: String,
    /// Long-lived refresh token
    pub refresh_token: String,
}

impl AuthConfig {
    /// Create an auth config
    pub fn new(auth_url: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            auth_url: auth_url.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("auth_url", &self.auth_url)
            .field("refresh_token", &"***")
            .finish()
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false,
        }
    }
}

/// Body of a successful refresh response
#[derive(Debug, Deserialize)]
pub(crate) struct RefreshResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

impl RefreshResponse {
    pub(crate) fn into_cached_token(self) -> Option<CachedToken> {
        let token = self.access_token.filter(|t| !t.trim().is_empty())?;
        Some(match self.expires_in {
            Some(secs) => CachedToken::expires_in(token, secs),
            None => CachedToken::new(token, None),
        })
    }
}
