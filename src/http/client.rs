//! GraphQL HTTP client
//!
//! Posts rendered queries to the API endpoint with bearer auth, an optional
//! client-side throttle and a per-request timeout. Retries live in
//! [`RetryPolicy`](super::RetryPolicy), not here.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::transport::{Transport, TransportResponse};
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Default ShipHero GraphQL endpoint
pub const DEFAULT_API_URL: &str = "https://public-api.shiphero.com/graphql";

/// Default user agent
pub fn default_user_agent() -> String {
    format!("shiphero-source/{}", env!("CARGO_PKG_VERSION"))
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// GraphQL endpoint
    pub endpoint: String,
    /// Request timeout
    pub timeout: Duration,
    /// Client-side throttle
    pub rate_limit: Option<RateLimiterConfig>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            rate_limit: None,
            user_agent: default_user_agent(),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the endpoint
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the client-side throttle
    #[must_use]
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Set user agent
    #[must_use]
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// reqwest-backed [`Transport`] for the GraphQL endpoint
pub struct GraphQlClient {
    client: Client,
    config: HttpClientConfig,
    access_token: String,
    rate_limiter: Option<RateLimiter>,
}

impl GraphQlClient {
    /// Create a client that authenticates with `access_token`
    pub fn new(config: HttpClientConfig, access_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self::with_client(client, config, access_token))
    }

    /// Create a client around an existing reqwest client
    pub fn with_client(
        client: Client,
        config: HttpClientConfig,
        access_token: impl Into<String>,
    ) -> Self {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        Self {
            client,
            config,
            access_token: access_token.into(),
            rate_limiter,
        }
    }

    /// Endpoint queries are posted to
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }
}

#[async_trait]
impl Transport for GraphQlClient {
    async fn send(&self, query: &str) -> Result<TransportResponse> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::USER_AGENT, &self.config.user_agent)
            .json(&json!({ "query": query }))
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!("POST {} -> {status} ({} bytes)", self.config.endpoint, body.len());

        Ok(TransportResponse { status, body })
    }
}

impl std::fmt::Debug for GraphQlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQlClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
