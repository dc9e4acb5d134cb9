//! Transport abstraction
//!
//! The request engine only needs "send this query, give me status and body";
//! everything else about HTTP stays behind this trait.

use crate::error::Result;
use async_trait::async_trait;

/// Raw outcome of one POST, before any classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body text
    pub body: String,
}

impl TransportResponse {
    /// Create a response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 with the given body
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends rendered GraphQL queries
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `{"query": query}` and return the raw response
    ///
    /// Connection-level failures are returned as `Err`; any HTTP status,
    /// including non-2xx, is returned as `Ok`.
    async fn send(&self, query: &str) -> Result<TransportResponse>;
}
