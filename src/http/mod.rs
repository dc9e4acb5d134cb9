//! HTTP module
//!
//! Sends rendered queries and decides what to do with the answer.
//!
//! # Features
//!
//! - **Transport**: `POST {"query": ...}` with bearer auth behind a trait
//! - **Retry Policy**: vendor-directed waits for rate limits, fallback waits
//!   for GraphQL errors, jittered exponential backoff for transport failures
//! - **Rate Limiting**: optional token bucket throttle using governor

mod client;
mod rate_limit;
mod retry;
mod transport;

pub use client::{
    default_user_agent, GraphQlClient, HttpClientConfig, HttpClientConfigBuilder, DEFAULT_API_URL,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use retry::{RetryConfig, RetryPolicy, MAX_RATE_LIMIT_WAIT};
pub use transport::{Transport, TransportResponse};

#[cfg(test)]
pub(crate) use transport::scripted::ScriptedTransport;
