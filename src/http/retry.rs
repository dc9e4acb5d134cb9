//! Rate-limit aware retry policy
//!
//! Every response is classified before its records are touched:
//!
//! - an error entry with code 30 anywhere in the body means "over budget";
//!   the vendor says how long to wait (`time_remaining`), and we wait exactly
//!   that plus a fixed margin, without jitter
//! - any other GraphQL failure waits a fixed fallback
//! - non-2xx statuses and connection failures back off exponentially, with
//!   jitter
//!
//! The attempt cap applies across all three; reaching it turns the last
//! failure into [`Error::RetriesExhausted`].

use super::transport::{Transport, TransportResponse};
use crate::decode::{PageResponse, ResponseExtractor};
use crate::error::{Error, Result};
use crate::types::BackoffType;
use fastrand::Rng;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest body excerpt kept in an HTTP status error
const BODY_EXCERPT_LEN: usize = 512;

/// Ceiling for a vendor-requested rate-limit wait
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(3600);

/// Configuration for the retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per request, first one included
    pub max_attempts: u32,
    /// Wait after a GraphQL error without a usable vendor hint
    pub fallback_wait: Duration,
    /// Added to the vendor's `time_remaining`
    pub rate_limit_margin: Duration,
    /// First transport backoff delay
    pub initial_backoff: Duration,
    /// Ceiling for transport backoff delays
    pub max_backoff: Duration,
    /// Growth of transport backoff delays
    pub backoff_type: BackoffType,
    /// Jitter as a fraction of the transport delay (0.0 disables)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            fallback_wait: Duration::from_secs(5),
            rate_limit_margin: Duration::from_secs(1),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            backoff_type: BackoffType::Exponential,
            jitter_factor: 0.1,
        }
    }
}

/// Decides whether and how long to wait between attempts
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Create a policy
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Policy configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Send `query` until it yields a usable page or the attempts run out
    ///
    /// Non-retryable failures return immediately; nothing is resent after
    /// a success.
    pub async fn execute<T>(
        &self,
        transport: &T,
        query: &str,
        extractor: &ResponseExtractor,
    ) -> Result<PageResponse>
    where
        T: Transport + ?Sized,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match transport.send(query).await {
                Ok(response) => self.classify(response, extractor),
                Err(e) => Err(e),
            };

            let error = match outcome {
                Ok(page) => return Ok(page),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => e,
            };

            if attempt >= max_attempts {
                warn!(
                    "{}: giving up after {attempt} attempts: {error}",
                    extractor.stream_key()
                );
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    last_error: Box::new(error),
                });
            }

            let wait = self.wait_for(&error, attempt - 1);
            warn!(
                "{}: {error} (attempt {attempt}/{max_attempts}), retrying in {:?}",
                extractor.stream_key(),
                wait
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Turn a raw response into a page or a classified failure
    pub fn classify(
        &self,
        response: TransportResponse,
        extractor: &ResponseExtractor,
    ) -> Result<PageResponse> {
        if !response.is_success() {
            // Throttled requests may come back non-2xx with the vendor hint
            if let Ok(page) = PageResponse::parse(&response.body) {
                if let Some(err) = self.rate_limit_error(&page) {
                    return Err(err);
                }
            }
            return Err(Error::http_status(
                response.status,
                excerpt(&response.body, BODY_EXCERPT_LEN),
            ));
        }

        let page = PageResponse::parse(&response.body)?;

        if let Some(err) = self.rate_limit_error(&page) {
            return Err(err);
        }

        extractor.check(&page)?;

        if page.has_errors() {
            warn!(
                "{}: response carries data and errors, continuing: {}",
                extractor.stream_key(),
                page.error_messages()
            );
        }

        Ok(page)
    }

    /// Wait before attempt `retry + 2` after `error`
    pub fn wait_for(&self, error: &Error, retry: u32) -> Duration {
        match error {
            Error::RateLimited { wait, .. } => *wait,
            Error::GraphQl { .. } | Error::Decode { .. } => self.config.fallback_wait,
            Error::Http(_) | Error::HttpStatus { .. } => self.jittered(self.backoff(retry)),
            _ => Duration::ZERO,
        }
    }

    /// Wait implied by a `time_remaining` hint
    ///
    /// The leading integer of e.g. `"10 seconds"` plus the margin, capped at
    /// [`MAX_RATE_LIMIT_WAIT`]; the fallback when the hint is missing or has
    /// no leading number.
    pub fn rate_limit_wait(&self, time_remaining: Option<&str>) -> Duration {
        time_remaining
            .and_then(leading_seconds)
            .map_or(self.config.fallback_wait, |secs| {
                Duration::from_secs(secs)
                    .saturating_add(self.config.rate_limit_margin)
                    .min(MAX_RATE_LIMIT_WAIT)
            })
    }

    /// Transport backoff delay before jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let initial = self.config.initial_backoff;
        let delay = match self.config.backoff_type {
            BackoffType::Constant => initial,
            BackoffType::Linear => initial.saturating_mul(retry.saturating_add(1)),
            BackoffType::Exponential => initial.saturating_mul(2u32.saturating_pow(retry)),
        };

        std::cmp::min(delay, self.config.max_backoff)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let factor = self.config.jitter_factor;
        if factor <= 0.0 {
            return delay;
        }
        let base = delay.as_secs_f64();
        let range = base * factor;
        let jitter = Rng::new().f64() * range - range / 2.0;
        Duration::from_secs_f64((base + jitter).max(0.0))
    }

    fn rate_limit_error(&self, page: &PageResponse) -> Option<Error> {
        let signal = page.rate_limit()?;
        let ext = signal.extensions.clone().unwrap_or_default();
        let show = |v: Option<serde_json::Value>| {
            v.map_or_else(|| "n/a".to_string(), |v| v.to_string())
        };
        let required = show(ext.required_credits);
        let remaining = show(ext.remaining_credits);

        warn!(
            "ShipHero rate limit hit: {}. Required credits: {required}, remaining credits: {remaining}, time remaining: {}",
            signal.message,
            signal.retry_hint().unwrap_or("n/a")
        );

        let wait = self.rate_limit_wait(signal.retry_hint());
        debug!("rate limit wait resolved to {:?}", wait);

        Some(Error::RateLimited {
            message: signal.message.clone(),
            wait,
        })
    }
}

/// Leading integer of a string like `"10 seconds"`
fn leading_seconds(text: &str) -> Option<u64> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(text.len(), |(i, _)| i);
    text[..end].parse().ok()
}

fn excerpt(body: &str, max: usize) -> String {
    if body.len() <= max {
        return body.to_string();
    }
    let mut end = max;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
