//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the pipeline, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Retry with backoff for rate limiting and transient failures
//! - Classifying responses into breaker failure classes
//! - Honoring the shared stop signal before every attempt and during backoff

use crate::config::HttpConfig;
use crate::crawler::breaker::{CircuitBreaker, FailureClass};
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Body the listing endpoint serves in place of an empty result page
pub const PLACEHOLDER_BODY: &str = "<!DOCTYPE html><!---->";

/// Terminal failure of a fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// The stop signal was set before or during the fetch
    #[error("fetch aborted: stop signal set")]
    Aborted,

    /// HTTP 429, either tripping the breaker or on the last attempt
    #[error("rate limited (HTTP 429)")]
    RateLimited,

    /// HTTP 404; never retried
    #[error("not found (HTTP 404)")]
    NotFound,

    /// 2xx response with an empty or placeholder body
    #[error("empty response body")]
    EmptyBody,

    /// Every attempt ended in a network error or unexpected status
    #[error("network failure after {attempts} attempts: {last_error}")]
    NetworkExhausted { attempts: u32, last_error: String },
}

impl FetchFailure {
    /// Failure class counted by the breaker for this outcome, if any
    pub fn class(&self) -> Option<FailureClass> {
        match self {
            Self::RateLimited => Some(FailureClass::RateLimited),
            Self::NotFound => Some(FailureClass::NotFound),
            Self::EmptyBody => Some(FailureClass::EmptyBody),
            Self::Aborted | Self::NetworkExhausted { .. } => None,
        }
    }
}

/// Retry settings and the breaker shared by a group of fetches
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Total attempts per fetch, including the first
    pub max_attempts: u32,
    /// Base delay for both backoff schedules
    pub base_delay: Duration,
    pub breaker: Arc<CircuitBreaker>,
}

impl FetchPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            max_attempts,
            base_delay,
            breaker,
        }
    }

    /// Delay after the given 0-based attempt ended in a 429: `base * 2^attempt`
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(2u32.saturating_pow(attempt))
            .unwrap_or(Duration::MAX)
    }

    /// Delay after the given 0-based attempt ended in a transient error: `base * (attempt + 1)`
    pub fn transient_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .checked_mul(attempt.saturating_add(1))
            .unwrap_or(Duration::MAX)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true for a body that carries no content
pub fn is_unusable_body(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.is_empty() || trimmed == PLACEHOLDER_BODY
}

/// Sleeps for `delay` unless the stop signal fires first
///
/// Returns false if the sleep was cut short.
async fn backoff(delay: Duration, stop: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = stop.cancelled() => false,
    }
}

fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timeout".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

/// Fetches a URL, retrying under the policy and reporting to its breaker
///
/// # Retry Logic
///
/// | Condition | Action |
/// |-----------|--------|
/// | Stop signal set | Immediate → Aborted |
/// | HTTP 404 | Count, immediate → NotFound |
/// | HTTP 429 | Count; at threshold → RateLimited, else back off `base * 2^attempt` |
/// | Other non-2xx | Back off `base * (attempt + 1)` and retry |
/// | Network error | Back off `base * (attempt + 1)` and retry |
/// | 2xx, empty body | Reset 429/404, count → EmptyBody |
/// | 2xx | Reset all counters → body |
///
/// No backoff follows the last attempt. Running out of attempts returns
/// `RateLimited` if the last attempt was a 429, else `NetworkExhausted`.
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    policy: &FetchPolicy,
) -> Result<String, FetchFailure> {
    let breaker = &policy.breaker;
    let mut last_error = String::from("no attempts made");
    let mut last_rate_limited = false;

    for attempt in 0..policy.max_attempts {
        if breaker.is_stopped() {
            tracing::debug!("Stop signal set, not fetching {}", url);
            return Err(FetchFailure::Aborted);
        }

        let is_last = attempt + 1 >= policy.max_attempts;
        tracing::debug!("Fetching {} (attempt {}/{})", url, attempt + 1, policy.max_attempts);

        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                last_error = describe_error(&e);
                last_rate_limited = false;
                tracing::warn!(
                    "Request to {} failed (attempt {}/{}): {}",
                    url,
                    attempt + 1,
                    policy.max_attempts,
                    last_error
                );
                if !is_last {
                    backoff(policy.transient_delay(attempt), breaker.token()).await;
                }
                continue;
            }
        };

        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            let decision = breaker.record_failure(FailureClass::NotFound);
            tracing::warn!(
                "Not found: {} (consecutive 404s: {}/{})",
                url,
                decision.count,
                decision.threshold
            );
            if decision.tripped {
                tracing::error!("Consecutive 404 threshold reached, stopping");
            }
            return Err(FetchFailure::NotFound);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let decision = breaker.record_failure(FailureClass::RateLimited);
            tracing::warn!(
                "Rate limited on {} (consecutive 429s: {}/{})",
                url,
                decision.count,
                decision.threshold
            );
            if decision.tripped {
                tracing::error!("Consecutive 429 threshold reached, stopping");
                return Err(FetchFailure::RateLimited);
            }
            last_rate_limited = true;
            if !is_last {
                let delay = policy.rate_limit_delay(attempt);
                tracing::info!("Backing off {:?} before retrying {}", delay, url);
                backoff(delay, breaker.token()).await;
            }
            continue;
        }

        if !status.is_success() {
            last_error = format!("HTTP {}", status.as_u16());
            last_rate_limited = false;
            tracing::warn!(
                "Unexpected status {} from {} (attempt {}/{})",
                status.as_u16(),
                url,
                attempt + 1,
                policy.max_attempts
            );
            if !is_last {
                backoff(policy.transient_delay(attempt), breaker.token()).await;
            }
            continue;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                last_error = format!("failed to read body: {}", describe_error(&e));
                last_rate_limited = false;
                tracing::warn!("{} for {}", last_error, url);
                if !is_last {
                    backoff(policy.transient_delay(attempt), breaker.token()).await;
                }
                continue;
            }
        };

        let unusable = is_unusable_body(&body);
        let decision = breaker.record_success(!unusable);
        if unusable {
            tracing::warn!(
                "Empty body from {} (consecutive empty: {}/{})",
                url,
                decision.count,
                decision.threshold
            );
            if decision.tripped {
                tracing::error!("Consecutive empty-body threshold reached, stopping");
            }
            return Err(FetchFailure::EmptyBody);
        }

        return Ok(body.trim().to_string());
    }

    if last_rate_limited {
        Err(FetchFailure::RateLimited)
    } else {
        Err(FetchFailure::NetworkExhausted {
            attempts: policy.max_attempts,
            last_error,
        })
    }
}
