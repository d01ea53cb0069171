//! Exponential backoff for rate-limited API calls.
//!
//! This module provides the [`RetryPolicy`] and [`FailureType`] types for
//! classifying API errors and determining retry behavior.
//!
//! # Overview
//!
//! When a request fails, the error is classified into a [`FailureType`]:
//! - [`FailureType::RateLimited`] - HTTP 429; retried indefinitely with backoff
//! - [`FailureType::Transient`] - timeouts, network errors, 5xx; logged, not retried
//! - [`FailureType::Permanent`] - other 4xx, decode and IO errors; not retried
//!
//! Only rate limiting is retried. The remote service rejects bursts with 429
//! and recovers once callers slow down, whereas other failures are surfaced
//! to the caller as a per-tile outcome.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tileclip_core::api::{ApiError, FailureType, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = ApiError::http_status("https://api.planet.com/data/v1/quick-search", 429);
//! assert_eq!(classify_error(&error), FailureType::RateLimited);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(1));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("unexpected: {reason}"),
//! }
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::ApiError;

/// Default base delay for exponential backoff (1 second).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (10 seconds).
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(10);

/// Default backoff multiplier (doubles each attempt).
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Classification of API failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Server rate limiting (HTTP 429). The only retried class.
    RateLimited,

    /// Temporary failure that might succeed later.
    ///
    /// Examples: network timeout, 5xx server errors, connection refused.
    Transient,

    /// Failure that won't succeed regardless of retries.
    ///
    /// Examples: 400 boundary mismatch, 404, undecodable response.
    Permanent,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry the request.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Exponential backoff applied to rate-limited requests.
///
/// # Delay Calculation
///
/// ```text
/// delay(n) = min(base_delay * multiplier^(n - 1), max_delay)
/// ```
///
/// With defaults the delays are 1s, 2s, 4s, 8s, 10s, 10s, ... There is no
/// attempt limit: a rate-limited request is retried until it is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings.
    ///
    /// A `max_delay` below `base_delay` is raised to `base_delay`, and a
    /// multiplier below 1.0 is raised to 1.0, so delays never shrink.
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration, backoff_multiplier: f64) -> Self {
        let backoff_multiplier = if backoff_multiplier.is_finite() && backoff_multiplier >= 1.0 {
            backoff_multiplier
        } else {
            1.0
        };
        Self {
            base_delay,
            max_delay: max_delay.max(base_delay),
            backoff_multiplier,
        }
    }

    /// Creates a policy with custom base and max delays and the default multiplier.
    #[must_use]
    pub fn with_delays(base_delay: Duration, max_delay: Duration) -> Self {
        Self::new(base_delay, max_delay, DEFAULT_BACKOFF_MULTIPLIER)
    }

    /// Base delay before the first retry.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Upper bound on any single delay.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Determines whether to retry a failed request.
    ///
    /// `attempt` is the attempt number that just failed (1-indexed).
    #[instrument(level = "trace", skip(self))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        match failure_type {
            FailureType::Permanent => {
                return RetryDecision::DoNotRetry {
                    reason: "permanent failure - retry would not help".to_string(),
                };
            }
            FailureType::Transient => {
                return RetryDecision::DoNotRetry {
                    reason: "transient failure - only rate limiting is retried".to_string(),
                };
            }
            FailureType::RateLimited => {}
        }

        let delay = self.delay_for(attempt);
        RetryDecision::Retry {
            delay,
            attempt: attempt.saturating_add(1),
        }
    }

    /// Backoff delay after failed attempt `attempt` (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_secs = self.base_delay.as_secs_f64() * self.backoff_multiplier.powf(exponent);
        if delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs)
    }

    /// Runs `operation`, re-issuing it while it fails with a rate-limit error.
    ///
    /// The operation must be safe to re-issue: every retry calls it from scratch.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not classified as
    /// [`FailureType::RateLimited`].
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        self.run_observed(operation, |_, _| {}).await
    }

    /// Like [`run`](Self::run), reporting each `(failed_attempt, delay)` to
    /// `on_retry` before sleeping.
    ///
    /// # Errors
    ///
    /// Returns the first error that is not classified as
    /// [`FailureType::RateLimited`].
    pub async fn run_observed<T, F, Fut, O>(&self, mut operation: F, mut on_retry: O) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
        O: FnMut(u32, Duration),
    {
        let mut attempt: u32 = 1;
        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry { delay, attempt: next } => {
                    warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "rate limited; backing off"
                    );
                    on_retry(attempt, delay);
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, %reason, error = %error, "not retrying");
                    return Err(error);
                }
            }
        }
    }
}

/// Classifies an API error into a failure type for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | HTTP 429 | `RateLimited` |
/// | HTTP 408, 5xx | `Transient` |
/// | other HTTP status | `Permanent` |
/// | Timeout, Network | `Transient` |
/// | Decode, Io, InvalidUrl, Client | `Permanent` |
#[must_use]
pub fn classify_error(error: &ApiError) -> FailureType {
    match error {
        ApiError::HttpStatus { status, .. } => classify_http_status(*status),
        ApiError::Timeout { .. } | ApiError::Network { .. } => FailureType::Transient,
        ApiError::Decode { .. } | ApiError::Io { .. } | ApiError::InvalidUrl { .. } | ApiError::Client { .. } => {
            FailureType::Permanent
        }
    }
}

#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16) -> FailureType {
    match status {
        429 => FailureType::RateLimited, // Too Many Requests
        408 => FailureType::Transient,   // Request Timeout
        500..=599 => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}
