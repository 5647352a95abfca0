//! Retry policies with exponential backoff
//!
//! Classifies the outcome of one HTTP attempt into a [`RetryDecision`].
//! Classification is pure: the executor owns the loop, the sleeping and the
//! token invalidation.

use chrono::{DateTime, Utc};
use log::debug;
use rand::Rng;
use std::time::Duration;

use super::super::constants::headers;
use super::super::error::{ApiError, ErrorLabel, TransportError};
use super::super::transport::HttpResponse;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt; 3 means at most 4 attempts
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Cap on the computed backoff schedule
    pub max_delay: Duration,
    /// Cap on a server-supplied `Retry-After`, independent of `max_delay`
    pub max_retry_after: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            max_retry_after: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_retry_after: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

/// Kinds of failure and their retry behavior
#[derive(Debug, Clone, PartialEq)]
pub enum RetryableError {
    /// No response received (timeout, connection reset, DNS)
    Network,
    /// HTTP 5xx
    ServerError(u16),
    /// HTTP 429
    RateLimited,
    /// HTTP 401
    Unauthorized,
    /// Any other 4xx
    ClientError(u16),
    /// Anything outside the ranges above
    Unknown(u16),
}

impl RetryableError {
    /// Whether backing off and trying again can help
    pub fn should_retry(&self) -> bool {
        match self {
            RetryableError::Network => true,
            RetryableError::ServerError(_) => true,
            RetryableError::RateLimited => true,
            RetryableError::Unauthorized => false,
            RetryableError::ClientError(_) => false,
            RetryableError::Unknown(_) => false,
        }
    }

    pub fn from_status_code(status: u16) -> Self {
        match status {
            401 => RetryableError::Unauthorized,
            429 => RetryableError::RateLimited,
            400..=499 => RetryableError::ClientError(status),
            500..=599 => RetryableError::ServerError(status),
            _ => RetryableError::Unknown(status),
        }
    }
}

/// What the executor should do after one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Success(HttpResponse),
    /// Drop the cached token and try once more immediately
    Reauthenticate,
    /// Sleep for the delay, then try again
    Retry { delay: Duration, error: ApiError },
    Terminal(ApiError),
}

/// Retry policy that implements bounded exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Classify one attempt.
    ///
    /// `retries_used` counts backoff retries already spent on this call and
    /// `reauthenticated` whether the single 401 recovery has been used.
    pub fn classify(
        &self,
        outcome: Result<HttpResponse, TransportError>,
        retries_used: u32,
        reauthenticated: bool,
    ) -> RetryDecision {
        let response = match outcome {
            Ok(response) => response,
            Err(error) => {
                return self.retry_or_give_up(ApiError::network(&error), None, retries_used);
            }
        };

        if response.is_success() {
            return RetryDecision::Success(response);
        }

        let kind = RetryableError::from_status_code(response.status);
        let error = ApiError::from_response(response.status, &response.body);

        match kind {
            RetryableError::Unauthorized if !reauthenticated => RetryDecision::Reauthenticate,
            RetryableError::Unauthorized => RetryDecision::Terminal(ApiError::new(
                401,
                ErrorLabel::AuthFailed,
                format!("Request unauthorized after re-authentication: {}", error.detail),
            )),
            RetryableError::RateLimited => {
                let hint = response
                    .header(headers::RETRY_AFTER)
                    .and_then(|value| parse_retry_after(value, Utc::now()));
                self.retry_or_give_up(error, hint, retries_used)
            }
            kind if kind.should_retry() => self.retry_or_give_up(error, None, retries_used),
            _ => RetryDecision::Terminal(error),
        }
    }

    fn retry_or_give_up(
        &self,
        error: ApiError,
        retry_after: Option<Duration>,
        retries_used: u32,
    ) -> RetryDecision {
        if retries_used >= self.config.max_retries {
            debug!("Retry budget of {} exhausted: {}", self.config.max_retries, error);
            return RetryDecision::Terminal(error);
        }

        let delay = match retry_after {
            // The server's hint wins over the schedule
            Some(server_delay) => server_delay.min(self.config.max_retry_after),
            None => self.calculate_delay(retries_used + 1),
        };
        RetryDecision::Retry { delay, error }
    }

    /// Backoff before retry number `retry` (1-based): base * factor^(retry-1), capped
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = (self.config.base_delay.as_millis() as f64)
            * self.config.backoff_multiplier.powi(exponent);

        let max_ms = self.config.max_delay.as_millis() as f64;
        let mut delay = Duration::from_millis(delay_ms.min(max_ms) as u64);

        if self.config.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay = Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64);
        }

        delay
    }
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = date.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}
