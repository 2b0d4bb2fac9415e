//! Retry and backoff strategies.
//!
//! The executor is transport-agnostic: callers hand it a classification
//! function that decides, per error, whether another attempt is worthwhile.
//! [`classify`] is the classification used for provider calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::QuillError;

/// Retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Backoff strategy.
    pub strategy: BackoffStrategy,
    /// Jitter factor (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            strategy: BackoffStrategy::ExponentialBackoff { multiplier: 2.0 },
            jitter: 0.2,
        }
    }
}

/// Backoff strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries.
    Fixed,
    /// Linear backoff (delay increases linearly).
    Linear { increment: f64 },
    /// Exponential backoff.
    ExponentialBackoff { multiplier: f64 },
    /// No delay.
    Immediate,
}

impl BackoffStrategy {
    /// Calculate the delay for the given retry (0 = first retry).
    pub fn delay(&self, retry: u32, initial: Duration, max: Duration) -> Duration {
        let delay = match self {
            Self::Fixed => initial,
            Self::Linear { increment } => {
                Duration::from_secs_f64(initial.as_secs_f64() + (retry as f64 * increment))
            }
            Self::ExponentialBackoff { multiplier } => {
                Duration::from_secs_f64(initial.as_secs_f64() * multiplier.powi(retry as i32))
            }
            Self::Immediate => Duration::ZERO,
        };

        delay.min(max)
    }
}

/// Outcome of classifying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again. `after` is a server-provided lower bound for the delay.
    Retry { after: Option<Duration> },
    /// Terminal failure; surface the error immediately.
    Stop,
}

/// Classification for provider errors: transient failures retry, everything
/// else (authentication, malformed request, validation) stops.
pub fn classify(error: &QuillError) -> RetryDecision {
    if error.is_retriable() {
        RetryDecision::Retry {
            after: error.retry_after_secs().map(Duration::from_secs),
        }
    } else {
        RetryDecision::Stop
    }
}

/// Retry executor.
#[derive(Debug, Clone)]
pub struct Retry {
    config: RetryConfig,
}

impl Retry {
    /// Create a new retry executor.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create with default config.
    pub fn default_retry() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Execute `f` until it succeeds, `classify` says stop, or the attempt
    /// budget runs out. The last error is returned unchanged.
    pub async fn execute<F, Fut, T, E, C>(&self, classify: C, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> RetryDecision,
        E: Display,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match f().await {
                Ok(result) => return Ok(result),
                Err(error) => error,
            };

            let after = match classify(&error) {
                RetryDecision::Stop => {
                    debug!(attempt, error = %error, "Terminal error, not retrying");
                    return Err(error);
                }
                RetryDecision::Retry { after } => after,
            };

            if attempt >= self.config.max_attempts {
                warn!(
                    attempt,
                    max_attempts = self.config.max_attempts,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(error);
            }

            let delay = self.delay_for(attempt, after);
            warn!(
                attempt,
                max_attempts = self.config.max_attempts,
                delay_ms = delay.as_millis(),
                error = %error,
                "Retrying after error"
            );

            sleep(delay).await;
        }
    }

    /// Delay before the retry that follows `attempt`, honoring a server hint
    /// as a lower bound. The hint itself is capped at `max_delay`.
    fn delay_for(&self, attempt: u32, after: Option<Duration>) -> Duration {
        let backoff = self.calculate_delay(attempt);
        match after {
            Some(hint) => {
                let hint = hint.min(self.config.max_delay);
                debug!(
                    retry_after_ms = hint.as_millis(),
                    backoff_ms = backoff.as_millis(),
                    "Respecting Retry-After hint"
                );
                backoff.max(hint)
            }
            None => backoff,
        }
    }

    /// Calculate the jittered backoff delay for the retry after `attempt`.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.strategy.delay(
            attempt.saturating_sub(1),
            self.config.initial_delay,
            self.config.max_delay,
        );

        if self.config.jitter > 0.0 && !base_delay.is_zero() {
            let jitter_range = base_delay.as_secs_f64() * self.config.jitter;
            let jitter = rand::rng().random_range(-jitter_range..=jitter_range);
            Duration::from_secs_f64((base_delay.as_secs_f64() + jitter).max(0.0))
        } else {
            base_delay
        }
    }
}
