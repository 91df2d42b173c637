//! Retry utilities with exponential backoff for resilient API calls.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt (doubles each time)
    pub base_delay: Duration,
    /// Upper bound on the exponential part of the delay
    pub max_delay: Duration,
    /// Random jitter added on top, drawn from `[0, max_jitter)`
    pub max_jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    /// Same attempt budget with every delay set to zero
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Set the attempt budget
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Exponential part of the wait after failed attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Full wait after failed attempt `attempt`: backoff plus jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff(attempt) + jitter(self.max_jitter)
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Connection, timeout or transfer failure
    Network,
    /// Too many requests (429)
    TooManyRequests,
    /// Server error (5xx) on an idempotent request
    ServerError,
}

impl TransientError {
    /// Classify a SourceError; `None` means the error is terminal for the call
    pub fn from_source_error(err: &SourceError) -> Option<Self> {
        match err {
            SourceError::Network(_) => Some(TransientError::Network),
            SourceError::RateLimit => Some(TransientError::TooManyRequests),
            SourceError::Status { status: 429, .. } => Some(TransientError::TooManyRequests),
            SourceError::Status { status, .. } if *status >= 500 => {
                Some(TransientError::ServerError)
            }
            _ => None,
        }
    }
}

/// Execute an async operation with retry logic
///
/// # Arguments
///
/// * `config` - Retry configuration
/// * `context` - Label used in diagnostics
/// * `operation` - The async operation to execute
///
/// # Returns
///
/// The result of the operation, or the last error once the attempt budget is
/// spent. Non-transient errors (e.g. HTTP 400) are returned immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    context: &str,
    mut operation: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", context, attempt);
                }
                return Ok(result);
            }
            Err(error) => {
                let transient = TransientError::from_source_error(&error);
                let retries_left = match transient {
                    Some(_) => max_attempts - attempt,
                    None => 0,
                };

                tracing::warn!(
                    "{} failed on attempt {} ({} retries left): {}",
                    context,
                    attempt,
                    retries_left,
                    error
                );

                if retries_left == 0 {
                    return Err(error);
                }

                let delay = config.delay_for_attempt(attempt);
                tracing::debug!(
                    "Transient error {:?} for {}, retrying in {:?}",
                    transient,
                    context,
                    delay
                );
                sleep(delay).await;
            }
        }
    }
}
