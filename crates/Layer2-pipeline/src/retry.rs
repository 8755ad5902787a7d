//! Retry logic with exponential backoff
//!
//! Attempt `n` (0-indexed) waits `initial_delay * multiplier^n` before the
//! next try. Retries are capped by count only; the most recent error is the
//! one returned.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds)
    pub initial_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Doubling schedule with the given unit and retry cap
    pub fn exponential(max_retries: u32, unit: Duration) -> Self {
        Self {
            max_retries,
            initial_delay_ms: u64::try_from(unit.as_millis()).unwrap_or(u64::MAX),
            backoff_multiplier: 2.0,
        }
    }

    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.initial_delay_ms as f64
            * self
                .backoff_multiplier
                .powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        Duration::from_millis(delay.min(u64::MAX as f64) as u64)
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    /// Should retry (transient error)
    Retry,

    /// Should not retry (permanent error)
    NoRetry,
}

/// Trait for errors that can be classified for retry
pub trait RetryableError {
    fn classify(&self) -> RetryClassification;
}

/// Execute an async operation with retry logic
///
/// `operation` receives the 0-indexed attempt number.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => return Ok(result),
            Err(e) => match e.classify() {
                RetryClassification::NoRetry => {
                    debug!(
                        "{}: non-retryable error on attempt {}: {}",
                        operation_name,
                        attempt + 1,
                        e
                    );
                    return Err(e);
                }
                RetryClassification::Retry => {
                    if attempt >= config.max_retries {
                        warn!(
                            "{}: max retries ({}) exceeded: {}",
                            operation_name, config.max_retries, e
                        );
                        return Err(e);
                    }

                    let delay = config.delay_for_attempt(attempt);
                    warn!(
                        "{}: attempt {} failed, retrying in {:?}: {}",
                        operation_name,
                        attempt + 1,
                        delay,
                        e
                    );

                    sleep(delay).await;
                    attempt += 1;
                }
            },
        }
    }
}
