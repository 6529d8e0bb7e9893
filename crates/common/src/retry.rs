/*
 * Retry utilities with exponential backoff and jitter.
 *
 * Storage listing and deletion calls hit object stores that throttle and
 * return transient errors; those calls go through retry_async with the
 * storage profile before a failure is recorded.
 */

use crate::{CleanupError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: usize,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (typically 2.0)
    pub backoff_multiplier: f64,
    /// Add random jitter to prevent thundering herd (0.0-1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Creates a retry config with no retries (fail fast).
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Creates a retry config suitable for storage operations.
    pub fn for_storage() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }

    /// Calculates the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let base_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        // Add jitter
        let jitter = if self.jitter_factor > 0.0 {
            let jitter_range = capped_delay * self.jitter_factor;
            // Simple pseudo-random jitter based on attempt
            let jitter_value = (attempt as f64 * 0.618033988749895) % 1.0;
            jitter_range * jitter_value
        } else {
            0.0
        };

        Duration::from_secs_f64(capped_delay + jitter)
    }
}

/// Executes an async operation with retry logic.
///
/// The operation will be retried if it fails with a retryable error
/// (as determined by `CleanupError::is_retryable()`).
///
/// # Example
/// ```ignore
/// let entries = retry_async(&RetryConfig::for_storage(), || async {
///     list_dir(&op, path).await
/// }).await?;
/// ```
pub async fn retry_async<F, Fut, T>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    debug!("Operation succeeded on attempt {}", attempt + 1);
                }
                return Ok(value);
            }
            Err(e) => {
                let is_retryable = e.is_retryable();
                let attempts_remaining = config.max_retries.saturating_sub(attempt);

                if !is_retryable || attempts_remaining == 0 {
                    if !is_retryable {
                        debug!("Non-retryable error: {}", e);
                    } else {
                        warn!("All {} retries exhausted: {}", config.max_retries, e);
                    }
                    return Err(e);
                }

                let delay = e
                    .suggested_retry_delay()
                    .unwrap_or_else(|| config.delay_for_attempt(attempt));

                warn!(
                    "Attempt {} failed ({} remaining), retrying in {:?}: {}",
                    attempt + 1,
                    attempts_remaining,
                    delay,
                    e
                );

                tokio::time::sleep(delay).await;
                last_error = Some(e);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| CleanupError::Unexpected("Retry loop exited without result".to_string())))
}
