//! Backoff settings for control-plane calls
//!
//! [`RetryConfig`] bounds how often a retryable control-plane error is
//! retried. [`PollConfig`] bounds how long a resource may stay in a
//! transitional status before the reconciler gives up on it.

use crate::error::ControlPlaneError;
use std::time::Duration;
use tracing::{error, warn};

/// Retry configuration for retryable control-plane errors
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial delay between retries
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff_delay(
            self.initial_delay,
            self.backoff_multiplier,
            self.max_delay,
            attempt,
        )
    }
}

/// Polling configuration for resources in Creating/Updating/Deleting
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay before the first re-describe
    pub initial_delay: Duration,

    /// Maximum delay between re-describes
    pub max_delay: Duration,

    /// Backoff multiplier
    pub multiplier: f64,

    /// Total time a resource may stay transitional
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl PollConfig {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        backoff_delay(self.initial_delay, self.multiplier, self.max_delay, attempt)
    }
}

fn backoff_delay(initial: Duration, multiplier: f64, max: Duration, attempt: u32) -> Duration {
    let secs = initial.as_secs_f64() * multiplier.powi(attempt as i32);
    Duration::from_secs_f64(secs.min(max.as_secs_f64()))
}

/// Run a control-plane call, retrying retryable errors with exponential backoff
///
/// Non-retryable errors are returned immediately. The last error is returned
/// once `max_attempts` is exhausted.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> std::result::Result<T, ControlPlaneError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, ControlPlaneError>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                attempt += 1;
                if attempt >= config.max_attempts.max(1) {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt - 1);
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = PollConfig {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10000),
            multiplier: 2.0,
            timeout: Duration::from_secs(60),
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(1000));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(2000));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(8000));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(10000)); // capped
    }

    #[tokio::test]
    async fn test_retries_retryable_errors() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result = retry_with_backoff(&fast(), "describe", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(ControlPlaneError::throttled("slow down"))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<(), _> = retry_with_backoff(&fast(), "create", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ControlPlaneError::new(ErrorClass::QuotaExceeded, "no more"))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().class, ErrorClass::QuotaExceeded);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausts_max_attempts() {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();

        let result: Result<(), _> = retry_with_backoff(&fast(), "update", || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(ControlPlaneError::throttled("always"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
