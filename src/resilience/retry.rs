//! Generic bounded-retry helper with exponential backoff.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

/// Backoff and bounds for one class of retried operations.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_interval: Duration,
    /// Backoff multiplier applied after every failed attempt.
    pub multiplier: f64,
    /// Upper bound for the delay between attempts.
    pub max_interval: Duration,
    /// Maximum number of attempts; `None` retries indefinitely.
    pub max_attempts: Option<u32>,
    /// Overall deadline across attempts and delays; `None` is unbounded.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 2.0,
            max_interval: Duration::from_secs(60),
            max_attempts: Some(10),
            max_elapsed: None,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries; every error is final.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    /// Delay before the attempt following `attempt` (1-based), capped at
    /// `max_interval`.
    pub fn interval_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let interval = self.initial_interval.mul_f64(factor.max(0.0));
        interval.min(self.max_interval)
    }

    fn exhausted(&self, attempt: u32, started: Instant, next_delay: Duration) -> bool {
        if let Some(max_attempts) = self.max_attempts {
            if attempt >= max_attempts {
                return true;
            }
        }
        if let Some(max_elapsed) = self.max_elapsed {
            if started.elapsed() + next_delay >= max_elapsed {
                return true;
            }
        }
        false
    }
}

/// Run `op` under `policy`, retrying errors for which `is_retryable` returns
/// true. The last error is returned when retries are exhausted or the error
/// is not retryable.
pub async fn retry_with_policy<T, E, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let mut attempt: u32 = 1;

    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                if !is_retryable(&e) {
                    debug!(operation, error = %e, "error is not retryable");
                    return Err(e);
                }
                let delay = policy.interval_for(attempt);
                if policy.exhausted(attempt, started, delay) {
                    error!(
                        operation,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "retries exhausted"
                    );
                    return Err(e);
                }
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
