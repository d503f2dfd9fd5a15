//! Bounded exponential-backoff retry for backend calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{BackendError, TransportError};
use crate::storage::RetryConfig;

/// Retry budget: `max_retries` retries after the first attempt, waiting
/// `initial_delay`, then twice that, and so on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_delay(),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// Every [`TransportError`] is treated as transient.
    pub async fn run<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0u32;
        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!(operation = operation_name, attempt, "backend call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts() => {
                    tracing::warn!(
                        operation = operation_name,
                        attempts = attempt,
                        error = %e,
                        "backend call failed, retry budget exhausted"
                    );
                    return Err(BackendError {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "backend call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn flaky(failures: u32, calls: Arc<Mutex<Vec<Instant>>>) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<&'static str, TransportError>>>> {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let mut calls = calls.lock().unwrap();
                calls.push(Instant::now());
                if calls.len() as u32 <= failures {
                    Err(TransportError::Status {
                        status: 503,
                        body: "unavailable".into(),
                    })
                } else {
                    Ok("done")
                }
            })
        }
    }

    #[test]
    fn delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_waits_half_then_one_second() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let result = RetryPolicy::default()
            .run("summarize", flaky(2, calls.clone()))
            .await;

        assert_eq!(result.unwrap(), "done");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_millis(500));
        assert_eq!(calls[2] - calls[1], Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn three_failures_exhaust_budget_without_fourth_attempt() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let err = RetryPolicy::default()
            .run("classify", flaky(10, calls.clone()))
            .await
            .unwrap_err();

        assert_eq!(calls.lock().unwrap().len(), 3);
        assert_eq!(err.operation, "classify");
        assert_eq!(err.attempts, 3);
        assert!(err.message.contains("503"));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_retries_makes_one_attempt() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let err = RetryPolicy::none()
            .run("store", flaky(1, calls.clone()))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
