//! Retry with capped exponential backoff for collaborator calls
//!
//! A single [`RetryPolicy`] value is applied to both the pricing catalog and
//! the inventory. Each attempt is bounded by `attempt_timeout`; a
//! [`CancelSignal`] aborts an in-flight attempt or a backoff sleep at once.

use crate::error::CollaboratorError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Backoff parameters and the per-attempt timeout
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Growth factor applied to the delay after every failure
    pub multiplier: f64,
    /// Upper bound for a single delay
    pub max_delay: Duration,
    /// Timeout for one attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 1.5,
            max_delay: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that makes exactly one attempt
    pub fn no_retry(attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            attempt_timeout,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let delay_secs = self.initial_delay.as_secs_f64() * factor;
        let capped = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, runs out
    /// of attempts, or `cancel` fires.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancelSignal,
        mut op: F,
    ) -> Result<T, CollaboratorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CollaboratorError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(CollaboratorError::Cancelled);
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(CollaboratorError::Cancelled),
                result = tokio::time::timeout(self.attempt_timeout, op()) => match result {
                    Ok(inner) => inner,
                    Err(_) => Err(CollaboratorError::Timeout(self.attempt_timeout)),
                },
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        error = %err,
                        next_delay_ms = delay.as_millis() as u64,
                        "Collaborator call failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(CollaboratorError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    debug!(operation, attempt, error = %err, "Giving up on collaborator call");
                    return Err(err);
                }
            }
        }
    }
}

/// Cooperative cancellation shared by every outbound call of one analysis
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`CancelSignal::cancel`] has been called
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender is owned by self, so this never resolves while we live
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_initial_delay(Duration::from_millis(1))
            .with_max_delay(Duration::from_millis(5))
            .with_attempt_timeout(Duration::from_millis(50))
    }

    #[test]
    fn test_delay_schedule_is_capped() {
        let policy = RetryPolicy::default().with_max_attempts(6);
        assert_eq!(policy.delay_after(1), Duration::from_secs(1));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1500));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2250));
        assert_eq!(policy.delay_after(5), Duration::from_secs(5));
        assert_eq!(policy.delay_after(10), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_retries_transient_errors_until_success() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = fast_policy()
            .run("get_price", &CancelSignal::new(), move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(CollaboratorError::Unavailable("503".into()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_does_not_retry_authorization_errors() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = fast_policy()
            .run("get_price", &CancelSignal::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::Unauthorized("403".into()))
            })
            .await;

        assert!(matches!(result, Err(CollaboratorError::Unauthorized(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_counts_as_retryable() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<(), _> = fast_policy()
            .with_attempt_timeout(Duration::from_millis(10))
            .run("list_instance_types", &CancelSignal::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CollaboratorError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_attempt() {
        let cancel = CancelSignal::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let policy = RetryPolicy::default().with_attempt_timeout(Duration::from_secs(30));
        let started = std::time::Instant::now();
        let result: Result<(), _> = policy
            .run("list_node_pools", &cancel, || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .await;

        assert_eq!(result, Err(CollaboratorError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_makes_no_call() {
        let cancel = CancelSignal::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = fast_policy()
            .run("get_price", &cancel, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(result, Err(CollaboratorError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
