//! Retry/backoff policy (C1): a decorator-like wrapper around a fallible
//! async operation. Exponential backoff with a bounded attempt count; only
//! errors the caller declares retryable trigger another attempt.

use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_retries,
            initial_delay,
            backoff_factor,
        }
    }

    /// Defaults for LLM calls (C3, C4): 3 retries, 2s initial delay, x2 backoff.
    pub const fn llm() -> Self {
        Self::new(3, Duration::from_secs(2), 2.0)
    }

    /// Defaults for medical-NER calls (C5): 2 retries, 1s initial delay, x2 backoff.
    pub const fn medical_ner() -> Self {
        Self::new(2, Duration::from_secs(1), 2.0)
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        Duration::from_millis(millis as u64)
    }

    /// Run `op` up to `1 + max_retries` times. `is_retryable` is consulted on
    /// each error; the first error for which it returns `false` propagates
    /// immediately without delay. Exhausting all attempts returns the last error.
    pub async fn run<F, Fut, T, E>(&self, is_retryable: impl Fn(&E) -> bool, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if attempt >= self.max_retries || !is_retryable(&err) {
                        return Err(err);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient failure");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_first_try_without_delay() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0);
        let result: Result<u32, ()> = policy.run(|_| true, || async { Ok(42) }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 1.5);
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                |_| true,
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(7)
                    }
                },
            )
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_retries() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1), 1.0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                |_| true,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("always fails")
                },
            )
            .await;
        assert_eq!(result, Err("always fails"));
        assert_eq!(calls.load(Ordering::SeqCst), 3); // initial attempt + 2 retries
    }

    #[tokio::test]
    async fn non_retryable_error_propagates_immediately() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1), 2.0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = policy
            .run(
                |_| false,
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                },
            )
            .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
