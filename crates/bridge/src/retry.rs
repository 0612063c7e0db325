// crates/bridge/src/retry.rs
//! The retry policy shared by every outbound call.
//!
//! ```text
//! ATTEMPT ──ok──────────────▶ SUCCESS
//!    │
//!    ├─retryable, budget left─▶ sleep(delay) ─▶ ATTEMPT
//!    └─terminal / exhausted──▶ FAILURE
//! ```
//!
//! The delay before attempt `n + 1` is `base * 2^(n - 1)` capped at
//! `max_delay`, raised to the server's `Retry-After` when that is longer.
//! There is no jitter, so the schedule never shrinks between attempts.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Backoff after the `attempt`-th failure (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff, or the server's hint when that is longer.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let computed = self.backoff(attempt);
        match retry_after {
            Some(hint) if hint > computed => hint,
            _ => computed,
        }
    }

    /// Run `op` until it succeeds, fails terminally, or the budget runs out.
    ///
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        operation: &str,
        mut op: F,
    ) -> Result<T, ClientError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                tracing::debug!(operation, attempt, error = %err, "Terminal failure");
                return Err(err);
            }
            if attempt >= self.max_attempts {
                tracing::warn!(operation, attempts = attempt, error = %err, "Retry budget exhausted");
                return Err(ClientError::Exhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_for(attempt, err.retry_after());
            tracing::info!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after backoff"
            );
            sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Numeric `Retry-After` (seconds). HTTP-date values are ignored.
pub fn parse_retry_after(value: &HeaderValue) -> Option<Duration> {
    value
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Waits between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn unavailable() -> ClientError {
        ClientError::Status {
            status: 503,
            body: String::new(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, ms(500), ms(3000));
        let schedule: Vec<_> = (1..=5).map(|n| policy.backoff(n)).collect();
        assert_eq!(schedule, vec![ms(500), ms(1000), ms(2000), ms(3000), ms(3000)]);
        assert_eq!(policy.backoff(200), ms(3000));
    }

    #[test]
    fn test_retry_after_only_raises_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1, Some(Duration::from_secs(5))), Duration::from_secs(5));
        assert_eq!(policy.delay_for(2, Some(ms(10))), ms(1000));
        assert_eq!(policy.delay_for(2, None), ms(1000));
    }

    #[test]
    fn test_new_clamps_budget() {
        let policy = RetryPolicy::new(0, ms(100), ms(10));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_delay, ms(100));
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(
            parse_retry_after(&HeaderValue::from_static("12")),
            Some(Duration::from_secs(12))
        );
        assert_eq!(
            parse_retry_after(&HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT")),
            None
        );
    }

    #[tokio::test]
    async fn test_run_exhausts_exact_budget() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(&sleeper, "probe", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(unavailable()) }
            })
            .await;

        assert!(matches!(result, Err(ClientError::Exhausted { attempts: 3, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.delays(), vec![ms(500), ms(1000)]);
    }

    #[tokio::test]
    async fn test_run_stops_on_terminal_error() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(&sleeper, "probe", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ClientError::Status {
                        status: 401,
                        body: String::new(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(ClientError::Status { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_run_recovers_mid_budget() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::new();

        let result = policy
            .run(&sleeper, "probe", |attempt| async move {
                if attempt < 2 {
                    Err(ClientError::RateLimited {
                        retry_after: Some(Duration::from_secs(2)),
                    })
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(2)]);
    }
}
