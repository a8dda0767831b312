use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::errors::{GenerationError, Result};

/// Exponential backoff for transient backend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay.saturating_mul(1u32 << exponent)
    }
}

/// Source of delays. Injected so tests can observe backoff without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
///
/// Only transient backend errors are retried. Returns the value together with
/// the number of attempts it took.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut operation: F,
) -> Result<(T, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(GenerationError::Backend(err)) if err.is_transient() => {
                if attempt >= max_attempts {
                    warn!(
                        event = "retry_exhausted",
                        attempts = attempt,
                        error = %err,
                        "giving up on backend"
                    );
                    return Err(GenerationError::RetryExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                let backoff = policy.backoff(attempt);
                warn!(
                    event = "retry_scheduled",
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "transient backend error"
                );
                sleeper.sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{BackendError, TransportKind};

    fn reset() -> GenerationError {
        GenerationError::Backend(BackendError::transport(
            TransportKind::ConnectionReset,
            "reset by peer",
        ))
    }

    #[test]
    fn backoff_doubles_from_the_base() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        let delays: Vec<_> = (1..=4).map(|attempt| policy.backoff(attempt)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(800),
            ]
        );
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy {
            max_attempts: 100,
            base_delay: Duration::from_secs(u64::MAX / 2),
        };
        assert_eq!(policy.backoff(80), Duration::MAX);
    }

    #[tokio::test]
    async fn recovers_after_a_transient_failure() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        };
        let (value, attempts) = retry_transient(&policy, &sleeper, |attempt| async move {
            if attempt == 1 { Err(reset()) } else { Ok(attempt) }
        })
        .await
        .unwrap();
        assert_eq!((value, attempts), (2, 2));
        assert_eq!(sleeper.delays(), vec![Duration::from_millis(10)]);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let sleeper = RecordingSleeper::default();
        let mut calls = 0;
        let err = retry_transient(&RetryPolicy::default(), &sleeper, |_| {
            calls += 1;
            async { Err::<(), _>(GenerationError::Backend(BackendError::Auth { status: 401 })) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, GenerationError::Backend(BackendError::Auth { .. })));
        assert_eq!(calls, 1);
        assert!(sleeper.delays().is_empty());
    }
}
