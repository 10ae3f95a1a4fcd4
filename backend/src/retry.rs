use std::future::Future;
use std::time::Duration;

use ring::rand::{SecureRandom, SystemRandom};
use tracing::warn;

use crate::store::StoreError;

/// Bounded exponential backoff for store calls.
///
/// Attempt `n` (zero based) waits `base_delay * 2^n` plus up to 20% jitter,
/// never more than `max_delay`. After `max_attempts` calls the last error is
/// returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        let jitter = backoff.mul_f64(0.2 * jitter_fraction());

        (backoff + jitter).min(self.max_delay)
    }
}

fn jitter_fraction() -> f64 {
    let mut bytes = [0u8; 2];
    match SystemRandom::new().fill(&mut bytes) {
        Ok(()) => f64::from(u16::from_le_bytes(bytes)) / f64::from(u16::MAX),
        Err(_) => 0.0,
    }
}

/// Runs an idempotent `call` until it succeeds, fails with a non-transient
/// error, or the policy's attempt budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, call: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    retry_while(policy, operation, StoreError::is_transient, call).await
}

/// Like [`with_retry`] for calls that must not be applied twice: only errors
/// raised before the command reached the store are retried.
pub async fn with_retry_unsent<T, F, Fut>(policy: &RetryPolicy, operation: &str, call: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    retry_while(policy, operation, StoreError::is_unsent, call).await
}

async fn retry_while<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    retryable: fn(&StoreError) -> bool,
    mut call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if retryable(&e) && attempt + 1 < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Store call failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_delays_grow_and_stay_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };

        let first = policy.delay_for(0);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(120));

        let third = policy.delay_for(2);
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(480));

        for attempt in 0..40 {
            assert!(policy.delay_for(attempt) <= policy.max_delay);
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Connection("refused".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_is_bounded() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(4), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Connection("refused".into()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Connection(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_lost_replies_are_retried_only_when_idempotent() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(3), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::Interrupted("connection reset".into()))
            } else {
                Ok(())
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry_unsent(&fast_policy(3), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Interrupted("timed out".into()))
        })
        .await;
        assert!(matches!(result, Err(StoreError::Interrupted(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsent_calls_are_retried() {
        let calls = AtomicU32::new(0);
        let result = with_retry_unsent(&fast_policy(3), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(StoreError::Connection("refused".into()))
            } else {
                Ok(1)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(4), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Command("WRONGTYPE".into()))
        })
        .await;

        assert!(matches!(result, Err(StoreError::Command(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
