use std::future::Future;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// `base * 2^attempt`, capped. `attempt` counts from 0.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_backoff)
    }
}

/// Run `op` under a request slot, retrying transient failures.
///
/// Each attempt holds one permit. A successful attempt keeps the permit for
/// `delay` before releasing it, so the limiter also paces the source. The
/// permit is released before sleeping out a backoff.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    limiter: &Semaphore,
    delay: Duration,
    label: &str,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        let result = {
            let Ok(_permit) = limiter.acquire().await else {
                return Err(FetchError::Transport {
                    url: label.to_string(),
                    message: "request limiter closed".into(),
                });
            };
            let result = op().await;
            if result.is_ok() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt + 1 < policy.max_attempts => {
                let backoff = policy.backoff(attempt);
                warn!(
                    "{} failed: {} (attempt {}/{}), backing off {:.1}s",
                    label,
                    e,
                    attempt + 1,
                    policy.max_attempts,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn timeout() -> FetchError {
        FetchError::Timeout { url: "u".into() }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 5,
            base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        };
        assert_eq!(p.backoff(0), Duration::from_secs(1));
        assert_eq!(p.backoff(1), Duration::from_secs(2));
        assert_eq!(p.backoff(3), Duration::from_secs(8));
        assert_eq!(p.backoff(4), Duration::from_secs(10));
        assert_eq!(p.backoff(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn transient_errors_use_every_attempt() {
        let calls = AtomicU32::new(0);
        let sem = Semaphore::new(1);
        let result: Result<(), _> = with_retry(&fast(3), &sem, Duration::ZERO, "u", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout()) }
        })
        .await;
        assert!(matches!(result, Err(FetchError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let sem = Semaphore::new(1);
        let result = with_retry(&fast(3), &sem, Duration::ZERO, "u", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(FetchError::Status { status: 503, url: "u".into() })
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(sem.available_permits(), 1);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let sem = Semaphore::new(1);
        let result: Result<(), _> = with_retry(&fast(3), &sem, Duration::ZERO, "u", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(FetchError::Status { status: 404, url: "u".into() }) }
        })
        .await;
        assert_eq!(result.unwrap_err().status(), Some(404));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_attempt_policy() {
        let calls = AtomicU32::new(0);
        let sem = Semaphore::new(1);
        let _ = with_retry::<(), _, _>(&fast(1), &sem, Duration::ZERO, "u", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(timeout()) }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
