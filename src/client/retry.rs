// src/client/retry.rs

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries, the first one included.
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryPolicy {
    /// Ordinary calls: 3 tries, 1 s doubling.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            jitter_max: None,
        }
    }
}

impl RetryPolicy {
    /// Submission: scoring may hit a cold backend, so start slower.
    pub fn submission() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(20),
            jitter_max: None,
        }
    }

    /// A single try.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

/// Runs `f` until it succeeds, fails with an error `is_retryable` rejects,
/// or the policy's attempts are used up. The delay doubles after every
/// failure, capped at `max_backoff`.
pub async fn retry_with<F, Fut, T, E, P>(policy: &RetryPolicy, is_retryable: P, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempts_left = policy.max_attempts.max(1);
    let mut backoff = policy.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left -= 1;
                if attempts_left == 0 || !is_retryable(&e) {
                    return Err(e);
                }

                let wait = match policy.jitter_max {
                    Some(jitter_max) if !jitter_max.is_zero() => {
                        let extra = rand::rng().random_range(0..=jitter_max.as_millis() as u64);
                        backoff + Duration::from_millis(extra)
                    }
                    _ => backoff,
                };
                tracing::warn!("Request failed ({}), retrying in {:?}", e, wait);
                tokio::time::sleep(wait).await;

                backoff = std::cmp::min(backoff * 2, policy.max_backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            jitter_max: None,
        }
    }

    #[tokio::test]
    async fn succeeds_after_retries() {
        let counter = AtomicUsize::new(0);
        let res: Result<usize, &'static str> = retry_with(&fast(3), |_| true, || async {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err("fail") } else { Ok(n) }
        })
        .await;

        assert_eq!(res, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fails_after_max_attempts() {
        let counter = AtomicUsize::new(0);
        let res: Result<(), &'static str> = retry_with(&fast(2), |_| true, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("always fail")
        })
        .await;

        assert!(res.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let counter = AtomicUsize::new(0);
        let res: Result<(), &'static str> = retry_with(&fast(5), |e| *e != "fatal", || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err("fatal")
        })
        .await;

        assert_eq!(res, Err("fatal"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_doubles() {
        let start = tokio::time::Instant::now();
        let policy = RetryPolicy::default();
        let res: Result<(), &'static str> =
            retry_with(&policy, |_| true, || async { Err("down") }).await;

        assert!(res.is_err());
        // 1 s + 2 s between the three tries
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn jitter_stays_within_bounds() {
        let start = tokio::time::Instant::now();
        let policy = RetryPolicy {
            max_attempts: 2,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(100),
            jitter_max: Some(Duration::from_millis(50)),
        };
        let _: Result<(), &'static str> = retry_with(&policy, |_| true, || async { Err("down") }).await;

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(160));
    }
}
