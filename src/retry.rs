//! First-class retry policy, composed functionally around a future rather
//! than applied via a decorator/attribute macro.

use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

/// `base` * 2^attempt, capped at `cap`, for up to `attempts` tries.
/// Defaults (0.3s base, 3s cap, 3 attempts) mirror the upstream search
/// clients' historical retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub cap: Duration,
    pub attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(300),
            cap: Duration::from_secs(3),
            attempts: 3,
        }
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, cap: Duration, attempts: usize) -> Self {
        Self { base, cap, attempts }
    }

    fn strategy(&self) -> impl Iterator<Item = Duration> {
        let cap = self.cap;
        ExponentialBackoff::from_millis(2)
            .factor(self.base.as_millis().max(1) as u64 / 2)
            .map(move |d| d.min(cap))
            .map(jitter)
            .take(self.attempts.saturating_sub(1))
    }

    /// Runs `action` up to `attempts` times, backing off between
    /// failures. Returns the last error if every attempt fails.
    pub async fn run<T, E, F, Fut>(&self, mut action: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        Retry::spawn(self.strategy(), move || action()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5), 3);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = attempts.clone();

        let result: Result<u32, &'static str> = policy
            .run(|| {
                let attempts = attempts2.clone();
                async move {
                    let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 2 {
                        Err("not yet")
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(5), 3);
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts2 = attempts.clone();

        let result: Result<u32, &'static str> = policy
            .run(|| {
                let attempts = attempts2.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err("always fails")
                }
            })
            .await;

        assert_eq!(result, Err("always fails"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
