use anyhow::{anyhow, Result};
use log::warn;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed-delay retry strategy for calls to external services.
///
/// The policy only decides how often to try; callers pick the fallback value
/// once [`RetryPolicy::run`] gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// No delay between attempts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Runs `op` until it succeeds or the attempts run out, returning the last error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = anyhow!("{} was never attempted", what);

        for attempt in 1..=self.max_attempts {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) => {
                    warn!("{} failed (attempt {}/{}): {:#}", what, attempt, self.max_attempts, e);
                    last_error = e;
                }
            }
            if attempt < self.max_attempts && !self.delay.is_zero() {
                sleep(self.delay).await;
            }
        }

        Err(last_error.context(format!("{} failed after {} attempts", what, self.max_attempts)))
    }

    /// Like [`RetryPolicy::run`], but resolves to `fallback` instead of failing.
    pub async fn run_or<T, F, Fut>(&self, what: &str, fallback: T, op: F) -> T
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run(what, op).await.unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_failures() -> Result<()> {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::immediate(3);

        let value = policy
            .run("flaky", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(anyhow!("not yet"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await?;

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_gives_up_with_fallback() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::immediate(3);

        let value = policy
            .run_or("broken", "fallback".to_string(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<String, _>(anyhow!("down")) }
            })
            .await;

        assert_eq!(value, "fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts, 1);
        let result = policy.run("once", |_| async { Ok::<_, anyhow::Error>(1) }).await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts_only() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        let start = tokio::time::Instant::now();
        let _ = policy
            .run("slow", |_| async { Err::<(), _>(anyhow!("down")) })
            .await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2) && elapsed < Duration::from_secs(3));
    }
}
