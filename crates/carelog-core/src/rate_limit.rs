use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Fixed-window request counter keyed by an arbitrary string (the API keys
/// windows by client IP). Windows reset lazily on the first check after they
/// elapse; idle keys are pruned once the map grows past a threshold.
#[derive(Default)]
pub struct RateLimiter {
    inner: Mutex<HashMap<String, WindowState>>,
}

#[derive(Clone, Copy)]
pub struct RateLimitOutcome {
    pub allowed: bool,
    pub remaining: u64,
    pub retry_after: Option<Duration>,
}

struct WindowState {
    window_start: Instant,
    count: u64,
}

const PRUNE_THRESHOLD: usize = 4096;

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn check(&self, key: &str, limit: u64, window: Duration) -> RateLimitOutcome {
        if limit == 0 {
            return RateLimitOutcome {
                allowed: false,
                remaining: 0,
                retry_after: Some(window),
            };
        }

        let mut guard = self.inner.lock().await;
        if guard.len() > PRUNE_THRESHOLD {
            guard.retain(|_, state| state.window_start.elapsed() < window);
        }

        let entry = guard.entry(key.to_string()).or_insert_with(|| WindowState {
            window_start: Instant::now(),
            count: 0,
        });

        if entry.window_start.elapsed() >= window {
            entry.window_start = Instant::now();
            entry.count = 0;
        }

        entry.count += 1;
        if entry.count > limit {
            let retry_after = window.saturating_sub(entry.window_start.elapsed());
            return RateLimitOutcome {
                allowed: false,
                remaining: 0,
                retry_after: Some(retry_after),
            };
        }

        RateLimitOutcome {
            allowed: true,
            remaining: limit.saturating_sub(entry.count),
            retry_after: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);

        for expected_remaining in (0..3).rev() {
            let outcome = limiter.check("10.0.0.1", 3, window).await;
            assert!(outcome.allowed);
            assert_eq!(outcome.remaining, expected_remaining);
        }

        let outcome = limiter.check("10.0.0.1", 3, window).await;
        assert!(!outcome.allowed);
        assert!(outcome.retry_after.is_some());
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let window = Duration::from_secs(60);

        assert!(limiter.check("10.0.0.1", 1, window).await.allowed);
        let blocked = limiter.check("10.0.0.1", 1, window).await;
        assert!(!blocked.allowed);

        let other = limiter.check("10.0.0.2", 1, window).await;
        assert!(other.allowed);
    }

    #[tokio::test]
    async fn window_resets_after_elapsing() {
        let limiter = RateLimiter::new();
        let window = Duration::from_millis(20);

        limiter.check("10.0.0.1", 1, window).await;
        assert!(!limiter.check("10.0.0.1", 1, window).await.allowed);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(limiter.check("10.0.0.1", 1, window).await.allowed);
    }

    #[tokio::test]
    async fn zero_limit_blocks_everything() {
        let limiter = RateLimiter::new();
        let outcome = limiter.check("10.0.0.1", 0, Duration::from_secs(60)).await;
        assert!(!outcome.allowed);
    }
}
