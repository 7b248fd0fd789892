//! Request pacing shared by every worker
//!
//! The remote operator asks for a pause between requests. The limiter keeps
//! the time of the last permitted request behind an async mutex; a caller
//! holds the lock while it sleeps, so two workers can never both pass
//! without waiting.

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Minimum-interval gate for outbound requests
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum time between two permitted requests
    interval: Duration,

    /// When the last request was let through
    last_request_time: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `interval` between requests
    ///
    /// A zero interval disables waiting, which tests rely on.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request_time: Mutex::new(None),
        }
    }

    /// Creates a limiter from a delay in (fractional) seconds
    ///
    /// Negative or non-finite values are treated as zero.
    pub fn from_secs_f64(timer: f64) -> Self {
        let interval = if timer.is_finite() && timer > 0.0 {
            Duration::from_secs_f64(timer)
        } else {
            Duration::ZERO
        };
        Self::new(interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until at least `interval` has passed since the last permitted call
    pub async fn wait(&self) {
        let mut last = self.last_request_time.lock().await;

        if let Some(wait) = time_until_next_request(*last, self.interval, Instant::now()) {
            tracing::trace!("Rate limiter sleeping for {:?}", wait);
            tokio::time::sleep(wait).await;
        }

        *last = Some(Instant::now());
    }
}

/// Returns how long to wait before the next request, or None if it may go now
fn time_until_next_request(
    last: Option<Instant>,
    interval: Duration,
    now: Instant,
) -> Option<Duration> {
    let last = last?;
    let elapsed = now.duration_since(last);
    if elapsed < interval {
        Some(interval - elapsed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_request_is_immediate() {
        assert_eq!(
            time_until_next_request(None, Duration::from_secs(3), Instant::now()),
            None
        );
    }

    #[test]
    fn test_wait_is_remaining_interval() {
        let now = Instant::now();
        let last = now - Duration::from_millis(1000);
        let wait = time_until_next_request(Some(last), Duration::from_millis(3000), now).unwrap();
        assert_eq!(wait, Duration::from_millis(2000));
    }

    #[test]
    fn test_no_wait_after_interval() {
        let now = Instant::now();
        let last = now - Duration::from_secs(5);
        assert_eq!(
            time_until_next_request(Some(last), Duration::from_secs(3), now),
            None
        );
    }

    #[test]
    fn test_from_secs_f64_clamps() {
        assert_eq!(RateLimiter::from_secs_f64(-1.0).interval(), Duration::ZERO);
        assert_eq!(RateLimiter::from_secs_f64(f64::NAN).interval(), Duration::ZERO);
        assert_eq!(
            RateLimiter::from_secs_f64(0.25).interval(),
            Duration::from_millis(250)
        );
    }

    #[tokio::test]
    async fn test_zero_interval_never_sleeps() {
        let limiter = RateLimiter::new(Duration::ZERO);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.wait().await;
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_spaced() {
        let limiter = Arc::new(RateLimiter::new(Duration::from_millis(30)));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move { limiter.wait().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // First call passes immediately, the other three wait one interval each
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
