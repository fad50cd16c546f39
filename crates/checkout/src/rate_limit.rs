//! Per-user sliding-window rate limiting for checkout attempts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::UserId;
use inventory::{Clock, SystemClock};

/// Default number of checkout attempts allowed per window.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Counts attempts per user over a sliding window.
///
/// State lives in process memory, so each API replica limits independently.
#[derive(Clone)]
pub struct RateLimiter {
    max_attempts: u32,
    window: chrono::Duration,
    clock: Arc<dyn Clock>,
    attempts: Arc<Mutex<Attempts>>,
}

#[derive(Default)]
struct Attempts {
    by_user: HashMap<UserId, VecDeque<DateTime<Utc>>>,
    last_sweep: Option<DateTime<Utc>>,
}

impl Attempts {
    /// Drops users with no attempt inside the window, at most once per window.
    fn sweep(&mut self, now: DateTime<Utc>, window: chrono::Duration) {
        if self.last_sweep.is_some_and(|last| now - last < window) {
            return;
        }
        let window_start = now - window;
        self.by_user
            .retain(|_, timestamps| timestamps.back().is_some_and(|t| *t > window_start));
        self.last_sweep = Some(now);
    }
}

impl RateLimiter {
    /// Windows too large to represent fall back to [`DEFAULT_WINDOW`].
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        let window = chrono::Duration::from_std(window)
            .or_else(|_| chrono::Duration::from_std(DEFAULT_WINDOW))
            .unwrap_or_else(|_| chrono::Duration::seconds(60));
        Self {
            max_attempts: max_attempts.max(1),
            window,
            clock: Arc::new(SystemClock),
            attempts: Arc::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Records an attempt for `user_id`.
    ///
    /// Returns `Err(retry_after)` without recording when the user already used
    /// every attempt of the current window.
    pub fn check_and_record(&self, user_id: UserId) -> Result<(), Duration> {
        let now = self.clock.now();
        let window = self.window;
        let window_start = now - window;

        let mut attempts = self
            .attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        attempts.sweep(now, window);
        let timestamps = attempts.by_user.entry(user_id).or_default();
        while timestamps.front().is_some_and(|t| *t <= window_start) {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_attempts as usize {
            let oldest = timestamps.front().copied().unwrap_or(now);
            let retry_after = (oldest + window - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .max(Duration::from_secs(1));
            tracing::warn!(
                user_id = %user_id,
                attempts = timestamps.len(),
                max_attempts = self.max_attempts,
                "Checkout rate limit exceeded"
            );
            return Err(retry_after);
        }

        timestamps.push_back(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inventory::ManualClock;

    #[test]
    fn test_limits_per_user_and_window_slides() {
        let clock = ManualClock::default();
        let limiter = RateLimiter::new(2, Duration::from_secs(60)).with_clock(Arc::new(clock.clone()));
        let alice = UserId::new();
        let bob = UserId::new();

        assert!(limiter.check_and_record(alice).is_ok());
        clock.advance(chrono::Duration::seconds(10));
        assert!(limiter.check_and_record(alice).is_ok());

        let retry_after = limiter.check_and_record(alice).unwrap_err();
        assert_eq!(retry_after, Duration::from_secs(50));
        assert!(limiter.check_and_record(bob).is_ok());

        // The first attempt leaves the window.
        clock.advance(chrono::Duration::seconds(51));
        assert!(limiter.check_and_record(alice).is_ok());
        assert!(limiter.check_and_record(alice).is_err());
    }

    #[test]
    fn test_rejected_attempts_are_not_recorded() {
        let clock = ManualClock::default();
        let limiter = RateLimiter::new(1, Duration::from_secs(60)).with_clock(Arc::new(clock.clone()));
        let user = UserId::new();

        assert!(limiter.check_and_record(user).is_ok());
        for _ in 0..5 {
            assert!(limiter.check_and_record(user).is_err());
        }
        clock.advance(chrono::Duration::seconds(61));
        assert!(limiter.check_and_record(user).is_ok());
    }

    #[test]
    fn test_idle_users_are_forgotten() {
        let clock = ManualClock::default();
        let limiter = RateLimiter::new(5, Duration::from_secs(60)).with_clock(Arc::new(clock.clone()));
        for _ in 0..1_000 {
            assert!(limiter.check_and_record(UserId::new()).is_ok());
        }

        clock.advance(chrono::Duration::hours(24));
        let newcomer = UserId::new();
        assert!(limiter.check_and_record(newcomer).is_ok());

        let attempts = limiter.attempts.lock().unwrap();
        assert_eq!(attempts.by_user.len(), 1);
        assert!(attempts.by_user.contains_key(&newcomer));
    }
}
