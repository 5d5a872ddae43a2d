//! Reconnect backoff policy.
//!
//! Delays double from a floor up to a ceiling; the number of attempts is
//! capped. With the defaults the schedule is 1s, 2s, 4s, 8s, 16s and then
//! nothing further.

use std::time::Duration;

/// Default first reconnect delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default delay ceiling in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
/// Default maximum number of reconnect attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Exponential delay for a zero-based `attempt`: `min(max, base * 2^attempt)`.
#[must_use]
pub fn calculate_backoff_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> u64 {
    base_delay_ms
        .saturating_mul(1u64 << attempt.min(31))
        .min(max_delay_ms)
}

/// Stateful reconnect schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            DEFAULT_MAX_ATTEMPTS,
        )
    }
}

impl Backoff {
    /// Create a schedule with the given floor, ceiling, and attempt cap.
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max,
            max_attempts,
            attempts: 0,
        }
    }

    /// Attempts consumed since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Configured attempt cap.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether no further attempt may be scheduled.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// The delay [`Self::next_delay`] would return, without consuming it.
    pub fn peek(&self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        let ms = calculate_backoff_delay(
            self.attempts,
            u64::try_from(self.base.as_millis()).unwrap_or(u64::MAX),
            u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX),
        );
        Some(Duration::from_millis(ms))
    }

    /// Consume one attempt and return its delay, or `None` once the cap is hit.
    pub fn next_delay(&mut self) -> Option<Duration> {
        let delay = self.peek()?;
        self.attempts += 1;
        Some(delay)
    }

    /// Back to the floor with a full attempt budget.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_from_floor() {
        assert_eq!(calculate_backoff_delay(0, 1000, 30_000), 1000);
        assert_eq!(calculate_backoff_delay(1, 1000, 30_000), 2000);
        assert_eq!(calculate_backoff_delay(4, 1000, 30_000), 16_000);
    }

    #[test]
    fn delay_caps_at_ceiling() {
        assert_eq!(calculate_backoff_delay(5, 1000, 30_000), 30_000);
        assert_eq!(calculate_backoff_delay(40, 1000, 30_000), 30_000);
    }

    #[test]
    fn default_schedule_then_exhausted() {
        let mut backoff = Backoff::default();
        let delays: Vec<u128> = std::iter::from_fn(|| backoff.next_delay())
            .map(|d| d.as_millis())
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000]);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.attempts(), 5);
    }

    #[test]
    fn ceiling_applies_with_more_attempts() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 8);
        let last = std::iter::from_fn(|| backoff.next_delay()).last().unwrap();
        assert_eq!(last, Duration::from_secs(30));
    }

    #[test]
    fn reset_restores_floor() {
        let mut backoff = Backoff::default();
        let _ = backoff.next_delay();
        let _ = backoff.next_delay();
        assert_eq!(backoff.peek(), Some(Duration::from_secs(4)));
        backoff.reset();
        assert_eq!(backoff.attempts(), 0);
        assert_eq!(backoff.peek(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn zero_attempts_never_schedules() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 0);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.next_delay(), None);
    }
}
