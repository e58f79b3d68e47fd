//! Monotonic time source and deadline arithmetic.
//!
//! Everything reads `tokio::time::Instant` so that a paused test runtime
//! drives timers and deadlines from the same clock.

use std::time::Duration;
use tokio::time::Instant;

/// Roughly thirty years; used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Source of "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by tokio's time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// An absolute point in time after which work should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// Deadline `timeout` from the clock's current time.
    pub fn after<C: Clock + ?Sized>(clock: &C, timeout: Duration) -> Self {
        let now = clock.now();
        let at = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        Self { at }
    }

    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before the deadline, saturating at zero.
    pub fn time_left<C: Clock + ?Sized>(&self, clock: &C) -> Duration {
        self.at.saturating_duration_since(clock.now())
    }

    pub fn is_overdue<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        clock.now() >= self.at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test(start_paused = true)]
    async fn time_left_shrinks_with_the_clock() {
        let clock = TokioClock;
        let deadline = Deadline::after(&clock, Duration::from_secs(2));

        assert_eq!(deadline.time_left(&clock), Duration::from_secs(2));
        assert!(!deadline.is_overdue(&clock));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(deadline.time_left(&clock), Duration::from_millis(500));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(deadline.time_left(&clock), Duration::ZERO);
        assert!(deadline.is_overdue(&clock));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_timeouts_do_not_overflow() {
        let clock = TokioClock;
        let deadline = Deadline::after(&clock, Duration::MAX);

        assert!(deadline.time_left(&clock) >= FAR_FUTURE);
    }
}
