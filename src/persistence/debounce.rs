//! Quiet-period debouncing.
//!
//! The timer is driven by the caller's clock so it can be polled once per UI
//! frame and tested with synthetic instants.

use std::time::{Duration, Instant};

/// Defers an action until `quiet` has elapsed since the last [`touch`](Self::touch).
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    /// Creates an idle debouncer with the given quiet period.
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            deadline: None,
        }
    }

    /// The configured quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    /// Restarts the timer from `now`.
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet);
    }

    /// Cancels a pending timer.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Whether a timer is running.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the timer fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Whether the timer is armed and its deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Time left until the deadline, or `None` when idle.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(1000);

    #[test]
    fn idle_debouncer_is_never_due() {
        let d = Debouncer::new(QUIET);
        let now = Instant::now();
        assert!(!d.is_armed());
        assert!(!d.is_due(now + QUIET * 10));
        assert_eq!(d.remaining(now), None);
    }

    #[test]
    fn touch_restarts_the_quiet_period() {
        let mut d = Debouncer::new(QUIET);
        let t0 = Instant::now();
        d.touch(t0);
        d.touch(t0 + Duration::from_millis(800));
        assert!(!d.is_due(t0 + Duration::from_millis(1200)));
        assert!(d.is_due(t0 + Duration::from_millis(1800)));
    }

    #[test]
    fn cancel_disarms() {
        let mut d = Debouncer::new(QUIET);
        let t0 = Instant::now();
        d.touch(t0);
        d.cancel();
        assert!(!d.is_due(t0 + QUIET));
    }

    #[test]
    fn remaining_saturates_at_zero() {
        let mut d = Debouncer::new(QUIET);
        let t0 = Instant::now();
        d.touch(t0);
        assert_eq!(d.remaining(t0 + Duration::from_millis(400)), Some(Duration::from_millis(600)));
        assert_eq!(d.remaining(t0 + QUIET * 2), Some(Duration::ZERO));
    }
}
