//! Exponential backoff without a retry ceiling.

use std::time::Duration;

/// Delay schedule between reconnect attempts.
///
/// The first failure waits `initial`; every further consecutive failure
/// multiplies the delay by `multiplier`. There is no cap on the number of
/// retries. Delays saturate at `Duration::MAX` instead of overflowing.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    initial: Duration,
    multiplier: f64,
    next: Duration,
}

impl Backoff {
    /// Create a schedule. Multipliers below 1.0 are treated as 1.0.
    pub fn new(initial: Duration, multiplier: f64) -> Self {
        let multiplier = if multiplier.is_finite() && multiplier >= 1.0 {
            multiplier
        } else {
            1.0
        };
        Self {
            initial,
            multiplier,
            next: initial,
        }
    }

    /// Delay to wait after the current failure; advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = Duration::try_from_secs_f64(delay.as_secs_f64() * self.multiplier)
            .unwrap_or(Duration::MAX);
        delay
    }

    /// Forget previous failures after a successful connection.
    pub fn reset(&mut self) {
        self.next = self.initial;
    }

    pub fn initial(&self) -> Duration {
        self.initial
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000), 2.0)
    }
}
