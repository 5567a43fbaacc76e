//! Reconnection backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff used between reconnection attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first reconnection attempt.
    pub base_delay: Duration,
    /// Upper bound on any delay.
    pub max_delay: Duration,
    /// Fraction of the delay that may be added or subtracted at random.
    pub randomization_factor: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { base_delay: Duration::from_secs(2), max_delay: Duration::from_secs(10), randomization_factor: 0.5 }
    }
}

impl Backoff {
    /// Create a new backoff policy.
    pub fn new(base_delay: Duration, max_delay: Duration, randomization_factor: f64) -> Self {
        Self { base_delay, max_delay, randomization_factor: randomization_factor.clamp(0.0, 1.0) }
    }

    /// Delay before reconnection attempt `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_with_sample(attempt, rand::thread_rng().r#gen::<f64>())
    }

    /// Delay for a given uniform sample in `[0, 1)`.
    ///
    /// `base * 2^attempt`, then the jitter `floor(sample * factor * delay)` is
    /// subtracted when `floor(sample * 10)` is even and added otherwise, then
    /// capped at `max_delay`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let mut ms = self.base_delay.as_millis() as f64 * 2f64.powi(exponent);
        if self.randomization_factor > 0.0 {
            let deviation = (sample * self.randomization_factor * ms).floor();
            if ((sample * 10.0).floor() as u64) & 1 == 0 {
                ms -= deviation;
            } else {
                ms += deviation;
            }
        }
        let capped = ms.min(self.max_delay.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}
