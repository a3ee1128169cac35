use crate::client::ReconnectOptions;
use rand::Rng;
use std::time::Duration;

/// Reconnect delay generator with exponential growth, a ceiling and symmetric jitter.
///
/// The delay for attempt `n` is `min_delay × factor^n`, clamped to `max_delay`, then moved by
/// a uniform offset in `[-jitter × base, +jitter × base]` and floored at zero. Each call to
/// [`Backoff::next_delay`] advances the attempt counter.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempts: u32,
    min_delay: Duration,
    max_delay: Duration,
    factor: f64,
    jitter: f64,
}

impl Backoff {
    pub fn new(min_delay: Duration, max_delay: Duration, factor: f64, jitter: f64) -> Self {
        Self {
            attempts: 0,
            min_delay,
            max_delay,
            factor,
            jitter,
        }
    }

    pub fn from_options(options: &ReconnectOptions) -> Self {
        Self::new(
            options.min_delay,
            options.max_delay,
            options.factor,
            options.jitter,
        )
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = self.base_delay_ms(self.attempts);
        let spread = base_ms * self.jitter;
        let offset = if spread > 0.0 {
            rand::rng().random_range(-spread..=spread)
        } else {
            0.0
        };

        self.attempts = self.attempts.saturating_add(1);
        // Values beyond what a Duration can hold saturate at the ceiling
        let delay_secs = (base_ms + offset).max(0.0) / 1000.0;
        Duration::try_from_secs_f64(delay_secs).unwrap_or(self.max_delay)
    }

    /// Un-jittered delay for `attempt`, in milliseconds
    pub fn base_delay_ms(&self, attempt: u32) -> f64 {
        let max_ms = self.max_delay.as_secs_f64() * 1000.0;
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let unclamped = self.min_delay.as_secs_f64() * 1000.0 * self.factor.powi(exponent);

        if !unclamped.is_finite() || unclamped > max_ms {
            max_ms
        } else {
            unclamped.max(0.0)
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Reset the attempt counter
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_options(&ReconnectOptions::default())
    }
}
