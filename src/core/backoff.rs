//! Exponential backoff with symmetric jitter

use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// Fraction of the delay added or removed at random (0.25 means ±25%)
    pub jitter: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            base,
            max,
            multiplier,
            jitter: 0.0,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction;
        self
    }

    /// `min(base * multiplier^(attempt - 1), max)`, attempts counted from 1
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base.as_secs_f64() * self.multiplier.powi(exponent);
        let max = self.max.as_secs_f64();
        if !secs.is_finite() || secs >= max {
            return self.max;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Delay before retry number `attempt`, with jitter applied
    pub fn delay(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        if self.jitter <= 0.0 {
            return raw;
        }
        let secs = raw.as_secs_f64();
        let offset = secs * self.jitter * rand::thread_rng().gen_range(-1.0..=1.0);
        let jittered = secs + offset;
        if !jittered.is_finite() || jittered <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(jittered)
    }
}
