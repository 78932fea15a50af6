//! Delivery metrics for observability
//!
//! Counts delivery outcomes through a decorator and keeps an exponentially
//! smoothed average of successful response times.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Weight of the newest sample in the smoothed response time
pub const RESPONSE_TIME_SMOOTHING: f64 = 0.1;

/// Delivery counters
///
/// # Example
///
/// ```
/// use relay_logger::DeliveryMetrics;
/// use std::time::Duration;
///
/// let metrics = DeliveryMetrics::new();
///
/// metrics.record_success(Duration::from_millis(10));
/// metrics.record_failure();
///
/// assert_eq!(metrics.total_requests(), 2);
/// assert_eq!(metrics.failed_requests(), 1);
/// ```
#[derive(Debug)]
pub struct DeliveryMetrics {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    /// Smoothed response time in microseconds, stored as `f64` bits
    average_response_micros: AtomicU64,
}

impl DeliveryMetrics {
    pub const fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            average_response_micros: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn successful_requests(&self) -> u64 {
        self.successful_requests.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn failed_requests(&self) -> u64 {
        self.failed_requests.load(Ordering::Relaxed)
    }

    pub fn average_response_time(&self) -> Duration {
        let micros = f64::from_bits(self.average_response_micros.load(Ordering::Relaxed));
        Duration::from_secs_f64(micros.max(0.0) / 1_000_000.0)
    }

    /// Record a successful delivery that took `elapsed`.
    ///
    /// The first sample seeds the average; later samples are blended in with
    /// weight [`RESPONSE_TIME_SMOOTHING`].
    pub fn record_success(&self, elapsed: Duration) {
        let first = self.successful_requests.fetch_add(1, Ordering::Relaxed) == 0;
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let sample = elapsed.as_secs_f64() * 1_000_000.0;
        let _ = self
            .average_response_micros
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let current = f64::from_bits(bits);
                let next = if first {
                    sample
                } else {
                    current * (1.0 - RESPONSE_TIME_SMOOTHING) + sample * RESPONSE_TIME_SMOOTHING
                };
                Some(next.to_bits())
            });
    }

    pub fn record_failure(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Failure rate as a percentage (0.0 - 100.0)
    ///
    /// Returns 0.0 if nothing has been delivered.
    pub fn failure_rate(&self) -> f64 {
        let total = self.total_requests() as f64;
        if total == 0.0 {
            0.0
        } else {
            (self.failed_requests() as f64 / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.average_response_micros.store(0, Ordering::Relaxed);
    }
}

impl Default for DeliveryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DeliveryMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            total_requests: AtomicU64::new(self.total_requests()),
            successful_requests: AtomicU64::new(self.successful_requests()),
            failed_requests: AtomicU64::new(self.failed_requests()),
            average_response_micros: AtomicU64::new(
                self.average_response_micros.load(Ordering::Relaxed),
            ),
        }
    }
}
