//! Circuit breaking without retries
//!
//! [`CircuitBreakerTransport`] makes one delivery per call. Failures count
//! toward `threshold`; a success only decays the counter, so a transport that
//! keeps failing intermittently still trips eventually. While open, calls fail
//! fast with [`LoggerError::CircuitOpen`] and are not counted.

use crate::core::circuit_breaker::{Admission, CircuitBreaker, CircuitState, DecayPolicy, Transition};
use crate::core::error::panic_message;
use crate::core::metrics::DeliveryMetrics;
use crate::core::transport::{deliver, SharedTransport, Transport};
use crate::core::{Formatter, LogRecord, LoggerError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Share of the failure counter kept after a success
pub const FAILURE_DECAY: f64 = 0.9;

pub type StateChangeHook = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;
pub type TripHook = Arc<dyn Fn(u32) + Send + Sync>;
pub type ResetHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct CircuitBreakerOptions {
    pub threshold: u32,
    /// How long the breaker stays open before admitting a trial
    pub timeout: Duration,
    /// Fully reset (state and metrics) this long after a trip
    pub reset_timeout: Option<Duration>,
    pub on_state_change: Option<StateChangeHook>,
    /// Called with the failure count when the breaker opens
    pub on_trip: Option<TripHook>,
    /// Called when the breaker closes again
    pub on_reset: Option<ResetHook>,
}

impl Default for CircuitBreakerOptions {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout: Duration::from_millis(60_000),
            reset_timeout: None,
            on_state_change: None,
            on_trip: None,
            on_reset: None,
        }
    }
}

impl std::fmt::Debug for CircuitBreakerOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerOptions")
            .field("threshold", &self.threshold)
            .field("timeout", &self.timeout)
            .field("reset_timeout", &self.reset_timeout)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a breaker's counters
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub current_state: CircuitState,
    pub average_response_time: Duration,
}

pub struct CircuitBreakerTransport {
    inner: SharedTransport,
    name: String,
    options: CircuitBreakerOptions,
    breaker: Mutex<CircuitBreaker>,
    metrics: DeliveryMetrics,
}

impl CircuitBreakerTransport {
    pub fn new(inner: SharedTransport, options: CircuitBreakerOptions) -> Self {
        let breaker = CircuitBreaker::new(
            options.threshold,
            options.timeout,
            DecayPolicy::Multiplicative {
                factor: FAILURE_DECAY,
            },
        );
        Self {
            name: format!("circuit_breaker({})", inner.name()),
            inner,
            options,
            breaker: Mutex::new(breaker),
            metrics: DeliveryMetrics::new(),
        }
    }

    pub fn metrics(&self) -> CircuitBreakerMetrics {
        CircuitBreakerMetrics {
            total_requests: self.metrics.total_requests(),
            successful_requests: self.metrics.successful_requests(),
            failed_requests: self.metrics.failed_requests(),
            current_state: self.state(),
            average_response_time: self.metrics.average_response_time(),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.breaker.lock().state()
    }

    pub fn failure_count(&self) -> u32 {
        self.breaker.lock().failures()
    }

    pub fn options(&self) -> &CircuitBreakerOptions {
        &self.options
    }

    pub fn inner(&self) -> &SharedTransport {
        &self.inner
    }

    /// Restore a fresh closed breaker and zeroed metrics
    pub fn reset(&self) {
        let transition = self.breaker.lock().reset();
        self.metrics.reset();
        self.notify(transition);
    }

    fn reset_timeout_elapsed(&self) -> bool {
        let Some(reset_timeout) = self.options.reset_timeout else {
            return false;
        };
        let breaker = self.breaker.lock();
        breaker.state() != CircuitState::Closed
            && breaker
                .opened_at()
                .map_or(false, |at| at.elapsed() >= reset_timeout)
    }

    fn admit(&self) -> Result<Permit<'_>> {
        if self.reset_timeout_elapsed() {
            tracing::debug!(transport = %self.name, "circuit breaker reset timeout elapsed");
            self.reset();
        }
        let (admission, transition) = self.breaker.lock().acquire();
        self.notify(transition);
        match admission {
            Some(admission) => Ok(Permit {
                transport: self,
                trial: admission == Admission::Trial,
                started: Instant::now(),
            }),
            None => Err(LoggerError::circuit_open(self.inner.name())),
        }
    }

    fn complete(&self, result: &Result<()>, started: Instant) {
        if let Err(LoggerError::Panicked(msg)) = result {
            tracing::error!(transport = %self.name, panic = %msg, "wrapped transport panicked");
        }
        let transition = match result {
            Ok(()) => {
                self.metrics.record_success(started.elapsed());
                self.breaker.lock().record_success()
            }
            Err(_) => {
                self.metrics.record_failure();
                self.breaker.lock().record_failure()
            }
        };
        self.notify(transition);
    }

    fn notify(&self, transition: Option<Transition>) {
        let Some(Transition { from, to }) = transition else {
            return;
        };
        if let Some(hook) = &self.options.on_state_change {
            hook(from, to);
        }
        match to {
            CircuitState::Open => {
                let failures = self.failure_count();
                tracing::warn!(transport = %self.name, failures, "circuit breaker tripped");
                if let Some(hook) = &self.options.on_trip {
                    hook(failures);
                }
            }
            CircuitState::Closed => {
                if let Some(hook) = &self.options.on_reset {
                    hook();
                }
            }
            CircuitState::HalfOpen => {}
        }
    }
}

/// One admitted call.
///
/// A half-open trial that is dropped before [`Permit::finish`] (a cancelled
/// future, an unwinding panic) is handed back so a later call gets another trial.
struct Permit<'a> {
    transport: &'a CircuitBreakerTransport,
    trial: bool,
    started: Instant,
}

impl Permit<'_> {
    fn finish(mut self, result: &Result<()>) {
        self.trial = false;
        self.transport.complete(result, self.started);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial {
            tracing::debug!(transport = %self.transport.name, "circuit breaker trial abandoned");
            let transition = self.transport.breaker.lock().abandon_trial();
            self.transport.notify(transition);
        }
    }
}

#[async_trait]
impl Transport for CircuitBreakerTransport {
    fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let permit = self.admit()?;
        let result = catch_unwind(AssertUnwindSafe(|| self.inner.write(record, formatter)))
            .unwrap_or_else(|panic| Err(LoggerError::Panicked(panic_message(panic.as_ref()))));
        permit.finish(&result);
        result
    }

    fn supports_async(&self) -> bool {
        self.inner.supports_async()
    }

    async fn write_async(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let permit = self.admit()?;
        let result = deliver(self.inner.as_ref(), record, formatter).await;
        permit.finish(&result);
        result
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Level;
    use crate::transports::MemoryTransport;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn record() -> LogRecord {
        LogRecord::new(Level::WARN, "disk almost full")
    }

    fn options(threshold: u32, timeout_ms: u64) -> CircuitBreakerOptions {
        CircuitBreakerOptions {
            threshold,
            timeout: Duration::from_millis(timeout_ms),
            ..CircuitBreakerOptions::default()
        }
    }

    #[test]
    fn test_trips_and_fails_fast() {
        let trips = Arc::new(AtomicU32::new(0));
        let t = trips.clone();
        let inner = Arc::new(MemoryTransport::new().failing(Some("ECONNREFUSED"), "refused"));
        let transport = CircuitBreakerTransport::new(
            inner.clone(),
            CircuitBreakerOptions {
                on_trip: Some(Arc::new(move |failures| {
                    t.store(failures, Ordering::SeqCst);
                })),
                ..options(2, 60_000)
            },
        );

        assert!(transport.write(&record(), &Formatter::plain()).is_err());
        assert!(transport.write(&record(), &Formatter::plain()).is_err());
        assert_eq!(transport.state(), CircuitState::Open);
        assert_eq!(trips.load(Ordering::SeqCst), 2);

        let err = transport.write(&record(), &Formatter::plain()).unwrap_err();
        assert!(err.is_circuit_open());
        assert_eq!(inner.attempts(), 2);

        let metrics = transport.metrics();
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.failed_requests, 2);
        assert_eq!(metrics.current_state, CircuitState::Open);
    }

    #[test]
    fn test_success_decays_failure_count() {
        let inner = Arc::new(MemoryTransport::new().failing_times(4, Some("ETIMEDOUT"), "slow"));
        let transport = CircuitBreakerTransport::new(inner, options(10, 60_000));

        for _ in 0..4 {
            assert!(transport.write(&record(), &Formatter::plain()).is_err());
        }
        assert_eq!(transport.failure_count(), 4);

        transport.write(&record(), &Formatter::plain()).unwrap();
        assert_eq!(transport.failure_count(), 3);
        transport.write(&record(), &Formatter::plain()).unwrap();
        assert_eq!(transport.failure_count(), 2);
        transport.write(&record(), &Formatter::plain()).unwrap();
        assert_eq!(transport.failure_count(), 1);
        transport.write(&record(), &Formatter::plain()).unwrap();
        assert_eq!(transport.failure_count(), 1);
    }

    #[test]
    fn test_trial_closes_after_timeout() {
        let changes = Arc::new(Mutex::new(Vec::new()));
        let c = changes.clone();
        let inner = Arc::new(MemoryTransport::new().failing(None, "down"));
        let transport = CircuitBreakerTransport::new(
            inner.clone(),
            CircuitBreakerOptions {
                on_state_change: Some(Arc::new(move |from, to| c.lock().push((from, to)))),
                ..options(1, 20)
            },
        );

        assert!(transport.write(&record(), &Formatter::plain()).is_err());
        std::thread::sleep(Duration::from_millis(30));
        inner.heal();
        transport.write(&record(), &Formatter::plain()).unwrap();

        assert_eq!(transport.state(), CircuitState::Closed);
        assert_eq!(
            *changes.lock(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[test]
    fn test_reset_restores_state_and_metrics() {
        let resets = Arc::new(AtomicU32::new(0));
        let r = resets.clone();
        let inner = Arc::new(MemoryTransport::new().failing(None, "down"));
        let transport = CircuitBreakerTransport::new(
            inner,
            CircuitBreakerOptions {
                on_reset: Some(Arc::new(move || {
                    r.fetch_add(1, Ordering::SeqCst);
                })),
                ..options(1, 60_000)
            },
        );

        assert!(transport.write(&record(), &Formatter::plain()).is_err());
        transport.reset();

        assert_eq!(resets.load(Ordering::SeqCst), 1);
        let metrics = transport.metrics();
        assert_eq!(metrics.total_requests, 0);
        assert_eq!(metrics.current_state, CircuitState::Closed);
        assert_eq!(transport.failure_count(), 0);
    }

    #[test]
    fn test_reset_timeout_checked_on_next_call() {
        let inner = Arc::new(MemoryTransport::new().failing_times(1, None, "blip"));
        let transport = CircuitBreakerTransport::new(
            inner.clone(),
            CircuitBreakerOptions {
                reset_timeout: Some(Duration::from_millis(10)),
                ..options(1, 60_000)
            },
        );

        assert!(transport.write(&record(), &Formatter::plain()).is_err());
        assert_eq!(transport.state(), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(20));

        transport.write(&record(), &Formatter::plain()).unwrap();
        assert_eq!(transport.state(), CircuitState::Closed);
        let metrics = transport.metrics();
        assert_eq!(metrics.total_requests, 1);
        assert_eq!(metrics.successful_requests, 1);
    }

    #[tokio::test]
    async fn test_async_path_tracks_response_time() {
        let inner = Arc::new(MemoryTransport::new().with_async(Duration::from_millis(5)));
        let transport = CircuitBreakerTransport::new(inner.clone(), options(3, 60_000));
        assert!(transport.supports_async());

        transport.write_async(&record(), &Formatter::plain()).await.unwrap();
        let metrics = transport.metrics();
        assert_eq!(metrics.successful_requests, 1);
        assert!(metrics.average_response_time >= Duration::from_millis(5));
        assert_eq!(inner.len(), 1);
    }

    /// Fails once, panics once, then succeeds
    struct PanicsOnTrial {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for PanicsOnTrial {
        fn write(&self, _record: &LogRecord, _formatter: &Formatter) -> Result<()> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(LoggerError::delivery("ECONNREFUSED", "refused")),
                1 => panic!("sink bug"),
                _ => Ok(()),
            }
        }

        fn name(&self) -> &str {
            "panic_once"
        }
    }

    #[test]
    fn test_panicking_trial_reopens_and_recovers() {
        let inner = Arc::new(PanicsOnTrial {
            calls: AtomicU32::new(0),
        });
        let transport = CircuitBreakerTransport::new(inner.clone(), options(1, 20));

        assert!(transport.write(&record(), &Formatter::plain()).is_err());
        assert_eq!(transport.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(30));
        let err = transport.write(&record(), &Formatter::plain()).unwrap_err();
        assert!(matches!(err, LoggerError::Panicked(ref msg) if msg == "sink bug"));
        assert_eq!(transport.state(), CircuitState::Open);
        assert_eq!(transport.metrics().failed_requests, 2);

        std::thread::sleep(Duration::from_millis(30));
        transport.write(&record(), &Formatter::plain()).unwrap();
        assert_eq!(transport.state(), CircuitState::Closed);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancelled_trial_is_released() {
        let inner = Arc::new(
            MemoryTransport::new()
                .with_async(Duration::from_millis(200))
                .failing(Some("EAUTH"), "denied"),
        );
        let transport = CircuitBreakerTransport::new(inner.clone(), options(1, 20));

        assert!(transport.write_async(&record(), &Formatter::plain()).await.is_err());
        assert_eq!(transport.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            transport.write_async(&record(), &Formatter::plain()),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(transport.state(), CircuitState::Open);

        inner.heal();
        tokio::time::sleep(Duration::from_millis(30)).await;
        transport.write_async(&record(), &Formatter::plain()).await.unwrap();
        assert_eq!(transport.state(), CircuitState::Closed);
        assert_eq!(inner.len(), 1);
    }
}
