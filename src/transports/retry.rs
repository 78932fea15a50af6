//! Retry with exponential backoff and circuit breaking
//!
//! [`RetryTransport`] wraps one transport. Each delivery is attempted up to
//! `max_attempts` times while the error stays retryable; a call that exhausts
//! its attempts counts as one breaker failure. Once `circuit_breaker_threshold`
//! calls in a row have failed, the breaker opens and calls fail fast until
//! `circuit_breaker_timeout` has passed, after which a single trial attempt
//! decides whether to close it again.
//!
//! # Example
//!
//! ```no_run
//! use relay_logger::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> relay_logger::Result<()> {
//! let transport = RetryTransport::new(
//!     Arc::new(MemoryTransport::new()),
//!     RetryOptions {
//!         max_attempts: 5,
//!         base_delay: Duration::from_millis(100),
//!         ..RetryOptions::default()
//!     },
//! )
//! .on_retry_attempt(Arc::new(|attempt, error, delay| {
//!     eprintln!("attempt {} failed ({}); retrying in {:?}", attempt, error, delay);
//! }));
//!
//! transport
//!     .write_async(&LogRecord::new(Level::INFO, "hello"), &Formatter::plain())
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::core::backoff::Backoff;
use crate::core::circuit_breaker::{Admission, CircuitBreaker, CircuitState, DecayPolicy, Transition};
use crate::core::dispatcher::Dispatcher;
use crate::core::event::{ErrorEvent, ErrorKind, ErrorListener, ErrorSink};
use crate::core::transport::{deliver, SharedTransport, Transport};
use crate::core::{Formatter, LogRecord, LoggerError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Jitter applied to retry delays (±25%)
pub const RETRY_JITTER: f64 = 0.25;

pub const DEFAULT_RETRYABLE_CODES: [&str; 10] = [
    "ECONNRESET",
    "ECONNREFUSED",
    "ETIMEDOUT",
    "ENOTFOUND",
    "EAI_AGAIN",
    "EHOSTUNREACH",
    "ENETUNREACH",
    "ENOENT",
    "EMFILE",
    "ENFILE",
];

pub const DEFAULT_RETRYABLE_PATTERNS: [&str; 8] = [
    "timeout",
    "network",
    "connection",
    "temporary",
    "rate limit",
    "too many requests",
    "service unavailable",
    "bad gateway",
];

/// Compile a case-insensitive message pattern
pub fn retry_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| LoggerError::config("RetryOptions", format!("invalid pattern '{}': {}", pattern, e)))
}

#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Hard ceiling on deliveries per call
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    pub retryable_codes: HashSet<String>,
    pub retryable_patterns: Vec<Regex>,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_timeout: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter: true,
            retryable_codes: DEFAULT_RETRYABLE_CODES.iter().map(|c| c.to_string()).collect(),
            retryable_patterns: DEFAULT_RETRYABLE_PATTERNS
                .iter()
                .filter_map(|p| retry_pattern(p).ok())
                .collect(),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_millis(60_000),
        }
    }
}

impl RetryOptions {
    /// Add a retryable message pattern
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        self.retryable_patterns.push(retry_pattern(pattern)?);
        Ok(self)
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.retryable_codes.insert(code.into());
        self
    }

    /// Whether a failed attempt may be retried
    pub fn is_retryable(&self, error: &LoggerError) -> bool {
        if let Some(code) = error.code() {
            if self.retryable_codes.contains(code) {
                return true;
            }
        }
        let message = error.to_string();
        self.retryable_patterns.iter().any(|p| p.is_match(&message))
    }

    fn backoff(&self) -> Backoff {
        let backoff = Backoff::new(self.base_delay, self.max_delay, self.backoff_multiplier);
        if self.jitter {
            backoff.with_jitter(RETRY_JITTER)
        } else {
            backoff
        }
    }
}

pub type RetryAttemptHook = Arc<dyn Fn(u32, &LoggerError, Duration) + Send + Sync>;
pub type RetryExhaustedHook = Arc<dyn Fn(&LoggerError, u32) + Send + Sync>;
pub type CircuitHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone, Default)]
pub struct RetryHooks {
    /// Called before sleeping: failed attempt number, its error, the delay
    pub on_retry_attempt: Option<RetryAttemptHook>,
    /// Called when a call gives up: last error, attempts made
    pub on_retry_exhausted: Option<RetryExhaustedHook>,
    pub on_circuit_open: Option<CircuitHook>,
    pub on_circuit_close: Option<CircuitHook>,
}

struct RetryShared {
    inner: SharedTransport,
    name: String,
    options: RetryOptions,
    backoff: Backoff,
    breaker: Mutex<CircuitBreaker>,
}

impl RetryShared {
    fn notify(&self, hooks: &RetryHooks, transition: Option<Transition>) {
        let Some(transition) = transition else {
            return;
        };
        match transition.to {
            CircuitState::Open => {
                tracing::debug!(transport = %self.name, "retry circuit breaker opened");
                if let Some(hook) = &hooks.on_circuit_open {
                    hook();
                }
            }
            CircuitState::Closed if transition.from == CircuitState::HalfOpen => {
                tracing::debug!(transport = %self.name, "retry circuit breaker closed");
                if let Some(hook) = &hooks.on_circuit_close {
                    hook();
                }
            }
            _ => {}
        }
    }

    async fn write_with_retry(
        &self,
        hooks: &RetryHooks,
        record: &LogRecord,
        formatter: &Formatter,
    ) -> Result<()> {
        let (admission, transition) = self.breaker.lock().acquire();
        self.notify(hooks, transition);
        let Some(admission) = admission else {
            return Err(LoggerError::circuit_open(self.inner.name()));
        };

        let mut trial = TrialGuard {
            shared: self,
            hooks,
            armed: admission == Admission::Trial,
        };
        let max_attempts = match admission {
            Admission::Trial => 1,
            Admission::Normal => self.options.max_attempts.max(1),
        };
        let start = Instant::now();
        let mut attempt = 1;

        let last_error = loop {
            match deliver(self.inner.as_ref(), record, formatter).await {
                Ok(()) => {
                    trial.armed = false;
                    let transition = self.breaker.lock().record_success();
                    self.notify(hooks, transition);
                    return Ok(());
                }
                Err(e) => {
                    if attempt >= max_attempts || !self.options.is_retryable(&e) {
                        break e;
                    }
                    let delay = self.backoff.delay(attempt);
                    tracing::debug!(
                        transport = %self.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "delivery failed; retrying"
                    );
                    if let Some(hook) = &hooks.on_retry_attempt {
                        hook(attempt, &e, delay);
                    }
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        };

        trial.armed = false;
        let transition = self.breaker.lock().record_failure();
        self.notify(hooks, transition);
        if let Some(hook) = &hooks.on_retry_exhausted {
            hook(&last_error, attempt);
        }

        Err(LoggerError::RetryExhausted {
            attempts: attempt,
            elapsed: start.elapsed(),
            source: Box::new(last_error),
        })
    }
}

/// Releases a half-open trial whose call was dropped before reporting
struct TrialGuard<'a> {
    shared: &'a RetryShared,
    hooks: &'a RetryHooks,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!(transport = %self.shared.name, "retry circuit breaker trial abandoned");
            let transition = self.shared.breaker.lock().abandon_trial();
            self.shared.notify(self.hooks, transition);
        }
    }
}

/// Retrying, circuit-breaking decorator
pub struct RetryTransport {
    shared: Arc<RetryShared>,
    hooks: RetryHooks,
    dispatcher: Option<Dispatcher>,
    errors: ErrorSink,
}

impl RetryTransport {
    pub fn new(inner: SharedTransport, options: RetryOptions) -> Self {
        let name = format!("retry({})", inner.name());
        let breaker = CircuitBreaker::new(
            options.circuit_breaker_threshold,
            options.circuit_breaker_timeout,
            DecayPolicy::Reset,
        );
        Self {
            shared: Arc::new(RetryShared {
                backoff: options.backoff(),
                inner,
                name,
                options,
                breaker: Mutex::new(breaker),
            }),
            hooks: RetryHooks::default(),
            dispatcher: None,
            errors: ErrorSink::new(),
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_hooks(mut self, hooks: RetryHooks) -> Self {
        self.hooks = hooks;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_retry_attempt(mut self, hook: RetryAttemptHook) -> Self {
        self.hooks.on_retry_attempt = Some(hook);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_retry_exhausted(mut self, hook: RetryExhaustedHook) -> Self {
        self.hooks.on_retry_exhausted = Some(hook);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_circuit_open(mut self, hook: CircuitHook) -> Self {
        self.hooks.on_circuit_open = Some(hook);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn on_circuit_close(mut self, hook: CircuitHook) -> Self {
        self.hooks.on_circuit_close = Some(hook);
        self
    }

    /// Where fire-and-forget `write` calls run; defaults to the ambient runtime
    #[must_use = "builder methods return a new value"]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Receives failures of fire-and-forget `write` calls
    #[must_use = "builder methods return a new value"]
    pub fn with_error_listener(mut self, listener: ErrorListener) -> Self {
        self.errors.add(listener);
        self
    }

    pub(crate) fn with_error_sink(mut self, sink: ErrorSink) -> Self {
        self.errors.extend(&sink);
        self
    }

    pub fn options(&self) -> &RetryOptions {
        &self.shared.options
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.shared.breaker.lock().state()
    }

    /// Consecutive failed calls counted by the breaker
    pub fn failure_count(&self) -> u32 {
        self.shared.breaker.lock().failures()
    }

    pub fn reset_circuit_breaker(&self) {
        self.shared.breaker.lock().reset();
        tracing::debug!(transport = %self.shared.name, "retry circuit breaker reset");
    }

    pub fn inner(&self) -> &SharedTransport {
        &self.shared.inner
    }
}

#[async_trait]
impl Transport for RetryTransport {
    /// Start a retrying delivery in the background.
    ///
    /// Returns once the delivery is scheduled; its eventual failure goes to
    /// this transport's error listeners.
    fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let dispatcher = match &self.dispatcher {
            Some(dispatcher) => dispatcher.clone(),
            None => Dispatcher::require_current("RetryTransport::write")?,
        };

        let shared = self.shared.clone();
        let hooks = self.hooks.clone();
        let errors = self.errors.clone();
        let record = record.clone();
        let formatter = formatter.clone();

        dispatcher.spawn(async move {
            if let Err(e) = shared.write_with_retry(&hooks, &record, &formatter).await {
                errors.emit(ErrorEvent::new(ErrorKind::Transport, e).with_source(shared.name.clone()));
            }
        });
        Ok(())
    }

    fn supports_async(&self) -> bool {
        true
    }

    async fn write_async(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        self.shared.write_with_retry(&self.hooks, record, formatter).await
    }

    fn flush(&self) -> Result<()> {
        self.shared.inner.flush()
    }

    fn name(&self) -> &str {
        &self.shared.name
    }
}
