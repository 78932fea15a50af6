//! Circuit breaker state machine
//!
//! One breaker implementation serves both reliability decorators; they differ
//! only in how a success treats the failure counter ([`DecayPolicy`]).
//!
//! States use the conventional names:
//! - `Closed`: calls pass through
//! - `Open`: tripped, calls are rejected until `timeout` has elapsed
//! - `HalfOpen`: one trial call is let through; its outcome closes or reopens
//!
//! The breaker is not internally synchronized; each decorator keeps its own
//! instance behind its own lock.

use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        };
        f.write_str(name)
    }
}

/// What a success does to the failure counter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecayPolicy {
    /// Back to zero
    Reset,
    /// `max(1, floor(failures * factor))`; a zero counter stays zero
    Multiplicative { factor: f64 },
}

impl DecayPolicy {
    fn apply(&self, failures: u32) -> u32 {
        match *self {
            DecayPolicy::Reset => 0,
            DecayPolicy::Multiplicative { .. } if failures == 0 => 0,
            DecayPolicy::Multiplicative { factor } => {
                ((f64::from(failures) * factor).floor() as u32).max(1)
            }
        }
    }
}

/// How a call was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Normal,
    /// The single half-open trial call
    Trial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: u32,
    timeout: Duration,
    decay: DecayPolicy,
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, timeout: Duration, decay: DecayPolicy) -> Self {
        Self {
            threshold: threshold.max(1),
            timeout,
            decay,
            state: CircuitState::Closed,
            failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// When the breaker last tripped
    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    /// Decide whether a call may proceed.
    ///
    /// An open breaker whose timeout has elapsed moves to half-open and admits
    /// exactly one trial; further calls are rejected until the trial reports.
    pub fn acquire(&mut self) -> (Option<Admission>, Option<Transition>) {
        match self.state {
            CircuitState::Closed => (Some(Admission::Normal), None),
            CircuitState::Open => {
                let elapsed = self.opened_at.map_or(true, |at| at.elapsed() >= self.timeout);
                if !elapsed {
                    return (None, None);
                }
                self.trial_in_flight = true;
                let transition = self.transition(CircuitState::HalfOpen);
                (Some(Admission::Trial), transition)
            }
            CircuitState::HalfOpen if self.trial_in_flight => (None, None),
            CircuitState::HalfOpen => {
                self.trial_in_flight = true;
                (Some(Admission::Trial), None)
            }
        }
    }

    pub fn record_success(&mut self) -> Option<Transition> {
        self.failures = self.decay.apply(self.failures);
        self.trial_in_flight = false;
        if self.state == CircuitState::HalfOpen {
            self.opened_at = None;
            self.transition(CircuitState::Closed)
        } else {
            None
        }
    }

    pub fn record_failure(&mut self) -> Option<Transition> {
        self.failures = self.failures.saturating_add(1);
        self.trial_in_flight = false;
        let trip = match self.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => self.failures >= self.threshold,
            CircuitState::Open => false,
        };
        if trip {
            self.opened_at = Some(Instant::now());
            self.transition(CircuitState::Open)
        } else {
            None
        }
    }

    /// Give back a trial whose call ended without reporting an outcome.
    ///
    /// The breaker reopens with a fresh timeout so a later call gets another trial.
    /// The failure counter is left alone.
    pub fn abandon_trial(&mut self) -> Option<Transition> {
        if self.state != CircuitState::HalfOpen || !self.trial_in_flight {
            return None;
        }
        self.trial_in_flight = false;
        self.opened_at = Some(Instant::now());
        self.transition(CircuitState::Open)
    }

    /// Back to a fresh closed breaker
    pub fn reset(&mut self) -> Option<Transition> {
        self.failures = 0;
        self.opened_at = None;
        self.trial_in_flight = false;
        self.transition(CircuitState::Closed)
    }

    fn transition(&mut self, to: CircuitState) -> Option<Transition> {
        let from = self.state;
        if from == to {
            return None;
        }
        self.state = to;
        tracing::debug!(%from, %to, failures = self.failures, "circuit breaker state change");
        Some(Transition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(decay: DecayPolicy) -> CircuitBreaker {
        CircuitBreaker::new(3, Duration::from_millis(20), decay)
    }

    #[test]
    fn test_trips_at_threshold() {
        let mut cb = breaker(DecayPolicy::Reset);
        assert_eq!(cb.record_failure(), None);
        assert_eq!(cb.record_failure(), None);
        assert_eq!(
            cb.record_failure(),
            Some(Transition {
                from: CircuitState::Closed,
                to: CircuitState::Open
            })
        );
        assert_eq!(cb.acquire().0, None);
    }

    #[test]
    fn test_half_open_single_trial() {
        let mut cb = breaker(DecayPolicy::Reset);
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));

        let (admission, transition) = cb.acquire();
        assert_eq!(admission, Some(Admission::Trial));
        assert_eq!(transition.map(|t| t.to), Some(CircuitState::HalfOpen));
        assert_eq!(cb.acquire().0, None);

        assert_eq!(cb.record_success().map(|t| t.to), Some(CircuitState::Closed));
        assert_eq!(cb.failures(), 0);
        assert_eq!(cb.acquire().0, Some(Admission::Normal));
    }

    #[test]
    fn test_failed_trial_reopens() {
        let mut cb = breaker(DecayPolicy::Reset);
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        cb.acquire();

        assert_eq!(cb.record_failure().map(|t| t.to), Some(CircuitState::Open));
        assert_eq!(cb.acquire().0, None);
    }

    #[test]
    fn test_abandoned_trial_reopens_and_admits_another() {
        let mut cb = breaker(DecayPolicy::Reset);
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cb.acquire().0, Some(Admission::Trial));

        assert_eq!(cb.abandon_trial().map(|t| t.to), Some(CircuitState::Open));
        assert_eq!(cb.failures(), 3);
        assert_eq!(cb.acquire().0, None);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(cb.acquire().0, Some(Admission::Trial));
        assert_eq!(cb.record_success().map(|t| t.to), Some(CircuitState::Closed));
    }

    #[test]
    fn test_abandon_without_trial_is_noop() {
        let mut cb = breaker(DecayPolicy::Reset);
        assert_eq!(cb.abandon_trial(), None);
        assert_eq!(cb.state(), CircuitState::Closed);

        for _ in 0..3 {
            cb.record_failure();
        }
        let opened_at = cb.opened_at();
        assert_eq!(cb.abandon_trial(), None);
        assert_eq!(cb.opened_at(), opened_at);
    }

    #[test]
    fn test_multiplicative_decay() {
        let mut cb = CircuitBreaker::new(
            100,
            Duration::from_secs(60),
            DecayPolicy::Multiplicative { factor: 0.9 },
        );
        cb.record_success();
        assert_eq!(cb.failures(), 0);

        for _ in 0..20 {
            cb.record_failure();
        }
        cb.record_success();
        assert_eq!(cb.failures(), 18);

        for _ in 0..30 {
            cb.record_success();
        }
        assert_eq!(cb.failures(), 1);
    }

    #[test]
    fn test_reset() {
        let mut cb = breaker(DecayPolicy::Reset);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.reset().map(|t| t.to), Some(CircuitState::Closed));
        assert_eq!(cb.failures(), 0);
        assert_eq!(cb.acquire().0, Some(Admission::Normal));
    }
}
