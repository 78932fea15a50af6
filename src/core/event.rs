//! Error events raised by deferred or isolated pipeline stages
//!
//! Failures that cannot be returned to the caller (deferred transport writes,
//! enricher and aggregator failures) are reported as [`ErrorEvent`]s to the
//! listeners registered on a logger. With no listener the event is reported
//! through `tracing` instead.

use super::error::LoggerError;
use std::fmt;
use std::sync::Arc;

/// Pipeline stage that raised the error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Aggregator,
    Enricher,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transport => "transport",
            ErrorKind::Aggregator => "aggregator",
            ErrorKind::Enricher => "enricher",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub error: Arc<LoggerError>,
    /// Name of the transport involved, when there is one
    pub source_name: Option<String>,
}

impl ErrorEvent {
    pub fn new(kind: ErrorKind, error: LoggerError) -> Self {
        Self {
            kind,
            error: Arc::new(error),
            source_name: None,
        }
    }

    #[must_use]
    pub fn with_source(mut self, name: impl Into<String>) -> Self {
        self.source_name = Some(name.into());
        self
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_name {
            Some(name) => write!(f, "{} error in '{}': {}", self.kind, name, self.error),
            None => write!(f, "{} error: {}", self.kind, self.error),
        }
    }
}

/// Error event callback
pub type ErrorListener = Arc<dyn Fn(&ErrorEvent) + Send + Sync>;

/// Fan-out of error events to registered listeners
#[derive(Clone, Default)]
pub struct ErrorSink {
    listeners: Vec<ErrorListener>,
}

impl ErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(listener: ErrorListener) -> Self {
        Self {
            listeners: vec![listener],
        }
    }

    pub fn add(&mut self, listener: ErrorListener) {
        self.listeners.push(listener);
    }

    /// Append another sink's listeners after this one's
    pub fn extend(&mut self, other: &ErrorSink) {
        self.listeners.extend(other.listeners.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver an event to every listener.
    ///
    /// A panicking listener does not stop the others.
    pub fn emit(&self, event: ErrorEvent) {
        if self.listeners.is_empty() {
            tracing::error!(kind = %event.kind, source = ?event.source_name, error = %event.error, "unobserved logger error");
            return;
        }

        for listener in &self.listeners {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(&event)));
            if let Err(panic_info) = result {
                let msg = super::error::panic_message(panic_info.as_ref());
                tracing::error!(panic = %msg, "error listener panicked");
            }
        }
    }
}

impl fmt::Debug for ErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorSink")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
