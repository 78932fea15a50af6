//! Error types for the logger system

use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Delivery failure reported by a transport, optionally carrying an errno-style code
    #[error("{message}")]
    Delivery {
        code: Option<String>,
        message: String,
    },

    /// Circuit breaker rejected the call without attempting delivery
    #[error("Circuit breaker is open for '{transport}' - rejecting requests")]
    CircuitOpen { transport: String },

    /// All delivery attempts failed
    #[error("Delivery failed after {attempts} attempt(s) in {elapsed:?}: {source}")]
    RetryExhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        source: Box<LoggerError>,
    },

    /// Enricher failure
    #[error("Enricher failed: {0}")]
    Enricher(String),

    /// Aggregator failure
    #[error("Aggregator failed: {0}")]
    Aggregator(String),

    /// A shared flush failed; the error is observed by every waiter
    #[error("Flush failed: {0}")]
    Flush(Arc<LoggerError>),

    /// A sink or callback panicked
    #[error("Panicked: {0}")]
    Panicked(String),

    /// Deferred work was requested without a runtime to run it on
    #[error("No dispatcher available: {0}")]
    NoDispatcher(String),

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Writer error (generic)
    #[error("Writer error: {0}")]
    WriterError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create a delivery error carrying an errno-style code
    pub fn delivery(code: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::Delivery {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Create a delivery error without a code
    pub fn delivery_message(message: impl Into<String>) -> Self {
        LoggerError::Delivery {
            code: None,
            message: message.into(),
        }
    }

    /// Create a circuit-open rejection
    pub fn circuit_open(transport: impl Into<String>) -> Self {
        LoggerError::CircuitOpen {
            transport: transport.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create an enricher error
    pub fn enricher<S: Into<String>>(msg: S) -> Self {
        LoggerError::Enricher(msg.into())
    }

    /// Create an aggregator error
    pub fn aggregator<S: Into<String>>(msg: S) -> Self {
        LoggerError::Aggregator(msg.into())
    }

    /// Create a writer error (generic)
    pub fn writer<S: Into<String>>(msg: S) -> Self {
        LoggerError::WriterError(msg.into())
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Errno-style code used for retry classification.
    ///
    /// IO errors map their [`ErrorKind`] onto the conventional socket/file codes.
    pub fn code(&self) -> Option<&str> {
        match self {
            LoggerError::Delivery { code, .. } => code.as_deref(),
            LoggerError::IoError(source) | LoggerError::IoOperation { source, .. } => {
                io_error_code(source.kind())
            }
            LoggerError::RetryExhausted { source, .. } => source.code(),
            LoggerError::Flush(inner) => inner.code(),
            _ => None,
        }
    }

    /// Whether this error is a breaker rejection rather than a delivery failure
    pub fn is_circuit_open(&self) -> bool {
        match self {
            LoggerError::CircuitOpen { .. } => true,
            LoggerError::Flush(inner) => inner.is_circuit_open(),
            _ => false,
        }
    }
}

fn io_error_code(kind: ErrorKind) -> Option<&'static str> {
    let code = match kind {
        ErrorKind::ConnectionReset => "ECONNRESET",
        ErrorKind::ConnectionRefused => "ECONNREFUSED",
        ErrorKind::ConnectionAborted => "ECONNABORTED",
        ErrorKind::TimedOut => "ETIMEDOUT",
        ErrorKind::NotFound => "ENOENT",
        ErrorKind::PermissionDenied => "EACCES",
        ErrorKind::BrokenPipe => "EPIPE",
        ErrorKind::AddrNotAvailable => "EADDRNOTAVAIL",
        ErrorKind::WouldBlock => "EAGAIN",
        _ => return None,
    };
    Some(code)
}

/// Extract a readable message from a caught panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::delivery("ETIMEDOUT", "Network timeout");
        assert!(matches!(err, LoggerError::Delivery { .. }));

        let err = LoggerError::config("RetryTransport", "max_attempts must be at least 1");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerError::circuit_open("http");
        assert!(err.is_circuit_open());
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::delivery("EAUTH", "Authentication failed");
        assert_eq!(err.to_string(), "Authentication failed");

        let err = LoggerError::circuit_open("http");
        assert_eq!(
            err.to_string(),
            "Circuit breaker is open for 'http' - rejecting requests"
        );

        let err = LoggerError::config("BatchAggregator", "max_size must be positive");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for BatchAggregator: max_size must be positive"
        );
    }

    #[test]
    fn test_io_error_codes() {
        let io_err = std::io::Error::new(ErrorKind::ConnectionRefused, "refused");
        let err = LoggerError::io_operation("sending record", "cannot reach collector", io_err);
        assert_eq!(err.code(), Some("ECONNREFUSED"));
        assert!(err.to_string().contains("sending record"));

        let err = LoggerError::from(std::io::Error::new(ErrorKind::TimedOut, "slow"));
        assert_eq!(err.code(), Some("ETIMEDOUT"));

        let err = LoggerError::from(std::io::Error::new(ErrorKind::InvalidData, "bad"));
        assert_eq!(err.code(), None);
    }

    #[test]
    fn test_retry_exhausted_forwards_code() {
        let err = LoggerError::RetryExhausted {
            attempts: 3,
            elapsed: Duration::from_millis(30),
            source: Box::new(LoggerError::delivery("ECONNRESET", "reset by peer")),
        };
        assert_eq!(err.code(), Some("ECONNRESET"));
        assert!(err.to_string().contains("3 attempt(s)"));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "Unknown panic");
    }
}
