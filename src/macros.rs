//! Logging macros for ergonomic log message formatting.
//!
//! These macros provide a convenient interface for logging with automatic
//! string formatting, similar to `println!` and `format!`. Each expands to a
//! logger call and evaluates to its `Result`.
//!
//! # Examples
//!
//! ```
//! use relay_logger::prelude::*;
//! use relay_logger::info;
//!
//! let logger = Logger::new();
//!
//! // Basic logging
//! info!(logger, "Server started").unwrap();
//!
//! // With format arguments
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port).unwrap();
//! ```

/// Log a message at any level with automatic formatting.
///
/// # Examples
///
/// ```
/// # use relay_logger::prelude::*;
/// # let logger = Logger::new();
/// use relay_logger::log;
/// log!(logger, Level::INFO, "Simple message").unwrap();
/// log!(logger, Level::new("audit"), "User {} signed in", 42).unwrap();
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+), None)
    };
}

/// Log a boring-level message.
///
/// # Examples
///
/// ```
/// # use relay_logger::prelude::*;
/// # let mut logger = Logger::new();
/// # logger.set_level(Level::BORING);
/// use relay_logger::boring;
/// boring!(logger, "Entering function: calculate()").unwrap();
/// ```
#[macro_export]
macro_rules! boring {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::BORING, $($arg)+)
    };
}

/// Log a debug-level message.
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::DEBUG, $($arg)+)
    };
}

/// Log an info-level message.
///
/// # Examples
///
/// ```
/// # use relay_logger::prelude::*;
/// # let logger = Logger::new();
/// use relay_logger::info;
/// info!(logger, "Processing {} items", 100).unwrap();
/// ```
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::INFO, $($arg)+)
    };
}

/// Log a warning-level message.
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::WARN, $($arg)+)
    };
}

/// Log an error-level message.
///
/// # Examples
///
/// ```
/// # use relay_logger::prelude::*;
/// # let logger = Logger::new();
/// use relay_logger::error;
/// error!(logger, "Error code: {}, message: {}", 500, "Internal error").unwrap();
/// ```
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::Level::ERROR, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use crate::core::{Level, Logger};
    use crate::transports::MemoryTransport;
    use std::sync::Arc;

    fn logger() -> (Logger, Arc<MemoryTransport>) {
        let memory = Arc::new(MemoryTransport::new());
        let logger = Logger::builder()
            .level(Level::BORING)
            .shared_transport(memory.clone())
            .build();
        (logger, memory)
    }

    #[test]
    fn test_log_macro() {
        let (logger, memory) = logger();
        log!(logger, Level::INFO, "Test message").unwrap();
        log!(logger, Level::new("audit"), "Formatted: {}", 42).unwrap();
        assert_eq!(memory.messages(), vec!["Test message", "Formatted: 42"]);
        assert_eq!(memory.records()[1].level, Level::new("audit"));
    }

    #[test]
    fn test_level_macros() {
        let (logger, memory) = logger();
        boring!(logger, "Boring {}", 1).unwrap();
        debug!(logger, "Count: {}", 5).unwrap();
        info!(logger, "Items: {}", 100).unwrap();
        warn!(logger, "Retry {} of {}", 1, 3).unwrap();
        error!(logger, "Code: {}", 500).unwrap();

        let levels: Vec<Level> = memory.records().into_iter().map(|r| r.level).collect();
        assert_eq!(
            levels,
            vec![Level::BORING, Level::DEBUG, Level::INFO, Level::WARN, Level::ERROR]
        );
        assert_eq!(memory.messages()[3], "Retry 1 of 3");
    }
}
