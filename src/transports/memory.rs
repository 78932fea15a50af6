//! In-memory transport
//!
//! Keeps every delivered record and its formatted line. Failures can be
//! scripted, which makes it the usual inner transport when exercising the
//! reliability decorators.

use crate::core::{Formatter, LogRecord, LoggerError, Result, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
struct ScriptedFailure {
    code: Option<String>,
    message: String,
    /// Remaining failures; `None` fails forever
    remaining: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    name: String,
    records: Mutex<Vec<LogRecord>>,
    lines: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failure: Mutex<Option<ScriptedFailure>>,
    async_capable: bool,
    latency: Duration,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::named("memory")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Advertise async support, optionally sleeping `latency` per async write
    #[must_use]
    pub fn with_async(mut self, latency: Duration) -> Self {
        self.async_capable = true;
        self.latency = latency;
        self
    }

    /// Fail every write with the given code and message
    #[must_use]
    pub fn failing(self, code: Option<&str>, message: impl Into<String>) -> Self {
        self.set_failure(code, message, None);
        self
    }

    /// Fail the next `times` writes, then succeed
    #[must_use]
    pub fn failing_times(self, times: usize, code: Option<&str>, message: impl Into<String>) -> Self {
        self.set_failure(code, message, Some(times));
        self
    }

    pub fn set_failure(&self, code: Option<&str>, message: impl Into<String>, times: Option<usize>) {
        *self.failure.lock() = Some(ScriptedFailure {
            code: code.map(str::to_string),
            message: message.into(),
            remaining: times,
        });
    }

    /// Stop failing
    pub fn heal(&self) {
        *self.failure.lock() = None;
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records.lock().iter().map(|r| r.message.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes attempted, including failed ones
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.records.lock().clear();
        self.lines.lock().clear();
        self.attempts.store(0, Ordering::SeqCst);
    }

    fn next_failure(&self) -> Option<LoggerError> {
        let mut failure = self.failure.lock();
        let (error, exhausted) = {
            let scripted = failure.as_mut()?;
            if scripted.remaining == Some(0) {
                (None, true)
            } else {
                if let Some(n) = scripted.remaining.as_mut() {
                    *n -= 1;
                }
                let error = LoggerError::Delivery {
                    code: scripted.code.clone(),
                    message: scripted.message.clone(),
                };
                (Some(error), scripted.remaining == Some(0))
            }
        };
        if exhausted {
            *failure = None;
        }
        error
    }

    fn store(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.next_failure() {
            return Err(error);
        }
        self.lines.lock().push(formatter.format(record));
        self.records.lock().push(record.clone());
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        self.store(record, formatter)
    }

    fn supports_async(&self) -> bool {
        self.async_capable
    }

    async fn write_async(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.store(record, formatter)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Level;

    #[test]
    fn test_failing_times_then_success() {
        let transport = MemoryTransport::new().failing_times(2, Some("ECONNRESET"), "reset");
        let record = LogRecord::new(Level::INFO, "x");
        let formatter = Formatter::plain();

        assert_eq!(
            transport.write(&record, &formatter).unwrap_err().code(),
            Some("ECONNRESET")
        );
        assert!(transport.write(&record, &formatter).is_err());
        assert!(transport.write(&record, &formatter).is_ok());
        assert_eq!(transport.attempts(), 3);
        assert_eq!(transport.lines(), vec!["[INFO] x"]);
    }

    #[test]
    fn test_failing_forever_and_heal() {
        let transport = MemoryTransport::new().failing(None, "broken");
        let record = LogRecord::new(Level::INFO, "x");
        for _ in 0..5 {
            assert!(transport.write(&record, &Formatter::plain()).is_err());
        }
        transport.heal();
        assert!(transport.write(&record, &Formatter::plain()).is_ok());
        assert_eq!(transport.len(), 1);
    }
}
