//! Dead letter capture
//!
//! [`DeadLetterQueue`] wraps one transport and retries deliveries that fail
//! with a retryable error code. A record that still cannot be delivered is
//! kept as a [`DeadLetter`]: in memory, optionally appended to a JSON Lines
//! file, and handed to a callback. The original error is still returned.

use crate::core::backoff::Backoff;
use crate::core::transport::{deliver, SharedTransport, Transport};
use crate::core::{Formatter, LogRecord, LoggerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Jitter applied to redelivery delays (±10%)
pub const DEAD_LETTER_JITTER: f64 = 0.10;

pub const DEFAULT_DEAD_LETTER_CODES: [&str; 4] = ["ECONNREFUSED", "ETIMEDOUT", "ECONNRESET", "ENOTFOUND"];

const MAX_REDELIVERY_DELAY: Duration = Duration::from_millis(30_000);

/// A record that could not be delivered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    #[serde(flatten)]
    pub record: LogRecord,
    /// Message of the final error
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_error_code: Option<String>,
    /// Redeliveries attempted after the first failure
    pub retry_count: u32,
    pub failed_at: DateTime<Utc>,
}

pub type DeadLetterCallback = Arc<dyn Fn(&DeadLetter) + Send + Sync>;

#[derive(Clone)]
pub struct DeadLetterOptions {
    /// Redeliveries after the first failure; total deliveries are `max_retries + 1`
    pub max_retries: u32,
    pub retryable_codes: HashSet<String>,
    /// JSON Lines file receiving one line per dead letter
    pub dead_letter_file: Option<PathBuf>,
    pub on_dead_letter: Option<DeadLetterCallback>,
    pub base_delay: Duration,
}

impl Default for DeadLetterOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retryable_codes: DEFAULT_DEAD_LETTER_CODES.iter().map(|c| c.to_string()).collect(),
            dead_letter_file: None,
            on_dead_letter: None,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl std::fmt::Debug for DeadLetterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadLetterOptions")
            .field("max_retries", &self.max_retries)
            .field("retryable_codes", &self.retryable_codes)
            .field("dead_letter_file", &self.dead_letter_file)
            .field("on_dead_letter", &self.on_dead_letter.is_some())
            .field("base_delay", &self.base_delay)
            .finish()
    }
}

pub struct DeadLetterQueue {
    inner: SharedTransport,
    name: String,
    options: DeadLetterOptions,
    backoff: Backoff,
    dead_letters: Mutex<Vec<DeadLetter>>,
    file_lock: Mutex<()>,
}

impl DeadLetterQueue {
    pub fn new(inner: SharedTransport, options: DeadLetterOptions) -> Self {
        let backoff = Backoff::new(options.base_delay, MAX_REDELIVERY_DELAY, 2.0)
            .with_jitter(DEAD_LETTER_JITTER);
        Self {
            name: format!("dead_letter({})", inner.name()),
            inner,
            options,
            backoff,
            dead_letters: Mutex::new(Vec::new()),
            file_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the captured dead letters
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().clone()
    }

    pub fn clear_dead_letters(&self) {
        self.dead_letters.lock().clear();
    }

    pub fn options(&self) -> &DeadLetterOptions {
        &self.options
    }

    pub fn inner(&self) -> &SharedTransport {
        &self.inner
    }

    /// Delay before the next redelivery, or `None` when the failure is final
    fn next_delay(&self, error: &LoggerError, retry_count: u32) -> Option<Duration> {
        let retryable = error
            .code()
            .map_or(false, |code| self.options.retryable_codes.contains(code));
        if retryable && retry_count < self.options.max_retries {
            Some(self.backoff.delay(retry_count + 1))
        } else {
            None
        }
    }

    fn capture(&self, record: &LogRecord, error: &LoggerError, retry_count: u32) {
        let dead_letter = DeadLetter {
            record: record.clone(),
            reason: error.to_string(),
            original_error_code: error.code().map(str::to_string),
            retry_count,
            failed_at: Utc::now(),
        };

        self.dead_letters.lock().push(dead_letter.clone());

        if let Some(path) = &self.options.dead_letter_file {
            if let Err(e) = self.append_to_file(path, &dead_letter) {
                tracing::error!(path = %path.display(), error = %e, "failed to write dead letter");
            }
        }

        if let Some(callback) = &self.options.on_dead_letter {
            callback(&dead_letter);
        }
    }

    fn append_to_file(&self, path: &Path, dead_letter: &DeadLetter) -> Result<()> {
        let mut line = serde_json::to_string(dead_letter)?;
        line.push('\n');

        let _guard = self.file_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LoggerError::io_operation("opening dead letter file", path.display().to_string(), e))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[async_trait]
impl Transport for DeadLetterQueue {
    /// Deliver with blocking backoff between redeliveries
    fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let mut retry_count = 0;
        loop {
            let error = match self.inner.write(record, formatter) {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            match self.next_delay(&error, retry_count) {
                Some(delay) => {
                    std::thread::sleep(delay);
                    retry_count += 1;
                }
                None => {
                    self.capture(record, &error, retry_count);
                    return Err(error);
                }
            }
        }
    }

    fn supports_async(&self) -> bool {
        true
    }

    async fn write_async(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let mut retry_count = 0;
        loop {
            let error = match deliver(self.inner.as_ref(), record, formatter).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            match self.next_delay(&error, retry_count) {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    retry_count += 1;
                }
                None => {
                    self.capture(record, &error, retry_count);
                    return Err(error);
                }
            }
        }
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
    use crate::core::{Level, Metadata};
    use crate::transports::MemoryTransport;
    use tempfile::tempdir;

    fn options(max_retries: u32) -> DeadLetterOptions {
        DeadLetterOptions {
            max_retries,
            base_delay: Duration::from_millis(1),
            ..DeadLetterOptions::default()
        }
    }

    fn record() -> LogRecord {
        LogRecord::new(Level::ERROR, "payment failed")
            .with_metadata(Metadata::new().with_field("order", 7))
    }

    #[test]
    fn test_non_retryable_dead_letters_immediately() {
        let inner = Arc::new(MemoryTransport::new().failing(Some("EAUTH"), "denied"));
        let dlq = DeadLetterQueue::new(inner.clone(), options(3));

        let err = dlq.write(&record(), &Formatter::plain()).unwrap_err();
        assert_eq!(err.code(), Some("EAUTH"));
        assert_eq!(inner.attempts(), 1);

        let letters = dlq.dead_letters();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].retry_count, 0);
        assert_eq!(letters[0].reason, "denied");
        assert_eq!(letters[0].original_error_code.as_deref(), Some("EAUTH"));
        assert_eq!(letters[0].record.message, "payment failed");
    }

    #[test]
    fn test_retryable_exhausts_max_retries() {
        let inner = Arc::new(MemoryTransport::new().failing(Some("ECONNREFUSED"), "refused"));
        let dlq = DeadLetterQueue::new(inner.clone(), options(2));

        assert!(dlq.write(&record(), &Formatter::plain()).is_err());
        assert_eq!(inner.attempts(), 3);
        assert_eq!(dlq.dead_letters()[0].retry_count, 2);
    }

    #[test]
    fn test_recovers_without_dead_letter() {
        let inner = Arc::new(MemoryTransport::new().failing_times(1, Some("ETIMEDOUT"), "slow"));
        let dlq = DeadLetterQueue::new(inner.clone(), options(3));

        dlq.write(&record(), &Formatter::plain()).unwrap();
        assert!(dlq.dead_letters().is_empty());
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn test_callback_file_and_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dead.jsonl");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let inner = Arc::new(MemoryTransport::new().failing(None, "broken"));
        let dlq = DeadLetterQueue::new(
            inner,
            DeadLetterOptions {
                dead_letter_file: Some(path.clone()),
                on_dead_letter: Some(Arc::new(move |letter: &DeadLetter| {
                    sink.lock().push(letter.reason.clone());
                })),
                ..options(0)
            },
        );

        assert!(dlq.write(&record(), &Formatter::plain()).is_err());
        assert!(dlq.write(&record(), &Formatter::plain()).is_err());
        assert_eq!(*seen.lock(), vec!["broken", "broken"]);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["message"], "payment failed");
        assert_eq!(lines[0]["reason"], "broken");
        assert_eq!(lines[0]["retryCount"], 0);
        assert_eq!(lines[0]["metadata"]["order"], 7);
        assert!(lines[0].get("failedAt").is_some());
        assert!(lines[0].get("originalErrorCode").is_none());

        dlq.clear_dead_letters();
        assert!(dlq.dead_letters().is_empty());
    }

    #[test]
    fn test_unwritable_file_is_not_propagated() {
        let dir = tempdir().unwrap();
        let inner = Arc::new(MemoryTransport::new().failing(Some("EAUTH"), "denied"));
        let dlq = DeadLetterQueue::new(
            inner,
            DeadLetterOptions {
                dead_letter_file: Some(dir.path().join("missing").join("dead.jsonl")),
                ..options(0)
            },
        );

        let err = dlq.write(&record(), &Formatter::plain()).unwrap_err();
        assert_eq!(err.code(), Some("EAUTH"));
        assert_eq!(dlq.dead_letters().len(), 1);
    }

    #[tokio::test]
    async fn test_async_path_matches_sync() {
        let inner = Arc::new(
            MemoryTransport::new()
                .with_async(Duration::ZERO)
                .failing(Some("ECONNRESET"), "reset"),
        );
        let dlq = DeadLetterQueue::new(inner.clone(), options(1));

        let err = dlq.write_async(&record(), &Formatter::plain()).await.unwrap_err();
        assert_eq!(err.code(), Some("ECONNRESET"));
        assert_eq!(inner.attempts(), 2);
        assert_eq!(dlq.dead_letters()[0].retry_count, 1);
    }
}
