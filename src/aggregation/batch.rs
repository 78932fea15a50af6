//! Size-triggered batching

use super::{Aggregator, Buffer, BufferedRecord, FlushCallback, FlushOutcome};
use crate::core::dispatcher::Dispatcher;
use crate::core::error::{LoggerError, Result};
use crate::core::formatter::Formatter;
use crate::core::record::LogRecord;
use std::future::Future;
use std::sync::Arc;

/// Default number of records per batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Buffers records and flushes once `max_size` of them have accumulated.
///
/// With an asynchronous callback, the flush runs on a dispatcher and is
/// tracked as the single in-flight flush: size triggers are suppressed while
/// it runs, and explicit `flush` calls wait on it rather than starting a new
/// one. Records arriving meanwhile accumulate in a fresh buffer. A failed
/// batch is put back in front of them.
///
/// # Example
///
/// ```
/// use relay_logger::prelude::*;
///
/// let aggregator = BatchAggregator::new(2, |batch: &[BufferedRecord]| {
///     for item in batch {
///         println!("{}", item.format());
///     }
///     Ok(())
/// });
///
/// let formatter = Formatter::plain();
/// aggregator.aggregate(&LogRecord::new(Level::INFO, "one"), &formatter).unwrap();
/// assert_eq!(aggregator.len(), 1);
/// aggregator.aggregate(&LogRecord::new(Level::INFO, "two"), &formatter).unwrap();
/// assert_eq!(aggregator.len(), 0);
/// ```
pub struct BatchAggregator {
    max_size: usize,
    callback: FlushCallback,
    dispatcher: Option<Dispatcher>,
    buffer: Arc<Buffer>,
}

impl BatchAggregator {
    pub fn new<F>(max_size: usize, callback: F) -> Self
    where
        F: Fn(&[BufferedRecord]) -> Result<()> + Send + Sync + 'static,
    {
        Self::with_callback(max_size, FlushCallback::sync(callback))
    }

    pub fn with_async<F, Fut>(max_size: usize, callback: F) -> Self
    where
        F: Fn(Arc<Vec<BufferedRecord>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::with_callback(max_size, FlushCallback::asynchronous(callback))
    }

    /// A `max_size` of zero is treated as one
    pub fn with_callback(max_size: usize, callback: FlushCallback) -> Self {
        Self {
            max_size: max_size.max(1),
            callback,
            dispatcher: None,
            buffer: Arc::new(Buffer::default()),
        }
    }

    /// Run asynchronous flushes on `dispatcher` instead of the ambient runtime
    #[must_use = "builder methods return a new value"]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Records currently buffered
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an asynchronous flush is running
    pub fn is_flushing(&self) -> bool {
        self.buffer.state.lock().has_in_flight()
    }
}

impl Aggregator for BatchAggregator {
    fn aggregate(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let should_flush = {
            let mut state = self.buffer.state.lock();
            state.records.push(BufferedRecord {
                record: record.clone(),
                formatter: formatter.clone(),
            });
            state.records.len() >= self.max_size && !state.has_in_flight()
        };

        if !should_flush {
            return Ok(());
        }

        match self.flush() {
            FlushOutcome::Ready(result) => result,
            FlushOutcome::Pending(_) => Ok(()),
        }
    }

    fn flush(&self) -> FlushOutcome {
        self.buffer
            .flush(&self.callback, self.dispatcher.as_ref(), true)
    }
}

impl std::fmt::Debug for BatchAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchAggregator")
            .field("max_size", &self.max_size)
            .field("buffered", &self.len())
            .field("callback", &self.callback)
            .finish()
    }
}

impl Default for BatchAggregator {
    /// Batches of [`DEFAULT_BATCH_SIZE`] that are discarded on flush
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE, |_| Ok(()))
    }
}
