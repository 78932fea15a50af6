//! Log aggregation
//!
//! Aggregators collect formatted-record pairs and hand them to a callback in
//! batches. A flush either completes on the spot ([`FlushOutcome::Ready`]) or
//! runs on a dispatcher and is awaited ([`FlushOutcome::Pending`]); callers
//! that do not care which can use [`FlushOutcome::resolve`].

mod batch;
mod composite;
mod time_based;

pub use batch::BatchAggregator;
pub use composite::CompositeAggregator;
pub use time_based::TimeBasedAggregator;

use crate::core::dispatcher::Dispatcher;
use crate::core::error::{panic_message, LoggerError, Result};
use crate::core::formatter::Formatter;
use crate::core::record::LogRecord;
use parking_lot::Mutex;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;

pub trait Aggregator: Send + Sync {
    /// Buffer one record; may trigger a flush
    fn aggregate(&self, record: &LogRecord, formatter: &Formatter) -> Result<()>;

    /// Hand everything buffered to the flush callback
    fn flush(&self) -> FlushOutcome;
}

pub type SharedAggregator = Arc<dyn Aggregator>;

/// A record together with the formatter of the logger that produced it
#[derive(Debug, Clone)]
pub struct BufferedRecord {
    pub record: LogRecord,
    pub formatter: Formatter,
}

impl BufferedRecord {
    pub fn format(&self) -> String {
        self.formatter.format(&self.record)
    }
}

pub type FlushFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

pub type SyncFlushFn = Arc<dyn Fn(&[BufferedRecord]) -> Result<()> + Send + Sync>;

pub type AsyncFlushFn = Arc<dyn Fn(Arc<Vec<BufferedRecord>>) -> FlushFuture + Send + Sync>;

/// Receives each flushed batch
#[derive(Clone)]
pub enum FlushCallback {
    Sync(SyncFlushFn),
    Async(AsyncFlushFn),
}

impl FlushCallback {
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&[BufferedRecord]) -> Result<()> + Send + Sync + 'static,
    {
        FlushCallback::Sync(Arc::new(f))
    }

    pub fn asynchronous<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<Vec<BufferedRecord>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        FlushCallback::Async(Arc::new(
            move |batch: Arc<Vec<BufferedRecord>>| -> FlushFuture { Box::pin(f(batch)) },
        ))
    }
}

impl std::fmt::Debug for FlushCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushCallback::Sync(_) => f.write_str("FlushCallback::Sync"),
            FlushCallback::Async(_) => f.write_str("FlushCallback::Async"),
        }
    }
}

pub enum FlushOutcome {
    /// The flush finished (or there was nothing to flush)
    Ready(Result<()>),
    /// The flush is running on a dispatcher
    Pending(FlushFuture),
}

impl FlushOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, FlushOutcome::Ready(_))
    }

    pub async fn resolve(self) -> Result<()> {
        match self {
            FlushOutcome::Ready(result) => result,
            FlushOutcome::Pending(future) => future.await,
        }
    }

    /// Combine several outcomes.
    ///
    /// Ready when every part was ready; otherwise waits for all pending parts.
    /// The first error wins either way.
    pub fn join_all(outcomes: Vec<FlushOutcome>) -> FlushOutcome {
        let mut first_error = None;
        let mut pending = Vec::new();

        for outcome in outcomes {
            match outcome {
                FlushOutcome::Ready(Err(e)) if first_error.is_none() => first_error = Some(e),
                FlushOutcome::Ready(_) => {}
                FlushOutcome::Pending(future) => pending.push(future),
            }
        }

        if pending.is_empty() {
            return FlushOutcome::Ready(first_error.map_or(Ok(()), Err));
        }

        FlushOutcome::Pending(Box::pin(async move {
            let mut first_error = first_error;
            for future in pending {
                if let Err(e) = future.await {
                    first_error.get_or_insert(e);
                }
            }
            first_error.map_or(Ok(()), Err)
        }))
    }
}

impl std::fmt::Debug for FlushOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushOutcome::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            FlushOutcome::Pending(_) => f.write_str("Pending"),
        }
    }
}

type SharedFlushResult = std::result::Result<(), Arc<LoggerError>>;

#[derive(Default)]
pub(crate) struct BufferState {
    pub(crate) records: Vec<BufferedRecord>,
    in_flight: Option<watch::Receiver<Option<SharedFlushResult>>>,
}

impl BufferState {
    pub(crate) fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}

/// Record buffer shared between an aggregator and its running flushes
#[derive(Default)]
pub(crate) struct Buffer {
    pub(crate) state: Mutex<BufferState>,
}

impl Buffer {
    pub(crate) fn push(&self, record: &LogRecord, formatter: &Formatter) -> usize {
        let mut state = self.state.lock();
        state.records.push(BufferedRecord {
            record: record.clone(),
            formatter: formatter.clone(),
        });
        state.records.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.state.lock().records.len()
    }

    /// Put a failed batch back in front of anything buffered since
    fn restore(&self, batch: Vec<BufferedRecord>) {
        let mut state = self.state.lock();
        let newer = std::mem::replace(&mut state.records, batch);
        state.records.extend(newer);
    }

    /// Swap the buffer out and run the callback over it.
    ///
    /// With `coalesce`, a flush requested while an asynchronous one is running
    /// waits on that flush instead of starting another.
    pub(crate) fn flush(
        self: &Arc<Self>,
        callback: &FlushCallback,
        dispatcher: Option<&Dispatcher>,
        coalesce: bool,
    ) -> FlushOutcome {
        let mut state = self.state.lock();

        if coalesce {
            if let Some(rx) = &state.in_flight {
                return FlushOutcome::Pending(wait_for(rx.clone()));
            }
        }

        if state.records.is_empty() {
            return FlushOutcome::Ready(Ok(()));
        }

        let batch = std::mem::take(&mut state.records);

        match callback {
            FlushCallback::Sync(callback) => {
                drop(state);
                let result = catch_unwind(AssertUnwindSafe(|| callback(&batch[..])))
                    .unwrap_or_else(|panic| Err(LoggerError::Panicked(panic_message(panic.as_ref()))));
                if result.is_err() {
                    self.restore(batch);
                }
                FlushOutcome::Ready(result)
            }
            FlushCallback::Async(callback) => {
                let dispatcher = match dispatcher.cloned().or_else(Dispatcher::current) {
                    Some(dispatcher) => dispatcher,
                    None => {
                        state.records = batch;
                        return FlushOutcome::Ready(Err(LoggerError::NoDispatcher(
                            "asynchronous flush needs a running Tokio runtime or a dispatcher"
                                .to_string(),
                        )));
                    }
                };

                let batch = Arc::new(batch);
                let (done, rx) = watch::channel(None);
                if coalesce {
                    state.in_flight = Some(rx.clone());
                }
                drop(state);

                let mut completion = FlushCompletion {
                    buffer: self.clone(),
                    batch: batch.clone(),
                    done,
                    coalesce,
                    result: None,
                };

                match catch_unwind(AssertUnwindSafe(|| callback(batch))) {
                    Ok(future) => {
                        dispatcher.spawn(async move {
                            completion.result = Some(future.await);
                        });
                    }
                    Err(panic) => {
                        completion.result =
                            Some(Err(LoggerError::Panicked(panic_message(panic.as_ref()))));
                    }
                }

                FlushOutcome::Pending(wait_for(rx))
            }
        }
    }
}

/// Publishes the result of an asynchronous flush when the task ends, even if
/// the task was aborted or the callback panicked
struct FlushCompletion {
    buffer: Arc<Buffer>,
    batch: Arc<Vec<BufferedRecord>>,
    done: watch::Sender<Option<SharedFlushResult>>,
    coalesce: bool,
    result: Option<Result<()>>,
}

impl Drop for FlushCompletion {
    fn drop(&mut self) {
        let result = self
            .result
            .take()
            .unwrap_or_else(|| Err(LoggerError::aggregator("flush task ended before completing")));

        if self.coalesce {
            self.buffer.state.lock().in_flight = None;
        }

        let shared = match result {
            Ok(()) => Ok(()),
            Err(e) => {
                let batch = std::mem::take(&mut self.batch);
                let records = Arc::try_unwrap(batch).unwrap_or_else(|shared| (*shared).clone());
                self.buffer.restore(records);
                Err(Arc::new(e))
            }
        };

        self.done.send_replace(Some(shared));
    }
}

fn wait_for(mut rx: watch::Receiver<Option<SharedFlushResult>>) -> FlushFuture {
    Box::pin(async move {
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(result) = current {
                return result.map_err(LoggerError::Flush);
            }
            if rx.changed().await.is_err() {
                let last = rx.borrow().clone();
                return match last {
                    Some(result) => result.map_err(LoggerError::Flush),
                    None => Err(LoggerError::aggregator("flush abandoned")),
                };
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_all_ready_when_all_ready() {
        let outcome = FlushOutcome::join_all(vec![
            FlushOutcome::Ready(Ok(())),
            FlushOutcome::Ready(Err(LoggerError::aggregator("first"))),
            FlushOutcome::Ready(Err(LoggerError::aggregator("second"))),
        ]);
        assert!(outcome.is_ready());
        let err = outcome.resolve().await.unwrap_err();
        assert_eq!(err.to_string(), "Aggregator failed: first");
    }

    #[tokio::test]
    async fn test_join_all_waits_for_pending() {
        let outcome = FlushOutcome::join_all(vec![
            FlushOutcome::Ready(Ok(())),
            FlushOutcome::Pending(Box::pin(async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                Err(LoggerError::aggregator("late"))
            })),
        ]);
        assert!(!outcome.is_ready());
        assert!(outcome.resolve().await.is_err());
    }

    #[test]
    fn test_join_all_empty() {
        assert!(matches!(FlushOutcome::join_all(vec![]), FlushOutcome::Ready(Ok(()))));
    }
}
