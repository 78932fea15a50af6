//! Interval-triggered batching

use super::{Aggregator, Buffer, BufferedRecord, FlushCallback, FlushOutcome};
use crate::core::dispatcher::Dispatcher;
use crate::core::error::{LoggerError, Result};
use crate::core::formatter::Formatter;
use crate::core::record::LogRecord;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

struct FlushTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner {
    interval: Duration,
    callback: FlushCallback,
    buffer: Arc<Buffer>,
    timer: Mutex<Option<FlushTimer>>,
    next_generation: Mutex<u64>,
}

impl Inner {
    fn flush_buffer(&self, dispatcher: Option<&Dispatcher>) -> FlushOutcome {
        self.buffer.flush(&self.callback, dispatcher, false)
    }

    fn cancel_timer(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.handle.abort();
        }
    }
}

/// Flushes everything buffered `interval` after the first record since the
/// previous flush.
///
/// One timer runs at a time. A manual [`Aggregator::flush`] cancels it and
/// [`TimeBasedAggregator::stop`] cancels it without flushing.
pub struct TimeBasedAggregator {
    inner: Arc<Inner>,
    dispatcher: Option<Dispatcher>,
}

impl TimeBasedAggregator {
    pub fn new<F>(interval: Duration, callback: F) -> Self
    where
        F: Fn(&[BufferedRecord]) -> Result<()> + Send + Sync + 'static,
    {
        Self::with_callback(interval, FlushCallback::sync(callback))
    }

    pub fn with_async<F, Fut>(interval: Duration, callback: F) -> Self
    where
        F: Fn(Arc<Vec<BufferedRecord>>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self::with_callback(interval, FlushCallback::asynchronous(callback))
    }

    pub fn with_callback(interval: Duration, callback: FlushCallback) -> Self {
        Self {
            inner: Arc::new(Inner {
                interval,
                callback,
                buffer: Arc::new(Buffer::default()),
                timer: Mutex::new(None),
                next_generation: Mutex::new(0),
            }),
            dispatcher: None,
        }
    }

    /// Run the timer and asynchronous flushes on `dispatcher`
    #[must_use = "builder methods return a new value"]
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn len(&self) -> usize {
        self.inner.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a flush timer is pending
    pub fn has_pending_timer(&self) -> bool {
        self.inner.timer.lock().is_some()
    }

    /// Cancel the pending timer without flushing
    pub fn stop(&self) {
        self.inner.cancel_timer();
    }

    fn start_timer(&self) -> Result<()> {
        let mut timer = self.inner.timer.lock();
        if timer.is_some() {
            return Ok(());
        }

        let dispatcher = match self.dispatcher.clone().or_else(Dispatcher::current) {
            Some(dispatcher) => dispatcher,
            None => {
                return Err(LoggerError::NoDispatcher(
                    "TimeBasedAggregator needs a running Tokio runtime or a dispatcher".to_string(),
                ))
            }
        };

        let generation = {
            let mut next = self.inner.next_generation.lock();
            *next += 1;
            *next
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let interval = self.inner.interval;
        let flush_on = self.dispatcher.clone();

        let handle = dispatcher.spawn(async move {
            tokio::time::sleep(interval).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            {
                let mut timer = inner.timer.lock();
                match timer.as_ref() {
                    Some(current) if current.generation == generation => *timer = None,
                    _ => return,
                }
            }
            if let Err(e) = inner.flush_buffer(flush_on.as_ref()).resolve().await {
                tracing::error!(error = %e, "timed aggregator flush failed");
            }
        });

        *timer = Some(FlushTimer { generation, handle });
        Ok(())
    }
}

impl Aggregator for TimeBasedAggregator {
    fn aggregate(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        self.inner.buffer.push(record, formatter);
        self.start_timer()
    }

    fn flush(&self) -> FlushOutcome {
        if self.inner.buffer.len() == 0 {
            return FlushOutcome::Ready(Ok(()));
        }
        self.inner.cancel_timer();
        self.inner.flush_buffer(self.dispatcher.as_ref())
    }
}

impl std::fmt::Debug for TimeBasedAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeBasedAggregator")
            .field("interval", &self.inner.interval)
            .field("buffered", &self.len())
            .field("timer_pending", &self.has_pending_timer())
            .finish()
    }
}
