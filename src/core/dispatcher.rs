//! Deferred task submission
//!
//! [`Dispatcher`] is a cloneable handle onto a Tokio runtime that counts the
//! tasks it has submitted, so callers can wait for deferred deliveries to
//! drain. [`EventLoop`] owns a dedicated thread running a current-thread
//! runtime, giving deferred work a single logical thread of control when the
//! application has no runtime of its own.

use super::error::{LoggerError, Result};
use parking_lot::{Condvar, Mutex};
use std::future::Future;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;

/// Default shutdown timeout for event loop cleanup (5 seconds)
///
/// This timeout is used when the event loop is dropped without explicit shutdown.
/// For custom timeout control, use [`EventLoop::shutdown`] instead.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
    idle_async: Notify,
}

/// Decrements the pending count when the task finishes or is aborted
struct PendingGuard(Arc<Pending>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.0.idle.notify_all();
            self.0.idle_async.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    handle: Handle,
    pending: Arc<Pending>,
}

impl Dispatcher {
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            handle,
            pending: Arc::new(Pending::default()),
        }
    }

    /// Dispatcher for the runtime the caller is running on, if any
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::from_handle)
    }

    /// Like [`Dispatcher::current`], but an error names the component that needed it
    pub fn require_current(component: &str) -> Result<Self> {
        Self::current().ok_or_else(|| {
            LoggerError::NoDispatcher(format!(
                "{} needs a running Tokio runtime or an explicit dispatcher",
                component
            ))
        })
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Submit a fire-and-forget task
    pub fn spawn<F>(&self, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        *self.pending.count.lock() += 1;
        let guard = PendingGuard(self.pending.clone());
        self.handle.spawn(async move {
            let _guard = guard;
            future.await;
        })
    }

    /// Number of submitted tasks that have not finished yet
    pub fn pending(&self) -> usize {
        *self.pending.count.lock()
    }

    /// Block the current thread until every submitted task has finished.
    ///
    /// Must not be called from a thread that drives this dispatcher's runtime.
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.pending.count.lock();
        while *count > 0 {
            if self.pending.idle.wait_until(&mut count, deadline).timed_out() {
                return *count == 0;
            }
        }
        true
    }

    /// Wait until every submitted task has finished
    pub async fn idle(&self) {
        loop {
            let notified = self.pending.idle_async.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.pending())
            .finish()
    }
}

/// A current-thread Tokio runtime on its own thread
pub struct EventLoop {
    dispatcher: Dispatcher,
    stop: Option<oneshot::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl EventLoop {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| LoggerError::io_operation("building event loop", "runtime setup failed", e))?;
        let dispatcher = Dispatcher::from_handle(runtime.handle().clone());
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("relay-logger-event-loop".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stop_rx.await;
                });
            })
            .map_err(|e| LoggerError::io_operation("starting event loop", "thread spawn failed", e))?;

        Ok(Self {
            dispatcher,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Drain in-flight tasks, then stop the loop thread
    ///
    /// # Returns
    ///
    /// `true` if shutdown completed within `timeout`, `false` otherwise
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.thread.take() else {
            return true;
        };
        let start = Instant::now();

        if handle.thread().id() == thread::current().id() {
            // Dropped from inside the loop: nothing can be drained from here.
            drop(self.stop.take());
            return false;
        }

        let drained = self.dispatcher.wait_idle(timeout);
        if !drained {
            tracing::warn!(
                pending = self.dispatcher.pending(),
                "event loop did not drain within {:?}; pending deliveries may be lost",
                timeout
            );
        }

        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }

        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!("event loop thread panicked during shutdown");
                    return false;
                }
                break;
            }

            if start.elapsed() >= timeout {
                tracing::warn!("event loop thread did not finish within {:?}", timeout);
                return false;
            }

            thread::sleep(Duration::from_millis(10));
        }

        drained
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("dispatcher", &self.dispatcher)
            .field("running", &self.thread.is_some())
            .finish()
    }
}
