//! Main logger implementation

use super::{
    dispatcher::{Dispatcher, EventLoop},
    enricher::{Enricher, SharedEnricher},
    error::{panic_message, LoggerError, Result},
    event::{ErrorEvent, ErrorKind, ErrorListener, ErrorSink},
    filter::{Filter, SharedFilter},
    formatter::{Formatter, FormatterConfig, OutputFormat, TimestampFormat},
    level::{Level, LevelRegistry},
    metadata::Metadata,
    record::LogRecord,
    transport::{SharedTransport, Transport},
};
use crate::aggregation::{Aggregator, FlushOutcome, SharedAggregator};
use crate::transports::{RetryOptions, RetryTransport};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a logger hands records to its transports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Write on the caller's thread; the first transport error is returned
    #[default]
    Sync,
    /// Submit every write to a dispatcher; failures become error events
    Deferred,
}

/// Where deferred deliveries run.
///
/// Resolved on first use: an explicit dispatcher, else the ambient Tokio
/// runtime, else an [`EventLoop`] owned here and shared with child loggers.
struct DeferredRuntime {
    dispatcher: Mutex<Option<Dispatcher>>,
    event_loop: Mutex<Option<EventLoop>>,
}

impl DeferredRuntime {
    fn new(explicit: Option<Dispatcher>) -> Self {
        Self {
            dispatcher: Mutex::new(explicit),
            event_loop: Mutex::new(None),
        }
    }

    fn dispatcher(&self) -> Result<Dispatcher> {
        let mut resolved = self.dispatcher.lock();
        if let Some(dispatcher) = resolved.as_ref() {
            return Ok(dispatcher.clone());
        }

        let dispatcher = match Dispatcher::current() {
            Some(dispatcher) => dispatcher,
            None => {
                let event_loop = EventLoop::new()?;
                let dispatcher = event_loop.dispatcher().clone();
                tracing::debug!("started logger event loop");
                *self.event_loop.lock() = Some(event_loop);
                dispatcher
            }
        };
        *resolved = Some(dispatcher.clone());
        Ok(dispatcher)
    }

    /// The dispatcher, if anything has been dispatched yet
    fn resolved(&self) -> Option<Dispatcher> {
        self.dispatcher.lock().clone()
    }
}

/// Effective configuration of one logger
#[derive(Clone)]
struct LoggerConfig {
    level: Level,
    prefix: Option<String>,
    context: Metadata,
    filters: Vec<SharedFilter>,
    enrichers: Vec<SharedEnricher>,
    aggregators: Vec<SharedAggregator>,
    transports: Arc<Vec<SharedTransport>>,
    mode: DispatchMode,
    levels: LevelRegistry,
    format: FormatterConfig,
    errors: ErrorSink,
    retry: Option<RetryOptions>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            prefix: None,
            context: Metadata::new(),
            filters: Vec::new(),
            enrichers: Vec::new(),
            aggregators: Vec::new(),
            transports: Arc::new(Vec::new()),
            mode: DispatchMode::Sync,
            levels: LevelRegistry::new(),
            format: FormatterConfig::default(),
            errors: ErrorSink::new(),
            retry: None,
        }
    }
}

/// Structured logger with filters, enrichers, transports and aggregators
///
/// # Example
///
/// ```
/// use relay_logger::prelude::*;
/// use std::sync::Arc;
///
/// let memory = Arc::new(MemoryTransport::new());
/// let logger = Logger::builder()
///     .level(Level::WARN)
///     .shared_transport(memory.clone())
///     .build();
///
/// logger.debug("x").unwrap();
/// logger.warn("y").unwrap();
/// logger.error("z").unwrap();
///
/// assert_eq!(memory.messages(), vec!["y", "z"]);
/// ```
#[derive(Clone)]
pub struct Logger {
    config: LoggerConfig,
    formatter: Formatter,
    runtime: Arc<DeferredRuntime>,
}

impl Logger {
    /// Synchronous logger at `info` with no transports
    #[must_use]
    pub fn new() -> Self {
        LoggerBuilder::new().build()
    }

    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }

    fn from_config(config: LoggerConfig, runtime: Arc<DeferredRuntime>) -> Self {
        let formatter = Formatter::new(config.format.clone());
        let mut logger = Self {
            config,
            formatter,
            runtime,
        };
        if let Some(options) = logger.config.retry.clone() {
            let wrapped = logger
                .config
                .transports
                .iter()
                .map(|t| logger.wrap_with_retry(t.clone(), &options))
                .collect();
            logger.config.transports = Arc::new(wrapped);
        }
        logger
    }

    fn wrap_with_retry(&self, transport: SharedTransport, options: &RetryOptions) -> SharedTransport {
        let mut retry = RetryTransport::new(transport, options.clone())
            .with_error_sink(self.config.errors.clone());
        match self.runtime.dispatcher() {
            Ok(dispatcher) => retry = retry.with_dispatcher(dispatcher),
            Err(e) => tracing::error!(error = %e, "no dispatcher for retry transport; falling back to the ambient runtime"),
        }
        Arc::new(retry)
    }

    /// Create a child logger.
    ///
    /// The child takes a snapshot of this logger's configuration merged with
    /// `options`; later changes to either logger do not affect the other.
    pub fn create_child(&self, options: ChildOptions) -> Logger {
        let parent = &self.config;
        let mut format = parent.format.clone();
        format.custom_colors.extend(options.custom_colors);
        if let Some(timestamp) = options.timestamp {
            format.timestamp = timestamp;
        }

        let config = LoggerConfig {
            level: options.level.unwrap_or_else(|| parent.level.clone()),
            prefix: options.prefix.or_else(|| parent.prefix.clone()),
            context: parent.context.merged(&options.context),
            filters: concat(&parent.filters, options.filters),
            enrichers: concat(&parent.enrichers, options.enrichers),
            aggregators: concat(&parent.aggregators, options.aggregators),
            transports: Arc::clone(&parent.transports),
            mode: options.dispatch_mode.unwrap_or(parent.mode),
            levels: parent.levels.merged(&options.levels),
            format,
            errors: {
                let mut errors = parent.errors.clone();
                for listener in options.error_listeners {
                    errors.add(listener);
                }
                errors
            },
            retry: parent.retry.clone(),
        };

        let mut child = Logger {
            formatter: Formatter::new(config.format.clone()),
            config,
            runtime: Arc::clone(&self.runtime),
        };
        if let Some(transports) = options.transports {
            child.config.transports = Arc::new(Vec::new());
            for transport in transports {
                child.add_transport(transport);
            }
        }
        child
    }

    /// Log a record at `level`.
    ///
    /// Records below the threshold, and records at `silent`, are dropped
    /// without side effects. In [`DispatchMode::Sync`] the first transport
    /// error is returned once every transport and aggregator has run; in
    /// [`DispatchMode::Deferred`] this returns before any delivery completes.
    pub fn log(&self, level: Level, message: impl Into<String>, metadata: Option<Metadata>) -> Result<()> {
        if !self.is_enabled(&level) {
            return Ok(());
        }

        let record = self.build_record(level, message.into(), metadata);
        if !self.config.filters.iter().all(|f| f.should_emit(&record)) {
            return Ok(());
        }

        let record = self.enrich(record);
        let result = match self.config.mode {
            DispatchMode::Sync => self.dispatch_sync(&record),
            DispatchMode::Deferred => {
                self.dispatch_deferred(&record);
                Ok(())
            }
        };
        self.aggregate(&record);
        result
    }

    /// Log at a level given by name, e.g. a registered custom level
    pub fn log_with_level(&self, level: &str, message: impl Into<String>, metadata: Option<Metadata>) -> Result<()> {
        self.log(Level::new(level), message, metadata)
    }

    /// Whether a record at `level` would pass the threshold
    pub fn is_enabled(&self, level: &Level) -> bool {
        self.config.levels.passes(level, &self.config.level)
    }

    fn build_record(&self, level: Level, message: String, metadata: Option<Metadata>) -> LogRecord {
        let merged = match metadata {
            Some(fields) => self.config.context.merged(&fields),
            None => self.config.context.clone(),
        };
        let mut record = LogRecord::new(level, message);
        if !merged.is_empty() {
            record.metadata = Some(merged);
        }
        record.prefix = self.config.prefix.clone();
        record
    }

    fn enrich(&self, record: LogRecord) -> LogRecord {
        let mut current = record.clone();
        for enricher in &self.config.enrichers {
            let outcome = catch_unwind(AssertUnwindSafe(|| enricher.enrich(&current)));
            let error = match outcome {
                Ok(Ok(next)) => {
                    current = next;
                    continue;
                }
                Ok(Err(e)) => e,
                Err(panic_info) => LoggerError::Panicked(panic_message(panic_info.as_ref())),
            };
            self.config.errors.emit(ErrorEvent::new(ErrorKind::Enricher, error));
            return record;
        }
        current
    }

    fn dispatch_sync(&self, record: &LogRecord) -> Result<()> {
        let mut first_error = None;

        for transport in self.config.transports.iter() {
            let outcome = catch_unwind(AssertUnwindSafe(|| transport.write(record, &self.formatter)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(panic_info) => {
                    let msg = panic_message(panic_info.as_ref());
                    tracing::error!(transport = transport.name(), panic = %msg, "transport panicked");
                    LoggerError::Panicked(msg)
                }
            };
            if first_error.is_none() {
                first_error = Some(error);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn dispatch_deferred(&self, record: &LogRecord) {
        let dispatcher = match self.runtime.dispatcher() {
            Ok(dispatcher) => dispatcher,
            Err(e) => {
                let error = Arc::new(e);
                for transport in self.config.transports.iter() {
                    self.config.errors.emit(ErrorEvent {
                        kind: ErrorKind::Transport,
                        error: Arc::clone(&error),
                        source_name: Some(transport.name().to_string()),
                    });
                }
                return;
            }
        };

        for transport in self.config.transports.iter() {
            let transport = Arc::clone(transport);
            let record = record.clone();
            let formatter = self.formatter.clone();
            let errors = self.config.errors.clone();

            dispatcher.spawn(async move {
                let name = transport.name().to_string();
                let result = if transport.supports_async() {
                    let write = tokio::spawn(async move { transport.write_async(&record, &formatter).await });
                    match write.await {
                        Ok(result) => result,
                        Err(e) if e.is_panic() => Err(LoggerError::Panicked(panic_message(e.into_panic().as_ref()))),
                        Err(e) => Err(LoggerError::other(e.to_string())),
                    }
                } else {
                    tokio::task::yield_now().await;
                    match catch_unwind(AssertUnwindSafe(|| transport.write(&record, &formatter))) {
                        Ok(result) => result,
                        Err(panic_info) => Err(LoggerError::Panicked(panic_message(panic_info.as_ref()))),
                    }
                };
                if let Err(e) = result {
                    errors.emit(ErrorEvent::new(ErrorKind::Transport, e).with_source(name));
                }
            });
        }
    }

    fn aggregate(&self, record: &LogRecord) {
        for aggregator in &self.config.aggregators {
            let outcome = catch_unwind(AssertUnwindSafe(|| aggregator.aggregate(record, &self.formatter)));
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(panic_info) => LoggerError::Panicked(panic_message(panic_info.as_ref())),
            };
            self.config.errors.emit(ErrorEvent::new(ErrorKind::Aggregator, error));
        }
    }

    #[inline]
    pub fn boring(&self, message: impl Into<String>) -> Result<()> {
        self.log(Level::BORING, message, None)
    }

    #[inline]
    pub fn debug(&self, message: impl Into<String>) -> Result<()> {
        self.log(Level::DEBUG, message, None)
    }

    #[inline]
    pub fn info(&self, message: impl Into<String>) -> Result<()> {
        self.log(Level::INFO, message, None)
    }

    #[inline]
    pub fn warn(&self, message: impl Into<String>) -> Result<()> {
        self.log(Level::WARN, message, None)
    }

    #[inline]
    pub fn error(&self, message: impl Into<String>) -> Result<()> {
        self.log(Level::ERROR, message, None)
    }

    /// Never emits anything
    #[inline]
    pub fn silent(&self, _message: impl Into<String>) {}

    pub fn boring_with(&self, message: impl Into<String>, metadata: Metadata) -> Result<()> {
        self.log(Level::BORING, message, Some(metadata))
    }

    pub fn debug_with(&self, message: impl Into<String>, metadata: Metadata) -> Result<()> {
        self.log(Level::DEBUG, message, Some(metadata))
    }

    pub fn info_with(&self, message: impl Into<String>, metadata: Metadata) -> Result<()> {
        self.log(Level::INFO, message, Some(metadata))
    }

    pub fn warn_with(&self, message: impl Into<String>, metadata: Metadata) -> Result<()> {
        self.log(Level::WARN, message, Some(metadata))
    }

    pub fn error_with(&self, message: impl Into<String>, metadata: Metadata) -> Result<()> {
        self.log(Level::ERROR, message, Some(metadata))
    }

    /// Start a timer that logs `"{label} took {n}ms"` at `info` when ended
    pub fn time(&self, label: impl Into<String>) -> Timer<'_> {
        Timer {
            logger: self,
            label: label.into(),
            started: Instant::now(),
            ended: false,
        }
    }

    pub fn add_filter(&mut self, filter: SharedFilter) {
        self.config.filters.push(filter);
    }

    pub fn add_enricher(&mut self, enricher: SharedEnricher) {
        self.config.enrichers.push(enricher);
    }

    pub fn add_aggregator(&mut self, aggregator: SharedAggregator) {
        self.config.aggregators.push(aggregator);
    }

    /// Add a transport to this logger only; loggers sharing the list keep theirs
    pub fn add_transport(&mut self, transport: SharedTransport) {
        let transport = match self.config.retry.clone() {
            Some(options) => self.wrap_with_retry(transport, &options),
            None => transport,
        };
        Arc::make_mut(&mut self.config.transports).push(transport);
    }

    pub fn add_error_listener(&mut self, listener: ErrorListener) {
        self.config.errors.add(listener);
    }

    pub fn set_level(&mut self, level: Level) {
        self.config.level = level;
    }

    pub fn set_dispatch_mode(&mut self, mode: DispatchMode) {
        self.config.mode = mode;
    }

    pub fn register_level(&mut self, name: impl Into<String>, priority: u32) {
        self.config.levels.register(name, priority);
    }

    pub fn level(&self) -> &Level {
        &self.config.level
    }

    pub fn prefix(&self) -> Option<&str> {
        self.config.prefix.as_deref()
    }

    pub fn context(&self) -> &Metadata {
        &self.config.context
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        self.config.mode
    }

    pub fn timestamp_enabled(&self) -> bool {
        self.config.format.timestamp
    }

    pub fn formatter(&self) -> &Formatter {
        &self.formatter
    }

    pub fn levels(&self) -> &LevelRegistry {
        &self.config.levels
    }

    pub fn transports(&self) -> &[SharedTransport] {
        &self.config.transports
    }

    /// Whether two loggers use the very same transport list
    pub fn shares_transports_with(&self, other: &Logger) -> bool {
        Arc::ptr_eq(&self.config.transports, &other.config.transports)
    }

    /// Flush every aggregator; pending flushes are awaited together
    pub fn flush_aggregators(&self) -> FlushOutcome {
        FlushOutcome::join_all(self.config.aggregators.iter().map(|a| a.flush()).collect())
    }

    /// Flush every transport, returning the first error
    pub fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for transport in self.config.transports.iter() {
            if let Err(e) = transport.flush() {
                tracing::error!(transport = transport.name(), error = %e, "transport flush failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Block until deferred deliveries have finished
    ///
    /// Must not be called from the thread driving the dispatcher's runtime;
    /// use [`Logger::idle`] there. Returns `false` if `timeout` elapsed first.
    pub fn drain(&self, timeout: Duration) -> bool {
        match self.runtime.resolved() {
            Some(dispatcher) => dispatcher.wait_idle(timeout),
            None => true,
        }
    }

    /// Wait until deferred deliveries have finished
    pub async fn idle(&self) {
        if let Some(dispatcher) = self.runtime.resolved() {
            dispatcher.idle().await;
        }
    }

    /// Drain deferred deliveries, then flush transports
    ///
    /// # Returns
    ///
    /// `true` if everything drained within `timeout` and flushed cleanly
    ///
    /// # Example
    ///
    /// ```no_run
    /// use relay_logger::prelude::*;
    /// use std::time::Duration;
    ///
    /// let logger = Logger::builder()
    ///     .dispatch_mode(DispatchMode::Deferred)
    ///     .transport(ConsoleTransport::new())
    ///     .build();
    /// logger.info("Important message").unwrap();
    ///
    /// if !logger.shutdown(Duration::from_secs(10)) {
    ///     eprintln!("Warning: logger shutdown timed out");
    /// }
    /// ```
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let drained = self.drain(timeout);
        if !drained {
            tracing::warn!("deferred deliveries did not finish within {:?}; some records may be lost", timeout);
        }
        drained && self.flush().is_ok()
    }
}

fn concat<T: Clone>(parent: &[T], child: Vec<T>) -> Vec<T> {
    let mut merged = parent.to_vec();
    merged.extend(child);
    merged
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.config.level)
            .field("prefix", &self.config.prefix)
            .field("mode", &self.config.mode)
            .field("transports", &self.config.transports.len())
            .field("filters", &self.config.filters.len())
            .field("enrichers", &self.config.enrichers.len())
            .field("aggregators", &self.config.aggregators.len())
            .finish()
    }
}

/// Measures a span of work and logs its duration once
pub struct Timer<'a> {
    logger: &'a Logger,
    label: String,
    started: Instant,
    ended: bool,
}

impl Timer<'_> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Log the elapsed time; later calls do nothing
    pub fn end(&mut self) -> Result<()> {
        if self.ended {
            return Ok(());
        }
        self.ended = true;
        let millis = self.started.elapsed().as_millis();
        self.logger.info(format!("{} took {}ms", self.label, millis))
    }
}

/// Overrides and additions for [`Logger::create_child`]
#[derive(Clone, Default)]
pub struct ChildOptions {
    level: Option<Level>,
    prefix: Option<String>,
    context: Metadata,
    filters: Vec<SharedFilter>,
    enrichers: Vec<SharedEnricher>,
    aggregators: Vec<SharedAggregator>,
    transports: Option<Vec<SharedTransport>>,
    dispatch_mode: Option<DispatchMode>,
    levels: LevelRegistry,
    custom_colors: HashMap<String, String>,
    timestamp: Option<bool>,
    error_listeners: Vec<ErrorListener>,
}

impl ChildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Context fields; keys already in the parent's context are overridden
    #[must_use = "builder methods return a new value"]
    pub fn context(mut self, context: Metadata) -> Self {
        self.context.extend(&context);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn context_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key, value);
        self
    }

    /// Runs after the parent's filters
    #[must_use = "builder methods return a new value"]
    pub fn filter(mut self, filter: SharedFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Runs after the parent's enrichers
    #[must_use = "builder methods return a new value"]
    pub fn enricher(mut self, enricher: SharedEnricher) -> Self {
        self.enrichers.push(enricher);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn aggregator(mut self, aggregator: SharedAggregator) -> Self {
        self.aggregators.push(aggregator);
        self
    }

    /// Replace the inherited transport list entirely
    #[must_use = "builder methods return a new value"]
    pub fn transports(mut self, transports: Vec<SharedTransport>) -> Self {
        self.transports = Some(transports);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = Some(mode);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn custom_level(mut self, name: impl Into<String>, priority: u32) -> Self {
        self.levels.register(name, priority);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn custom_color(mut self, level: impl Into<String>, color: impl Into<String>) -> Self {
        self.custom_colors.insert(level.into(), color.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn timestamp(mut self, enabled: bool) -> Self {
        self.timestamp = Some(enabled);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn error_listener(mut self, listener: ErrorListener) -> Self {
        self.error_listeners.push(listener);
        self
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use relay_logger::prelude::*;
/// use std::sync::Arc;
///
/// let logger = Logger::builder()
///     .level(Level::DEBUG)
///     .prefix("API")
///     .context_field("service", "billing")
///     .transport(ConsoleTransport::new())
///     .dispatch_mode(DispatchMode::Deferred)
///     .on_error(Arc::new(|event| {
///         eprintln!("ALERT: {}", event);
///     }))
///     .build();
/// ```
pub struct LoggerBuilder {
    config: LoggerConfig,
    transports: Vec<SharedTransport>,
    dispatcher: Option<Dispatcher>,
}

impl LoggerBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            transports: Vec::new(),
            dispatcher: None,
        }
    }

    /// Set the level threshold
    #[must_use = "builder methods return a new value"]
    pub fn level(mut self, level: Level) -> Self {
        self.config.level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = Some(prefix.into());
        self
    }

    /// Fields merged into every record's metadata
    #[must_use = "builder methods return a new value"]
    pub fn context(mut self, context: Metadata) -> Self {
        self.config.context.extend(&context);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn context_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.context.insert(key, value);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.config.filters.push(Arc::new(filter));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_filter(mut self, filter: SharedFilter) -> Self {
        self.config.filters.push(filter);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn enricher<E: Enricher + 'static>(mut self, enricher: E) -> Self {
        self.config.enrichers.push(Arc::new(enricher));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_enricher(mut self, enricher: SharedEnricher) -> Self {
        self.config.enrichers.push(enricher);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn aggregator<A: Aggregator + 'static>(mut self, aggregator: A) -> Self {
        self.config.aggregators.push(Arc::new(aggregator));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_aggregator(mut self, aggregator: SharedAggregator) -> Self {
        self.config.aggregators.push(aggregator);
        self
    }

    /// Add a transport
    #[must_use = "builder methods return a new value"]
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transports.push(Arc::new(transport));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_transport(mut self, transport: SharedTransport) -> Self {
        self.transports.push(transport);
        self
    }

    /// Choose between synchronous and deferred delivery
    ///
    /// If not called, the logger writes synchronously.
    #[must_use = "builder methods return a new value"]
    pub fn dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Run deferred deliveries on this dispatcher
    #[must_use = "builder methods return a new value"]
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn custom_level(mut self, name: impl Into<String>, priority: u32) -> Self {
        self.config.levels.register(name, priority);
        self
    }

    /// Color name used for `level` when colorizing
    #[must_use = "builder methods return a new value"]
    pub fn custom_color(mut self, level: impl Into<String>, color: impl Into<String>) -> Self {
        self.config.format.custom_colors.insert(level.into(), color.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn timestamp(mut self, enabled: bool) -> Self {
        self.config.format.timestamp = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.config.format.timestamp_format = format;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn output_format(mut self, output: OutputFormat) -> Self {
        self.config.format.output = output;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn colorize(mut self, colorize: bool) -> Self {
        self.config.format.colorize = colorize;
        self
    }

    /// Register a listener for transport, enricher and aggregator errors
    #[must_use = "builder methods return a new value"]
    pub fn on_error(mut self, listener: ErrorListener) -> Self {
        self.config.errors.add(listener);
        self
    }

    /// Wrap every transport in a [`RetryTransport`] with these options
    #[must_use = "builder methods return a new value"]
    pub fn retry(mut self, options: RetryOptions) -> Self {
        self.config.retry = Some(options);
        self
    }

    /// Build the Logger
    pub fn build(self) -> Logger {
        let mut config = self.config;
        config.transports = Arc::new(self.transports);
        Logger::from_config(config, Arc::new(DeferredRuntime::new(self.dispatcher)))
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
