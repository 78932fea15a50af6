//! # Relay Logger
//!
//! A structured logging pipeline: records pass a level threshold, filters and
//! enrichers, then fan out to transports and aggregators.
//!
//! ## Features
//!
//! - **Structured records**: JSON metadata, logger context, prefixes and custom levels
//! - **Child loggers**: configuration snapshots merged from their parent
//! - **Sync or deferred dispatch**: write on the caller's thread, or hand writes
//!   to a Tokio dispatcher and receive failures as error events
//! - **Reliable transports**: retry with backoff and circuit breaking, dead
//!   letter capture, breaker-only decorator with delivery metrics
//! - **Aggregation**: size-triggered, interval-triggered and composite batching
//!
//! ## Example
//!
//! ```
//! use relay_logger::prelude::*;
//! use std::sync::Arc;
//!
//! let memory = Arc::new(MemoryTransport::new());
//! let logger = Logger::builder()
//!     .level(Level::DEBUG)
//!     .context_field("service", "checkout")
//!     .shared_transport(memory.clone())
//!     .build();
//!
//! let requests = logger.create_child(ChildOptions::new().prefix("HTTP"));
//! requests
//!     .info_with("request served", Metadata::new().with_field("status", 200))
//!     .unwrap();
//!
//! let record = &memory.records()[0];
//! assert_eq!(record.prefix.as_deref(), Some("HTTP"));
//! assert_eq!(record.field("service"), Some(&serde_json::json!("checkout")));
//! ```

pub mod aggregation;
pub mod core;
pub mod macros;
pub mod transports;

pub mod prelude {
    pub use crate::aggregation::{
        Aggregator, BatchAggregator, BufferedRecord, CompositeAggregator, FlushCallback,
        FlushOutcome, SharedAggregator, TimeBasedAggregator,
    };
    pub use crate::core::{
        enrich_fn, shared_filter, try_enrich_fn, ChildOptions, CircuitState, CompositeFilter,
        DeliveryMetrics, DispatchMode, Dispatcher, Enricher, EnrichmentPipeline, ErrorEvent,
        ErrorKind, ErrorListener, EventLoop, FieldFilter, Filter, Formatter, FormatterConfig,
        Level, LevelFilter, LevelRegistry, LogRecord, Logger, LoggerBuilder, LoggerError,
        LoggerSettings, Metadata, MetadataEnricher, MetadataFilter, NotFilter, OrFilter,
        OutputFormat, PredicateFilter, PrefixFilter, Result, SharedEnricher, SharedFilter,
        SharedTransport, TimestampFormat, Transport, DEFAULT_SHUTDOWN_TIMEOUT,
    };
    pub use crate::transports::{
        CircuitBreakerOptions, CircuitBreakerTransport, ConsoleTransport, DeadLetter,
        DeadLetterOptions, DeadLetterQueue, FileTransport, FilterableTransport, MemoryTransport,
        RetryOptions, RetryTransport,
    };
}

pub use crate::core::{
    ChildOptions, DeliveryMetrics, DispatchMode, Dispatcher, ErrorEvent, ErrorKind, EventLoop,
    Formatter, Level, LogRecord, Logger, LoggerBuilder, LoggerError, LoggerSettings, Metadata,
    Result, Transport, DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use crate::transports::{
    CircuitBreakerTransport, ConsoleTransport, DeadLetterQueue, FileTransport, MemoryTransport,
    RetryTransport,
};
