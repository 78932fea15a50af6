//! Core logger types and traits

pub mod backoff;
pub mod circuit_breaker;
pub mod dispatcher;
pub mod enricher;
pub mod error;
pub mod event;
pub mod filter;
pub mod formatter;
pub mod level;
pub mod logger;
pub mod metadata;
pub mod metrics;
pub mod record;
pub mod settings;
pub mod transport;

pub use backoff::Backoff;
pub use circuit_breaker::{Admission, CircuitBreaker, CircuitState, DecayPolicy, Transition};
pub use dispatcher::{Dispatcher, EventLoop, DEFAULT_SHUTDOWN_TIMEOUT};
pub use enricher::{
    enrich_fn, try_enrich_fn, Enricher, EnrichmentPipeline, MetadataEnricher, SharedEnricher,
};
pub use error::{LoggerError, Result};
pub use event::{ErrorEvent, ErrorKind, ErrorListener, ErrorSink};
pub use filter::{
    shared_filter, CompositeFilter, FieldFilter, Filter, LevelFilter, MetadataFilter, NotFilter,
    OrFilter, PredicateFilter, PrefixFilter, SharedFilter,
};
pub use formatter::{Formatter, FormatterConfig, OutputFormat, TimestampFormat};
pub use level::{Level, LevelRegistry, UNKNOWN_LEVEL_PRIORITY};
pub use logger::{ChildOptions, DispatchMode, Logger, LoggerBuilder, Timer};
pub use metadata::Metadata;
pub use metrics::DeliveryMetrics;
pub use record::LogRecord;
pub use settings::{LoggerSettings, RetrySettings};
pub use transport::{deliver, SharedTransport, Transport};
