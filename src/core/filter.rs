//! Record filters
//!
//! A filter decides whether a record is emitted. Loggers run their filters in
//! registration order and emit only when every filter agrees.
//!
//! # Example
//!
//! ```
//! use relay_logger::prelude::*;
//!
//! let filter = OrFilter::new(vec![
//!     shared_filter(LevelFilter::new([Level::ERROR])),
//!     shared_filter(FieldFilter::new("audit", true)),
//! ]);
//!
//! let record = LogRecord::new(Level::INFO, "login")
//!     .with_metadata(Metadata::new().with_field("audit", true));
//! assert!(filter.should_emit(&record));
//! ```

use super::level::Level;
use super::metadata::Metadata;
use super::record::LogRecord;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

pub trait Filter: Send + Sync {
    fn should_emit(&self, record: &LogRecord) -> bool;
}

impl<F> Filter for F
where
    F: Fn(&LogRecord) -> bool + Send + Sync,
{
    fn should_emit(&self, record: &LogRecord) -> bool {
        self(record)
    }
}

pub type SharedFilter = Arc<dyn Filter>;

/// Wrap a filter for use in combinators and loggers
pub fn shared_filter(filter: impl Filter + 'static) -> SharedFilter {
    Arc::new(filter)
}

/// All filters must pass; an empty list passes everything
#[derive(Clone, Default)]
pub struct CompositeFilter {
    filters: Vec<SharedFilter>,
}

impl CompositeFilter {
    pub fn new(filters: Vec<SharedFilter>) -> Self {
        Self { filters }
    }
}

impl Filter for CompositeFilter {
    fn should_emit(&self, record: &LogRecord) -> bool {
        self.filters.iter().all(|f| f.should_emit(record))
    }
}

/// Any filter may pass; an empty list blocks everything
#[derive(Clone, Default)]
pub struct OrFilter {
    filters: Vec<SharedFilter>,
}

impl OrFilter {
    pub fn new(filters: Vec<SharedFilter>) -> Self {
        Self { filters }
    }
}

impl Filter for OrFilter {
    fn should_emit(&self, record: &LogRecord) -> bool {
        self.filters.iter().any(|f| f.should_emit(record))
    }
}

#[derive(Clone)]
pub struct NotFilter {
    inner: SharedFilter,
}

impl NotFilter {
    pub fn new(inner: SharedFilter) -> Self {
        Self { inner }
    }
}

impl Filter for NotFilter {
    fn should_emit(&self, record: &LogRecord) -> bool {
        !self.inner.should_emit(record)
    }
}

pub struct PredicateFilter {
    predicate: Box<dyn Fn(&LogRecord) -> bool + Send + Sync>,
}

impl PredicateFilter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&LogRecord) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
        }
    }
}

impl Filter for PredicateFilter {
    fn should_emit(&self, record: &LogRecord) -> bool {
        (self.predicate)(record)
    }
}

/// Passes records whose level is in the allowed set
#[derive(Debug, Clone)]
pub struct LevelFilter {
    allowed: HashSet<Level>,
}

impl LevelFilter {
    pub fn new(allowed: impl IntoIterator<Item = Level>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl Filter for LevelFilter {
    fn should_emit(&self, record: &LogRecord) -> bool {
        self.allowed.contains(&record.level)
    }
}

/// Passes records whose prefix is in the allowed set.
///
/// A record without a prefix passes only when `""` is allowed.
#[derive(Debug, Clone)]
pub struct PrefixFilter {
    allowed: HashSet<String>,
}

impl PrefixFilter {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Filter for PrefixFilter {
    fn should_emit(&self, record: &LogRecord) -> bool {
        let prefix = record.prefix.as_deref().unwrap_or("");
        self.allowed.contains(prefix)
    }
}

/// Passes records whose metadata contains every required pair
#[derive(Debug, Clone)]
pub struct MetadataFilter {
    required: Metadata,
}

impl MetadataFilter {
    pub fn new(required: Metadata) -> Self {
        Self { required }
    }
}

impl Filter for MetadataFilter {
    fn should_emit(&self, record: &LogRecord) -> bool {
        match &record.metadata {
            None => self.required.is_empty(),
            Some(metadata) => self
                .required
                .iter()
                .all(|(key, value)| metadata.get(key) == Some(value)),
        }
    }
}

/// Passes records where one metadata field equals an expected value
#[derive(Debug, Clone)]
pub struct FieldFilter {
    field: String,
    expected: Value,
}

impl FieldFilter {
    pub fn new(field: impl Into<String>, expected: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
        }
    }
}

impl Filter for FieldFilter {
    fn should_emit(&self, record: &LogRecord) -> bool {
        record.field(&self.field) == Some(&self.expected)
    }
}
