//! Per-transport filtering

use crate::core::filter::SharedFilter;
use crate::core::transport::{deliver, SharedTransport, Transport};
use crate::core::{Formatter, LogRecord, Result};
use async_trait::async_trait;

/// Forwards only records that pass every filter
pub struct FilterableTransport {
    inner: SharedTransport,
    name: String,
    filters: Vec<SharedFilter>,
}

impl FilterableTransport {
    pub fn new(inner: SharedTransport, filters: Vec<SharedFilter>) -> Self {
        Self {
            name: format!("filtered({})", inner.name()),
            inner,
            filters,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_filter(mut self, filter: SharedFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn inner(&self) -> &SharedTransport {
        &self.inner
    }

    fn accepts(&self, record: &LogRecord) -> bool {
        self.filters.iter().all(|f| f.should_emit(record))
    }
}

#[async_trait]
impl Transport for FilterableTransport {
    fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        if self.accepts(record) {
            self.inner.write(record, formatter)
        } else {
            Ok(())
        }
    }

    fn supports_async(&self) -> bool {
        self.inner.supports_async()
    }

    async fn write_async(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        if !self.accepts(record) {
            return Ok(());
        }
        deliver(self.inner.as_ref(), record, formatter).await
    }

    fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    fn name(&self) -> &str {
        &self.name
    }
}
