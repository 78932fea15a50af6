//! Record enrichment
//!
//! Enrichers are pure functions from record to record. They never mutate the
//! record they receive; a failing enricher reports an error and the logger
//! falls back to the unenriched record.

use super::error::Result;
use super::metadata::Metadata;
use super::record::LogRecord;
use std::sync::Arc;

pub trait Enricher: Send + Sync {
    fn enrich(&self, record: &LogRecord) -> Result<LogRecord>;
}

pub type SharedEnricher = Arc<dyn Enricher>;

pub struct FnEnricher<F>(F);

impl<F> Enricher for FnEnricher<F>
where
    F: Fn(&LogRecord) -> LogRecord + Send + Sync,
{
    fn enrich(&self, record: &LogRecord) -> Result<LogRecord> {
        Ok((self.0)(record))
    }
}

pub struct TryFnEnricher<F>(F);

impl<F> Enricher for TryFnEnricher<F>
where
    F: Fn(&LogRecord) -> Result<LogRecord> + Send + Sync,
{
    fn enrich(&self, record: &LogRecord) -> Result<LogRecord> {
        (self.0)(record)
    }
}

/// Enricher from an infallible closure
pub fn enrich_fn<F>(f: F) -> SharedEnricher
where
    F: Fn(&LogRecord) -> LogRecord + Send + Sync + 'static,
{
    Arc::new(FnEnricher(f))
}

/// Enricher from a fallible closure
pub fn try_enrich_fn<F>(f: F) -> SharedEnricher
where
    F: Fn(&LogRecord) -> Result<LogRecord> + Send + Sync + 'static,
{
    Arc::new(TryFnEnricher(f))
}

enum FieldSource {
    Static(Metadata),
    Dynamic(Box<dyn Fn() -> Metadata + Send + Sync>),
}

/// Adds fields to every record's metadata; added fields win over existing ones
pub struct MetadataEnricher {
    source: FieldSource,
}

impl MetadataEnricher {
    pub fn static_fields(fields: Metadata) -> Self {
        Self {
            source: FieldSource::Static(fields),
        }
    }

    /// Fields computed anew for every record
    pub fn dynamic_fields<F>(fields: F) -> Self
    where
        F: Fn() -> Metadata + Send + Sync + 'static,
    {
        Self {
            source: FieldSource::Dynamic(Box::new(fields)),
        }
    }

    pub fn context(context: Metadata) -> Self {
        Self::static_fields(context)
    }

    /// `pid`, `hostname` and `version`
    pub fn process_info() -> Self {
        let hostname = gethostname::gethostname().to_string_lossy().to_string();
        Self::static_fields(
            Metadata::new()
                .with_field("pid", std::process::id())
                .with_field("hostname", hostname)
                .with_field("version", env!("CARGO_PKG_VERSION")),
        )
    }

    /// `environment` (from `APP_ENV`, default `development`), `platform` and `arch`
    pub fn environment_info() -> Self {
        let environment =
            std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        Self::static_fields(
            Metadata::new()
                .with_field("environment", environment)
                .with_field("platform", std::env::consts::OS)
                .with_field("arch", std::env::consts::ARCH),
        )
    }
}

impl Enricher for MetadataEnricher {
    fn enrich(&self, record: &LogRecord) -> Result<LogRecord> {
        let enriched = match &self.source {
            FieldSource::Static(fields) => record.extended(fields),
            FieldSource::Dynamic(compute) => record.extended(&compute()),
        };
        Ok(enriched)
    }
}

/// Ordered chain of enrichers
#[derive(Clone, Default)]
pub struct EnrichmentPipeline {
    enrichers: Vec<SharedEnricher>,
}

impl EnrichmentPipeline {
    pub fn new(enrichers: Vec<SharedEnricher>) -> Self {
        Self { enrichers }
    }

    pub fn add(&mut self, enricher: SharedEnricher) -> &mut Self {
        self.enrichers.push(enricher);
        self
    }

    /// Run every enricher in order, stopping at the first error
    pub fn process(&self, record: &LogRecord) -> Result<LogRecord> {
        self.enrichers
            .iter()
            .try_fold(record.clone(), |current, enricher| enricher.enrich(&current))
    }

    /// Copy of the enricher list
    pub fn enrichers(&self) -> Vec<SharedEnricher> {
        self.enrichers.clone()
    }
}

impl Enricher for EnrichmentPipeline {
    fn enrich(&self, record: &LogRecord) -> Result<LogRecord> {
        self.process(record)
    }
}
