//! Transport trait for log output destinations
//!
//! A transport persists or transmits one record. Every transport supports a
//! synchronous `write`; transports that can do non-blocking I/O also advertise
//! [`Transport::supports_async`] and override [`Transport::write_async`].
//!
//! # Example
//!
//! ```no_run
//! use relay_logger::core::{Formatter, LogRecord, Result, Transport};
//! use async_trait::async_trait;
//!
//! struct MyTransport;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
//!         println!("{}", formatter.format(record));
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "my_transport"
//!     }
//! }
//! ```

use super::error::Result;
use super::formatter::Formatter;
use super::record::LogRecord;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a record, blocking the caller until done
    fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()>;

    /// Whether [`Transport::write_async`] does real non-blocking work
    fn supports_async(&self) -> bool {
        false
    }

    /// Deliver a record without blocking the runtime
    async fn write_async(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        self.write(record, formatter)
    }

    /// Flush buffered output
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Shared handle to a transport
pub type SharedTransport = Arc<dyn Transport>;

/// Deliver through the async path when the transport supports it
pub async fn deliver(
    transport: &dyn Transport,
    record: &LogRecord,
    formatter: &Formatter,
) -> Result<()> {
    if transport.supports_async() {
        transport.write_async(record, formatter).await
    } else {
        transport.write(record, formatter)
    }
}
