//! Console transport implementation

use crate::core::{Formatter, Level, LogRecord, Result, Transport};
use async_trait::async_trait;
use std::io::Write;

/// Writes formatted records to stdout; `error` records go to stderr
#[derive(Debug, Clone, Default)]
pub struct ConsoleTransport {
    stderr_for_all: bool,
}

impl ConsoleTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send every record to stderr
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            stderr_for_all: true,
        }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let output = formatter.format(record);

        // Route error records to stderr, others to stdout
        if self.stderr_for_all || record.level == Level::ERROR {
            writeln!(std::io::stderr().lock(), "{}", output)?;
        } else {
            writeln!(std::io::stdout().lock(), "{}", output)?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
