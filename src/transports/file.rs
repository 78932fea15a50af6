//! File transport implementation

use crate::core::{Formatter, LogRecord, LoggerError, Result, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends one formatted record per line
pub struct FileTransport {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    auto_flush: bool,
}

impl FileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation(
                    "opening log file",
                    format!("cannot open {}", path.display()),
                    e,
                )
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
            auto_flush: false,
        })
    }

    /// Flush after every record
    #[must_use]
    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Transport for FileTransport {
    fn write(&self, record: &LogRecord, formatter: &Formatter) -> Result<()> {
        let mut output = formatter.format(record);
        output.push('\n');

        let mut writer = self.writer.lock();
        writer.write_all(output.as_bytes())?;
        if self.auto_flush {
            writer.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileTransport {
    fn drop(&mut self) {
        // Ensure all buffered data is flushed to disk
        let _ = Transport::flush(self);
    }
}
