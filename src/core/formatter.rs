//! Record formatting
//!
//! The formatter is the "given a record, produce a string" capability that
//! transports and aggregators receive alongside every record. It supports:
//! - Text: `[timestamp] PREFIX [LEVEL] message {"meta":1}`
//! - Json: one JSON object per record, metadata fields first
//! - Logfmt: key=value pairs

use super::level::Level;
use super::record::LogRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Timestamp rendering options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// `2025-01-08 10:30:45`
    DateTime,

    /// RFC 3339 format: `2025-01-08T10:30:45+00:00`
    Rfc3339,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::DateTime => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }
}

/// Output layout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Logfmt,
}

/// Formatter settings
#[derive(Debug, Clone, PartialEq)]
pub struct FormatterConfig {
    pub output: OutputFormat,
    pub colorize: bool,
    pub timestamp: bool,
    pub timestamp_format: TimestampFormat,
    /// Level name -> color name overrides
    pub custom_colors: HashMap<String, String>,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            output: OutputFormat::Text,
            colorize: true,
            timestamp: false,
            timestamp_format: TimestampFormat::DateTime,
            custom_colors: HashMap::new(),
        }
    }
}

/// Cheaply cloneable, immutable record formatter
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: Arc<FormatterConfig>,
}

impl Formatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Plain text without colors or timestamps
    pub fn plain() -> Self {
        Self::new(FormatterConfig {
            colorize: false,
            ..FormatterConfig::default()
        })
    }

    /// JSON output without colors or timestamps
    pub fn json() -> Self {
        Self::new(FormatterConfig {
            output: OutputFormat::Json,
            colorize: false,
            ..FormatterConfig::default()
        })
    }

    pub fn config(&self) -> &FormatterConfig {
        &self.config
    }

    pub fn is_json(&self) -> bool {
        self.config.output == OutputFormat::Json
    }

    pub fn is_colorized(&self) -> bool {
        self.config.colorize
    }

    pub fn has_timestamp(&self) -> bool {
        self.config.timestamp
    }

    pub fn custom_colors(&self) -> &HashMap<String, String> {
        &self.config.custom_colors
    }

    pub fn format(&self, record: &LogRecord) -> String {
        match self.config.output {
            OutputFormat::Text => self.format_text(record),
            OutputFormat::Json => self.format_json(record),
            OutputFormat::Logfmt => self.format_logfmt(record),
        }
    }

    fn format_text(&self, record: &LogRecord) -> String {
        let mut output = String::new();

        if self.config.timestamp {
            output.push('[');
            output.push_str(&self.config.timestamp_format.format(&record.timestamp));
            output.push_str("] ");
        }

        if let Some(prefix) = record.prefix.as_deref().filter(|p| !p.is_empty()) {
            output.push_str(prefix);
            output.push(' ');
        }

        let level = record.level.as_str().to_uppercase();
        let level = if self.config.colorize {
            self.colorize_level(&record.level, level)
        } else {
            level
        };
        output.push_str(&format!("[{}] {}", level, sanitize_message(&record.message)));

        if let Some(ref metadata) = record.metadata {
            output.push(' ');
            output.push_str(&serde_json::to_string(metadata).unwrap_or_default());
        }

        output
    }

    fn format_json(&self, record: &LogRecord) -> String {
        let mut json_obj = serde_json::Map::new();

        if let Some(ref metadata) = record.metadata {
            for (key, value) in metadata.iter() {
                json_obj.insert(key.clone(), value.clone());
            }
        }

        json_obj.insert(
            "level".to_string(),
            Value::String(record.level.as_str().to_string()),
        );
        json_obj.insert("message".to_string(), Value::String(record.message.clone()));

        if self.config.timestamp {
            json_obj.insert(
                "timestamp".to_string(),
                Value::String(TimestampFormat::Iso8601.format(&record.timestamp)),
            );
        }

        if let Some(prefix) = record.prefix.as_deref().filter(|p| !p.is_empty()) {
            json_obj.insert("prefix".to_string(), Value::String(prefix.to_string()));
        }

        serde_json::to_string(&Value::Object(json_obj)).unwrap_or_default()
    }

    fn format_logfmt(&self, record: &LogRecord) -> String {
        let mut parts = Vec::new();

        if self.config.timestamp {
            parts.push(format!(
                "timestamp={}",
                escape_logfmt_value(&self.config.timestamp_format.format(&record.timestamp))
            ));
        }
        parts.push(format!("level={}", record.level));
        parts.push(format!("message={}", quote_logfmt_value(&record.message)));
        if let Some(prefix) = record.prefix.as_deref().filter(|p| !p.is_empty()) {
            parts.push(format!("prefix={}", escape_logfmt_value(prefix)));
        }

        if let Some(ref metadata) = record.metadata {
            for (key, value) in metadata.iter() {
                let formatted = match value {
                    Value::String(s) => quote_logfmt_value(s),
                    other => other.to_string(),
                };
                parts.push(format!("{}={}", escape_logfmt_key(key), formatted));
            }
        }

        parts.join(" ")
    }

    #[cfg(feature = "console")]
    fn colorize_level(&self, level: &Level, text: String) -> String {
        use colored::Colorize;

        let color_name = self
            .config
            .custom_colors
            .get(level.as_str())
            .map(String::as_str)
            .or_else(|| level.default_color());

        match color_name.and_then(color_from_name) {
            Some(color) => text.color(color).to_string(),
            None => text,
        }
    }

    #[cfg(not(feature = "console"))]
    fn colorize_level(&self, _level: &Level, text: String) -> String {
        text
    }
}

/// Escape line breaks so one record can never render as several lines
fn sanitize_message(message: &str) -> String {
    message
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

fn escape_logfmt_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

fn escape_logfmt_value(value: &str) -> String {
    if value.contains(' ') || value.contains('=') || value.contains('"') {
        quote_logfmt_value(value)
    } else {
        value.to_string()
    }
}

fn quote_logfmt_value(value: &str) -> String {
    format!("\"{}\"", sanitize_message(&value.replace('\\', "\\\\").replace('"', "\\\"")))
}

#[cfg(feature = "console")]
fn color_from_name(name: &str) -> Option<colored::Color> {
    use colored::Color::*;
    let color = match name {
        "black" => Black,
        "red" => Red,
        "green" => Green,
        "yellow" => Yellow,
        "blue" => Blue,
        "magenta" | "purple" => Magenta,
        "cyan" => Cyan,
        "white" => White,
        "gray" | "grey" | "brightBlack" => BrightBlack,
        "brightRed" => BrightRed,
        "brightGreen" => BrightGreen,
        "brightYellow" => BrightYellow,
        "brightBlue" => BrightBlue,
        "brightMagenta" => BrightMagenta,
        "brightCyan" => BrightCyan,
        "brightWhite" => BrightWhite,
        _ => return None,
    };
    Some(color)
}
