//! Logger configuration from data
//!
//! [`LoggerSettings`] is the serde form of a logger's scalar configuration.
//! Durations are given in milliseconds. Transports, filters and the other
//! behavioral parts are still attached through the returned builder.
//!
//! # Example
//!
//! ```
//! use relay_logger::prelude::*;
//!
//! let settings: LoggerSettings = serde_json::from_str(r#"{
//!     "level": "warn",
//!     "prefix": "API",
//!     "context": { "service": "billing" },
//!     "dispatchMode": "deferred",
//!     "customLevels": { "audit": 6 },
//!     "retry": { "maxAttempts": 5, "baseDelayMs": 200 }
//! }"#).unwrap();
//!
//! let logger = settings.into_builder().unwrap().build();
//! assert_eq!(logger.level(), &Level::WARN);
//! assert_eq!(logger.dispatch_mode(), DispatchMode::Deferred);
//! ```

use super::error::Result;
use super::formatter::{OutputFormat, TimestampFormat};
use super::level::Level;
use super::logger::{DispatchMode, LoggerBuilder};
use super::metadata::Metadata;
use crate::transports::retry::{retry_pattern, RetryOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerSettings {
    pub level: Option<Level>,
    pub prefix: Option<String>,
    pub context: Metadata,
    pub dispatch_mode: DispatchMode,
    pub timestamp: bool,
    pub timestamp_format: Option<TimestampFormat>,
    pub output_format: OutputFormat,
    pub colorize: Option<bool>,
    pub custom_levels: HashMap<String, u32>,
    pub custom_colors: HashMap<String, String>,
    pub retry: Option<RetrySettings>,
}

/// Retry options with millisecond durations; unset fields keep their defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_multiplier: Option<f64>,
    pub jitter: Option<bool>,
    /// Added to the default retryable codes
    pub retryable_codes: Vec<String>,
    /// Added to the default retryable patterns
    pub retryable_patterns: Vec<String>,
    pub circuit_breaker_threshold: Option<u32>,
    pub circuit_breaker_timeout_ms: Option<u64>,
}

impl RetrySettings {
    /// Fails if a pattern is not a valid regex
    pub fn to_options(&self) -> Result<RetryOptions> {
        let mut options = RetryOptions::default();
        if let Some(max_attempts) = self.max_attempts {
            options.max_attempts = max_attempts;
        }
        if let Some(ms) = self.base_delay_ms {
            options.base_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = self.max_delay_ms {
            options.max_delay = Duration::from_millis(ms);
        }
        if let Some(multiplier) = self.backoff_multiplier {
            options.backoff_multiplier = multiplier;
        }
        if let Some(jitter) = self.jitter {
            options.jitter = jitter;
        }
        options
            .retryable_codes
            .extend(self.retryable_codes.iter().cloned());
        for pattern in &self.retryable_patterns {
            options.retryable_patterns.push(retry_pattern(pattern)?);
        }
        if let Some(threshold) = self.circuit_breaker_threshold {
            options.circuit_breaker_threshold = threshold;
        }
        if let Some(ms) = self.circuit_breaker_timeout_ms {
            options.circuit_breaker_timeout = Duration::from_millis(ms);
        }
        Ok(options)
    }
}

impl LoggerSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builder seeded with these settings
    pub fn into_builder(self) -> Result<LoggerBuilder> {
        let mut builder = LoggerBuilder::new()
            .context(self.context)
            .dispatch_mode(self.dispatch_mode)
            .timestamp(self.timestamp)
            .output_format(self.output_format);

        if let Some(level) = self.level {
            builder = builder.level(level);
        }
        if let Some(prefix) = self.prefix {
            builder = builder.prefix(prefix);
        }
        if let Some(format) = self.timestamp_format {
            builder = builder.timestamp_format(format);
        }
        if let Some(colorize) = self.colorize {
            builder = builder.colorize(colorize);
        }
        for (name, priority) in self.custom_levels {
            builder = builder.custom_level(name, priority);
        }
        for (level, color) in self.custom_colors {
            builder = builder.custom_color(level, color);
        }
        if let Some(retry) = &self.retry {
            builder = builder.retry(retry.to_options()?);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LoggerError;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = LoggerSettings::from_json("{}").unwrap();
        assert_eq!(settings, LoggerSettings::default());

        let logger = settings.into_builder().unwrap().build();
        assert_eq!(logger.level(), &Level::INFO);
        assert_eq!(logger.dispatch_mode(), DispatchMode::Sync);
        assert!(!logger.timestamp_enabled());
    }

    #[test]
    fn test_full_settings() {
        let settings = LoggerSettings::from_json(
            r#"{
                "level": "debug",
                "prefix": "worker",
                "context": { "shard": 3 },
                "timestamp": true,
                "outputFormat": "json",
                "colorize": false,
                "customLevels": { "trace": 1 },
                "customColors": { "warn": "magenta" }
            }"#,
        )
        .unwrap();

        let logger = settings.into_builder().unwrap().build();
        assert_eq!(logger.level(), &Level::DEBUG);
        assert_eq!(logger.prefix(), Some("worker"));
        assert_eq!(logger.context().get("shard"), Some(&serde_json::json!(3)));
        assert!(logger.timestamp_enabled());
        assert!(logger.formatter().is_json());
        assert!(!logger.formatter().is_colorized());
        assert_eq!(logger.levels().priority(&Level::new("trace")), 1);
        assert_eq!(
            logger.formatter().custom_colors().get("warn").map(String::as_str),
            Some("magenta")
        );
    }

    #[test]
    fn test_retry_settings_overlay_defaults() {
        let retry: RetrySettings = serde_json::from_str(
            r#"{ "maxAttempts": 7, "baseDelayMs": 50, "jitter": false, "retryableCodes": ["EBUSY"] }"#,
        )
        .unwrap();
        let options = retry.to_options().unwrap();

        assert_eq!(options.max_attempts, 7);
        assert_eq!(options.base_delay, Duration::from_millis(50));
        assert_eq!(options.max_delay, Duration::from_millis(30_000));
        assert!(!options.jitter);
        assert!(options.retryable_codes.contains("EBUSY"));
        assert!(options.retryable_codes.contains("ETIMEDOUT"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let settings = LoggerSettings {
            retry: Some(RetrySettings {
                retryable_patterns: vec!["[unclosed".to_string()],
                ..RetrySettings::default()
            }),
            ..LoggerSettings::default()
        };
        let err = settings.into_builder().err().unwrap();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        let err = LoggerSettings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, LoggerError::JsonError(_)));
    }
}
