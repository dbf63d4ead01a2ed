//! Configuration module for LogSentinel.
//!
//! This module handles parsing configuration from environment variables.
//! Command-line flags in the binary override these values.
//!
//! # Environment Variables
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `LOGSENTINEL_LOG_FILE` | No | `data/logfile.log` | File to monitor |
//! | `LOGSENTINEL_ALERTS_FILE` | No | `data/alerts.log` | Append-only alert store |
//! | `LOGSENTINEL_START_POSITION` | No | `beginning` | `beginning` or `end` of the existing file |
//! | `LOGSENTINEL_POLL_INTERVAL_MS` | No | 1000 | Liveness tick interval |
//! | `LOGSENTINEL_ALERT_FORMAT` | No | `text` | `text` or `json` |
//! | `LOGSENTINEL_BUFFER_SIZE` | No | 1000 | Notification queue capacity |
//! | `LOGSENTINEL_MAX_LINE_BYTES` | No | 1048576 | Longest unterminated line kept in memory |
//!
//! # Example
//!
//! ```no_run
//! use logsentinel_monitor::config::Config;
//!
//! let config = Config::from_env().expect("Failed to load configuration");
//! println!("Watching: {}", config.log_file.display());
//! ```

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::position::StartPosition;
use crate::sink::AlertFormat;
use crate::tail::DEFAULT_MAX_LINE_BYTES;

/// Default watched file, relative to the working directory.
const DEFAULT_LOG_FILE: &str = "data/logfile.log";

/// Default alert store, relative to the working directory.
const DEFAULT_ALERTS_FILE: &str = "data/alerts.log";

/// Default liveness tick interval.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default notification queue capacity.
const DEFAULT_BUFFER_SIZE: usize = 1000;

/// Errors that can occur during configuration parsing.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable has an invalid value.
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Configuration for the log monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// File to tail.
    pub log_file: PathBuf,

    /// File alerts are appended to.
    pub alerts_file: PathBuf,

    /// Whether content already in the file at startup is scanned.
    pub start_position: StartPosition,

    /// Interval of the liveness tick that re-checks the file without a
    /// notification.
    pub poll_interval: Duration,

    /// Record format of the alert file.
    pub alert_format: AlertFormat,

    /// Capacity of the notification queue.
    pub buffer_size: usize,

    /// Size above which an unterminated line is emitted anyway.
    pub max_line_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            alerts_file: PathBuf::from(DEFAULT_ALERTS_FILE),
            start_position: StartPosition::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            alert_format: AlertFormat::default(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl Config {
    /// Creates a new `Config` by parsing environment variables.
    ///
    /// Unset variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a variable is set but cannot be parsed, or
    /// if a numeric setting is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let log_file = env::var("LOGSENTINEL_LOG_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_file);

        let alerts_file = env::var("LOGSENTINEL_ALERTS_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.alerts_file);

        let start_position = parse_var("LOGSENTINEL_START_POSITION")?
            .unwrap_or(defaults.start_position);

        let alert_format =
            parse_var("LOGSENTINEL_ALERT_FORMAT")?.unwrap_or(defaults.alert_format);

        let poll_interval = positive_var::<u64>("LOGSENTINEL_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let buffer_size =
            positive_var::<usize>("LOGSENTINEL_BUFFER_SIZE")?.unwrap_or(defaults.buffer_size);

        let max_line_bytes = positive_var::<usize>("LOGSENTINEL_MAX_LINE_BYTES")?
            .unwrap_or(defaults.max_line_bytes);

        Ok(Self {
            log_file,
            alerts_file,
            start_position,
            poll_interval,
            alert_format,
            buffer_size,
            max_line_bytes,
        })
    }
}

/// Parses an optional variable through its `FromStr` implementation.
fn parse_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = String>,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map(Some)
            .map_err(|message| ConfigError::InvalidValue {
                key: key.to_string(),
                message,
            }),
        Err(_) => Ok(None),
    }
}

/// Parses an optional integer variable that must be greater than zero.
fn positive_var<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialEq + Default,
{
    let Ok(val) = env::var(key) else {
        return Ok(None);
    };

    let parsed = val.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected positive integer, got '{val}'"),
    })?;

    if parsed == T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "value must be greater than 0".to_string(),
        });
    }

    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    /// Helper to run tests with isolated environment variables.
    /// Clears all LOGSENTINEL_* vars before the test and restores them after.
    fn with_clean_env<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let saved_vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with("LOGSENTINEL_"))
            .collect();

        for (key, _) in &saved_vars {
            env::remove_var(key);
        }

        let result = f();

        for (key, _) in env::vars().filter(|(k, _)| k.starts_with("LOGSENTINEL_")) {
            env::remove_var(key);
        }
        for (key, value) in saved_vars {
            env::set_var(key, value);
        }

        result
    }

    #[test]
    #[serial]
    fn test_defaults() {
        with_clean_env(|| {
            let config = Config::from_env().expect("should parse empty environment");

            assert_eq!(config, Config::default());
            assert_eq!(config.log_file, PathBuf::from("data/logfile.log"));
            assert_eq!(config.alerts_file, PathBuf::from("data/alerts.log"));
            assert_eq!(config.start_position, StartPosition::Beginning);
            assert_eq!(config.poll_interval, Duration::from_secs(1));
            assert_eq!(config.alert_format, AlertFormat::Text);
            assert_eq!(config.buffer_size, DEFAULT_BUFFER_SIZE);
            assert_eq!(config.max_line_bytes, DEFAULT_MAX_LINE_BYTES);
        });
    }

    #[test]
    #[serial]
    fn test_full_config() {
        with_clean_env(|| {
            env::set_var("LOGSENTINEL_LOG_FILE", "/var/log/app.log");
            env::set_var("LOGSENTINEL_ALERTS_FILE", "/var/log/alerts.jsonl");
            env::set_var("LOGSENTINEL_START_POSITION", "end");
            env::set_var("LOGSENTINEL_POLL_INTERVAL_MS", "250");
            env::set_var("LOGSENTINEL_ALERT_FORMAT", "json");
            env::set_var("LOGSENTINEL_BUFFER_SIZE", "64");
            env::set_var("LOGSENTINEL_MAX_LINE_BYTES", "4096");

            let config = Config::from_env().expect("should parse full config");

            assert_eq!(config.log_file, PathBuf::from("/var/log/app.log"));
            assert_eq!(config.alerts_file, PathBuf::from("/var/log/alerts.jsonl"));
            assert_eq!(config.start_position, StartPosition::End);
            assert_eq!(config.poll_interval, Duration::from_millis(250));
            assert_eq!(config.alert_format, AlertFormat::Json);
            assert_eq!(config.buffer_size, 64);
            assert_eq!(config.max_line_bytes, 4096);
        });
    }

    #[test]
    #[serial]
    fn test_invalid_start_position() {
        with_clean_env(|| {
            env::set_var("LOGSENTINEL_START_POSITION", "middle");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "LOGSENTINEL_START_POSITION" && message.contains("middle")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_alert_format() {
        with_clean_env(|| {
            env::set_var("LOGSENTINEL_ALERT_FORMAT", "xml");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, .. } if key == "LOGSENTINEL_ALERT_FORMAT"
            ));
        });
    }

    #[test]
    #[serial]
    fn test_invalid_poll_interval() {
        with_clean_env(|| {
            env::set_var("LOGSENTINEL_POLL_INTERVAL_MS", "soon");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "LOGSENTINEL_POLL_INTERVAL_MS" && message.contains("positive integer")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_zero_buffer_size_rejected() {
        with_clean_env(|| {
            env::set_var("LOGSENTINEL_BUFFER_SIZE", "0");

            let err = Config::from_env().unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue { ref key, ref message }
                    if key == "LOGSENTINEL_BUFFER_SIZE" && message.contains("greater than 0")
            ));
        });
    }

    #[test]
    #[serial]
    fn test_zero_poll_interval_rejected() {
        with_clean_env(|| {
            env::set_var("LOGSENTINEL_POLL_INTERVAL_MS", "0");

            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "LOGSENTINEL_BUFFER_SIZE".to_string(),
            message: "value must be greater than 0".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid value for LOGSENTINEL_BUFFER_SIZE: value must be greater than 0"
        );
    }
}
