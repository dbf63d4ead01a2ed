//! Error types for LogSentinel.
//!
//! Each concern defines its own error next to its code ([`ConfigError`],
//! [`WatcherError`]); this module aggregates the ones that can stop startup
//! into [`MonitorError`]. Alert store failures never reach it: the engine
//! logs and counts them.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::watcher::WatcherError;

/// Errors that can occur during monitor operations.
///
/// Only startup can fail with one of these; once the watch loop is running,
/// errors are logged and the loop continues.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The watched file does not exist.
    #[error("log file not found: {0}")]
    LogFileNotFound(PathBuf),

    /// The watched path exists but is not a regular file.
    #[error("log path is not a regular file: {0}")]
    NotAFile(PathBuf),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),
}

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
