//! Durable, append-only alert store.
//!
//! The [`AlertSink`] trait is the side-effect boundary of the engine. The
//! provided [`FileAlertSink`] opens the alert file in append mode for every
//! record, writes the whole record with a single `write_all`, and closes it.
//! Earlier records are never seeked over or rewritten, so a failed write can
//! at worst leave a truncated last line.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, trace};

use crate::types::{AlertRecord, SHUTDOWN_MARKER};

/// Errors that can occur while recording alerts.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The alert store could not be opened or written.
    #[error("failed to write alert to {path}: {source}")]
    Write {
        /// Alert store path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The record could not be serialized.
    #[error("failed to serialize alert: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Destination for alert records.
///
/// Each call is independent: a failure on one record must not prevent the
/// next one from being attempted.
pub trait AlertSink: Send {
    /// Appends one alert record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record could not be written.
    fn record(&mut self, alert: &AlertRecord) -> Result<(), SinkError>;

    /// Appends the "monitoring stopped" marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the marker could not be written.
    fn record_shutdown(&mut self, at: DateTime<Utc>) -> Result<(), SinkError>;
}

/// Serialization used for records in the alert file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertFormat {
    /// `🚨 EMAIL ALERT: <line>`, one per line.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for AlertFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(AlertFormat::Text),
            "json" | "jsonl" => Ok(AlertFormat::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

impl fmt::Display for AlertFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertFormat::Text => f.write_str("text"),
            AlertFormat::Json => f.write_str("json"),
        }
    }
}

/// Alert sink backed by an append-only file.
#[derive(Debug, Clone)]
pub struct FileAlertSink {
    path: PathBuf,
    format: AlertFormat,
}

impl FileAlertSink {
    /// Creates a sink for `path`. Nothing is touched on disk until the first
    /// record is written.
    pub fn new(path: impl Into<PathBuf>, format: AlertFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Path of the alert file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record format.
    #[must_use]
    pub fn format(&self) -> AlertFormat {
        self.format
    }

    fn append_line(&self, line: &str) -> Result<(), SinkError> {
        let wrap = |source| SinkError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!(dir = %parent.display(), "Creating alert directory");
                fs::create_dir_all(parent).map_err(wrap)?;
            }
        }

        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(wrap)?;
        file.write_all(record.as_bytes()).map_err(wrap)?;
        file.flush().map_err(wrap)?;

        trace!(path = %self.path.display(), bytes = record.len(), "Appended alert record");
        Ok(())
    }
}

impl AlertSink for FileAlertSink {
    fn record(&mut self, alert: &AlertRecord) -> Result<(), SinkError> {
        let line = match self.format {
            AlertFormat::Text => alert.formatted_message.clone(),
            AlertFormat::Json => serde_json::to_string(alert)?,
        };
        self.append_line(&line)
    }

    fn record_shutdown(&mut self, at: DateTime<Utc>) -> Result<(), SinkError> {
        let line = match self.format {
            AlertFormat::Text => SHUTDOWN_MARKER.to_string(),
            AlertFormat::Json => json!({
                "event": "monitoring_stopped",
                "message": SHUTDOWN_MARKER,
                "emittedAt": at,
            })
            .to_string(),
        };
        self.append_line(&line)
    }
}
