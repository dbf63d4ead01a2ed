//! Alert types shared by the classifier, the sink, and the supervisor.
//!
//! Alert records serialize to camelCase JSON for the JSON-lines alert format.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix written in front of every alert line in the text format.
pub const ALERT_PREFIX: &str = "🚨 EMAIL ALERT: ";

/// Record appended to the alert store on graceful shutdown.
pub const SHUTDOWN_MARKER: &str = "Monitoring stopped by user.";

/// Severity assigned to an alert-worthy line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Critical,
    Failure,
}

impl Severity {
    /// Every severity, in the order markers are documented.
    pub const ALL: [Severity; 3] = [Severity::Error, Severity::Critical, Severity::Failure];

    /// The literal, case-sensitive marker that identifies this severity in a line.
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
            Severity::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A single detected alert.
///
/// Records are created once per matching line and appended once to the alert
/// store; nothing in the engine updates or deletes them afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRecord {
    /// Marker that triggered the alert.
    pub severity_tag: Severity,

    /// The line as it was reconstructed from the watched file.
    pub raw_line: String,

    /// Human-readable alert text, without the trailing newline.
    pub formatted_message: String,

    /// When the engine observed the line.
    pub emitted_at: DateTime<Utc>,
}

impl AlertRecord {
    /// Creates a record stamped with the current time.
    pub fn new(severity_tag: Severity, raw_line: impl Into<String>) -> Self {
        Self::at(severity_tag, raw_line, Utc::now())
    }

    /// Creates a record with an explicit timestamp.
    pub fn at(severity_tag: Severity, raw_line: impl Into<String>, emitted_at: DateTime<Utc>) -> Self {
        let raw_line = raw_line.into();
        let formatted_message = format!("{ALERT_PREFIX}{}", raw_line.trim());
        Self {
            severity_tag,
            raw_line,
            formatted_message,
            emitted_at,
        }
    }
}

/// Lifecycle of the watch loop.
///
/// A transiently missing file does not change the state; the supervisor keeps
/// a separate degraded flag while `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
