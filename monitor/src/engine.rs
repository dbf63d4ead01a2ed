//! One tailing pass: read new lines, classify them, record alerts.
//!
//! [`TailEngine`] owns the [`WatchState`] and the [`AlertSink`] and is driven
//! by the supervisor on every notification and liveness tick, or once by the
//! `scan` command. Nothing that goes wrong inside a pass escapes it: a missing
//! file, a read error or a failed alert write is logged, counted, and the
//! engine is ready for the next pass.

use std::io;

use tracing::{debug, info, warn};

use crate::classifier::classify;
use crate::sink::AlertSink;
use crate::tail::WatchState;
use crate::types::AlertRecord;

/// What triggered a pass. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Notification,
    Tick,
}

/// Counters accumulated across passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Passes that reached the file.
    pub passes: u64,
    /// Complete lines read and classified.
    pub lines_read: u64,
    /// Alerts successfully appended to the sink.
    pub alerts_recorded: u64,
    /// Alert writes that failed.
    pub sink_failures: u64,
    /// Passes that failed to read the file.
    pub read_failures: u64,
    /// Times the read position was reset by truncation or replacement.
    pub rotations: u64,
}

/// Outcome of a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The file was read; `alerts` records were written.
    Read { lines: usize, alerts: usize },
    /// The file was missing; nothing was read and the position is unchanged.
    Missing,
    /// Reading failed; the position is unchanged.
    Failed,
}

/// Tail-and-alert pipeline for a single file.
pub struct TailEngine<S> {
    state: WatchState,
    sink: S,
    degraded: bool,
    summary: RunSummary,
}

impl<S: AlertSink> TailEngine<S> {
    /// Creates an engine over an already attached watch state.
    pub fn new(state: WatchState, sink: S) -> Self {
        Self {
            state,
            sink,
            degraded: false,
            summary: RunSummary::default(),
        }
    }

    /// Runs one pass over the bytes appended since the previous pass.
    pub fn pump(&mut self, trigger: Trigger) -> PassOutcome {
        let batch = match self.state.read_new_lines() {
            Ok(batch) => batch,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.enter_degraded(trigger);
                return PassOutcome::Missing;
            }
            Err(e) => {
                self.summary.read_failures += 1;
                warn!(
                    path = %self.state.path().display(),
                    error = %e,
                    trigger = ?trigger,
                    "Error processing log file"
                );
                return PassOutcome::Failed;
            }
        };

        if self.degraded {
            self.degraded = false;
            info!(
                path = %self.state.path().display(),
                offset = self.state.position().last_offset(),
                "Log file available again, resuming"
            );
        }

        self.summary.passes += 1;
        if batch.rotated {
            self.summary.rotations += 1;
        }

        let lines = batch.lines.len();
        let mut alerts = 0;
        for line in batch.lines {
            self.summary.lines_read += 1;
            if self.handle_line(line) {
                alerts += 1;
            }
        }

        if lines > 0 {
            debug!(trigger = ?trigger, lines, alerts, "Processed new lines");
        }

        PassOutcome::Read { lines, alerts }
    }

    /// Classifies one line and records it if it is alert-worthy.
    ///
    /// Returns whether an alert was written.
    fn handle_line(&mut self, line: String) -> bool {
        let Some(severity) = classify(&line) else {
            return false;
        };

        let alert = AlertRecord::new(severity, line);
        warn!(severity = %severity, "{}", alert.formatted_message);

        match self.sink.record(&alert) {
            Ok(()) => {
                self.summary.alerts_recorded += 1;
                true
            }
            Err(e) => {
                self.summary.sink_failures += 1;
                warn!(error = %e, severity = %severity, "Failed to record alert");
                false
            }
        }
    }

    fn enter_degraded(&mut self, trigger: Trigger) {
        if self.degraded {
            debug!(trigger = ?trigger, "Log file still missing, skipping");
            return;
        }
        self.degraded = true;
        warn!(
            path = %self.state.path().display(),
            offset = self.state.position().last_offset(),
            "Log file no longer exists, waiting for it to reappear"
        );
    }

    /// Whether the last pass found the file missing.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// The tailing state.
    #[must_use]
    pub fn state(&self) -> &WatchState {
        &self.state
    }

    /// Mutable access to the sink, used for the shutdown marker.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Consumes the engine and returns its sink.
    pub fn into_sink(self) -> S {
        self.sink
    }
}
