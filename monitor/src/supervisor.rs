//! The watch loop.
//!
//! [`Supervisor::start`] validates the watched file and subscribes to its
//! changes; [`Supervisor::run`] drives the [`TailEngine`] until the shutdown
//! future resolves, then records the shutdown marker and releases the
//! subscription.
//!
//! # Lifecycle
//!
//! ```text
//! Starting --start()--> Running --shutdown--> Stopping --> Stopped
//! ```
//!
//! Transitions are published on a [`tokio::sync::watch`] channel obtained
//! from [`Supervisor::lifecycle`]. A missing file while running does not
//! change the state; the engine skips passes until the file comes back.
//!
//! # Scheduling
//!
//! The loop is the single consumer of the notice channel, so passes never
//! overlap. Notices that queue up while a pass is running are drained and
//! served by one pass. A liveness tick re-checks the file in case the
//! notification backend missed or dropped an event.

use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::engine::{RunSummary, TailEngine, Trigger};
use crate::error::{MonitorError, Result};
use crate::position::StartPosition;
use crate::sink::AlertSink;
use crate::tail::WatchState;
use crate::types::LifecycleState;
use crate::watcher::{ChangeNotice, FileWatcher};

/// Shortest liveness tick accepted from a [`Config`].
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A started monitor, ready to [`run`](Self::run).
pub struct Supervisor<S> {
    engine: TailEngine<S>,
    watcher: FileWatcher,
    notices: mpsc::Receiver<ChangeNotice>,
    poll_interval: Duration,
    lifecycle: watch::Sender<LifecycleState>,
}

impl<S: AlertSink> Supervisor<S> {
    /// Validates the watched file and subscribes to its changes.
    ///
    /// Nothing is read from the log file or written to the sink here.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::LogFileNotFound`] if the watched file does not
    /// exist. This is a configuration problem and is not retried.
    pub fn start(config: &Config, sink: S) -> Result<Self> {
        let (lifecycle, _) = watch::channel(LifecycleState::Starting);

        let path = validate_log_file(&config.log_file)?;
        let state = WatchState::new(path.clone(), config.start_position)?
            .with_max_line_bytes(config.max_line_bytes);

        let (notice_tx, notices) = mpsc::channel(config.buffer_size.max(1));
        let watcher = FileWatcher::subscribe(path, notice_tx)?;

        info!(
            path = %state.path().display(),
            start = %config.start_position,
            offset = state.position().last_offset(),
            "Log monitor initialized"
        );

        Ok(Self {
            engine: TailEngine::new(state, sink),
            watcher,
            notices,
            poll_interval: config.poll_interval.max(MIN_POLL_INTERVAL),
            lifecycle,
        })
    }

    /// Subscribes to lifecycle transitions.
    #[must_use]
    pub fn lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.lifecycle.subscribe()
    }

    /// Runs the watch loop until `shutdown` resolves.
    ///
    /// Returns the counters accumulated over the whole run.
    pub async fn run<F>(self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let Self {
            mut engine,
            watcher,
            mut notices,
            poll_interval,
            lifecycle,
        } = self;

        lifecycle.send_replace(LifecycleState::Running);
        info!(path = %engine.state().path().display(), "Monitoring started");

        engine.pump(Trigger::Startup);

        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the startup pass covered it.
        ticker.tick().await;

        tokio::pin!(shutdown);
        let mut notifications: u64 = 0;

        loop {
            tokio::select! {
                biased;

                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }

                Some(notice) = notices.recv() => {
                    let mut coalesced = 0usize;
                    while notices.try_recv().is_ok() {
                        coalesced += 1;
                    }
                    notifications += 1 + coalesced as u64;
                    trace!(kind = ?notice.kind, coalesced, "Handling change notice");
                    engine.pump(Trigger::Notification);
                }

                _ = ticker.tick() => {
                    engine.pump(Trigger::Tick);
                }
            }
        }

        lifecycle.send_replace(LifecycleState::Stopping);

        if let Err(e) = engine.sink_mut().record_shutdown(Utc::now()) {
            warn!(error = %e, "Failed to record shutdown marker");
        }

        watcher.unsubscribe();
        drop(notices);

        let summary = engine.summary();
        lifecycle.send_replace(LifecycleState::Stopped);

        info!(
            notifications,
            lines = summary.lines_read,
            alerts = summary.alerts_recorded,
            sink_failures = summary.sink_failures,
            "Monitoring stopped"
        );

        summary
    }
}

/// Scans the log file once from the beginning and records its alerts.
///
/// Used by the `scan` command; no subscription is created and no shutdown
/// marker is written.
///
/// # Errors
///
/// Returns [`MonitorError::LogFileNotFound`] if the log file does not exist.
pub fn scan_once<S: AlertSink>(config: &Config, sink: S) -> Result<RunSummary> {
    let path = validate_log_file(&config.log_file)?;
    let state = WatchState::new(path, StartPosition::Beginning)?
        .with_max_line_bytes(config.max_line_bytes);

    let mut engine = TailEngine::new(state, sink);
    engine.pump(Trigger::Startup);

    let summary = engine.summary();
    debug!(?summary, "Scan complete");
    Ok(summary)
}

/// Checks that `path` is an existing regular file and returns its canonical
/// absolute form.
fn validate_log_file(path: &Path) -> Result<PathBuf> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => Ok(path.canonicalize()?),
        Ok(_) => Err(MonitorError::NotAFile(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(MonitorError::LogFileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}
