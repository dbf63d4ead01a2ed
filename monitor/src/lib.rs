//! LogSentinel Monitor - incremental log tailing with alert extraction.
//!
//! This crate watches a single, continuously appended log file, reads exactly
//! the bytes appended since the last observation, and records every line that
//! carries an `ERROR`, `CRITICAL` or `FAILURE` marker to an append-only alert
//! file.
//!
//! # Overview
//!
//! ```text
//! notify event --> FileWatcher --> mpsc --> Supervisor
//!                                              |
//!                               TailEngine::pump (one pass)
//!                                              |
//!                WatchState::read_new_lines -> classify -> AlertSink::record
//! ```
//!
//! The engine survives truncation, rotation, deletion, malformed UTF-8 and
//! failed alert writes; only a missing log file at startup is fatal.
//!
//! # Modules
//!
//! - [`types`]: Severity, alert record, and lifecycle types
//! - [`classifier`]: Severity classification of lines
//! - [`position`]: Read-position tracking
//! - [`tail`]: Incremental reading and line reconstruction
//! - [`sink`]: Append-only alert store
//! - [`watcher`]: File-change notifications for the watched file
//! - [`engine`]: One tail/classify/record pass
//! - [`supervisor`]: The watch loop and its lifecycle
//! - [`config`]: Configuration from environment variables
//! - [`error`]: Error types for monitor operations

pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod position;
pub mod sink;
pub mod supervisor;
pub mod tail;
pub mod types;
pub mod watcher;

pub use classifier::classify;
pub use config::{Config, ConfigError};
pub use engine::{PassOutcome, RunSummary, TailEngine, Trigger};
pub use error::{MonitorError, Result};
pub use position::{FileIdentity, PositionStore, StartPosition};
pub use sink::{AlertFormat, AlertSink, FileAlertSink, SinkError};
pub use supervisor::{scan_once, Supervisor};
pub use tail::{ReadBatch, WatchState};
pub use types::{AlertRecord, LifecycleState, Severity};
pub use watcher::{ChangeKind, ChangeNotice, FileWatcher, WatcherError};
