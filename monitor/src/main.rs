//! LogSentinel Monitor - log file alert watcher.
//!
//! This binary tails a log file and appends an alert record for every line
//! containing `ERROR`, `CRITICAL` or `FAILURE`.
//!
//! # Commands
//!
//! - `logsentinel run`: Watch the log file until interrupted
//! - `logsentinel scan`: Process the file's current content once and exit
//!
//! # Environment Variables
//!
//! See the [`config`] module for available configuration options.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use logsentinel_monitor::config::Config;
use logsentinel_monitor::position::StartPosition;
use logsentinel_monitor::sink::{AlertFormat, FileAlertSink};
use logsentinel_monitor::supervisor::{scan_once, Supervisor};

/// LogSentinel - log file alert watcher.
///
/// Watches a log file for ERROR, CRITICAL and FAILURE lines and records
/// simulated email alerts to an append-only file.
#[derive(Parser, Debug)]
#[command(name = "logsentinel")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    LOGSENTINEL_LOG_FILE          File to monitor (default: data/logfile.log)
    LOGSENTINEL_ALERTS_FILE       Alert store (default: data/alerts.log)
    LOGSENTINEL_START_POSITION    'beginning' or 'end' (default: beginning)
    LOGSENTINEL_POLL_INTERVAL_MS  Liveness tick interval (default: 1000)
    LOGSENTINEL_ALERT_FORMAT      'text' or 'json' (default: text)
    LOGSENTINEL_BUFFER_SIZE       Notification queue capacity (default: 1000)
    LOGSENTINEL_MAX_LINE_BYTES    Longest unterminated line kept (default: 1048576)
    RUST_LOG                      Log filter (default: info)

EXAMPLES:
    # Watch the default files
    logsentinel run

    # Only alert on lines written from now on
    logsentinel run --log-file /var/log/app.log --from-end

    # One pass over the existing content
    logsentinel scan --log-file /var/log/app.log --alerts-file alerts.jsonl --format json
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the log file until Ctrl+C.
    ///
    /// Appends "Monitoring stopped by user." to the alert file on shutdown.
    Run(FileArgs),

    /// Process the log file's current content once and exit.
    Scan(FileArgs),
}

/// Flags shared by both commands; each overrides its environment variable.
#[derive(Args, Debug)]
struct FileArgs {
    /// File to monitor.
    #[arg(short, long)]
    log_file: Option<PathBuf>,

    /// File alerts are appended to.
    #[arg(short, long)]
    alerts_file: Option<PathBuf>,

    /// Skip content already in the file at startup.
    #[arg(long)]
    from_end: bool,

    /// Alert record format: text or json.
    #[arg(short, long)]
    format: Option<AlertFormat>,
}

impl FileArgs {
    fn apply(self, mut config: Config) -> Config {
        if let Some(log_file) = self.log_file {
            config.log_file = log_file;
        }
        if let Some(alerts_file) = self.alerts_file {
            config.alerts_file = alerts_file;
        }
        if self.from_end {
            config.start_position = StartPosition::End;
        }
        if let Some(format) = self.format {
            config.alert_format = format;
        }
        config
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging();

    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Command::Run(args) => {
            let config = args.apply(config);
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_monitor(config))
        }
        Command::Scan(args) => run_scan(args.apply(config)),
    }
}

/// Runs the watch loop until a shutdown signal arrives.
async fn run_monitor(config: Config) -> Result<()> {
    info!(
        log_file = %config.log_file.display(),
        alerts_file = %config.alerts_file.display(),
        start = %config.start_position,
        format = %config.alert_format,
        "Configuration loaded"
    );

    let sink = FileAlertSink::new(&config.alerts_file, config.alert_format);
    let supervisor = Supervisor::start(&config, sink).context(format!(
        "Cannot monitor {}. Create the file or set LOGSENTINEL_LOG_FILE / --log-file.",
        config.log_file.display()
    ))?;

    info!("Monitor running. Press Ctrl+C to stop.");

    supervisor.run(wait_for_shutdown()).await;

    Ok(())
}

/// Scans the current content of the log file once.
fn run_scan(config: Config) -> Result<()> {
    let sink = FileAlertSink::new(&config.alerts_file, config.alert_format);
    let summary = scan_once(&config, sink)
        .context(format!("Cannot scan {}", config.log_file.display()))?;

    info!(
        lines = summary.lines_read,
        alerts = summary.alerts_recorded,
        sink_failures = summary.sink_failures,
        "Scan finished"
    );

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
