//! Logging setup for the command line front end
//!
//! Console output goes to stderr so it never mixes with command output.
//! JSON logs are appended to a daily rotated file in the logs directory.

use sqlbench_settings::LoggingSettings;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where log files are written
    pub log_dir: PathBuf,

    pub enable_json_logs: bool,

    pub enable_console_logs: bool,

    /// Include file/line information
    pub include_location: bool,

    /// Log span open/close events
    pub enable_spans: bool,

    /// Used when `RUST_LOG` is not set
    pub default_filter: String,
}

impl LoggingConfig {
    /// Build from user settings. `verbosity` counts `-v` flags: one turns on
    /// console output, two also logs spans.
    pub fn from_settings(settings: &LoggingSettings, verbosity: u8) -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: settings.json_logs,
            enable_console_logs: verbosity > 0,
            include_location: verbosity > 1,
            enable_spans: verbosity > 1,
            default_filter: settings.default_filter.clone(),
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// until the process exits.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    // RUST_LOG takes precedence over the configured filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW fires once per span; ENTER would repeat on every poll of an awaited future
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut guard = None;

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_filter(env_filter.clone())
            .boxed();

        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "sqlbench.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();

        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).init();

    tracing::debug!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "logging initialized"
    );

    Ok(guard)
}

pub fn log_directory() -> PathBuf {
    sqlbench_settings::logs_dir().unwrap_or_else(|_| PathBuf::from(".").join("logs"))
}
