//! Logging setup.
//!
//! The sidecar logs to an app log file, optionally mirrored to stdout. The
//! filter comes from `--log-level` and accepts any `EnvFilter` directive.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::errors::{Result, SidecarError};

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// `None` logs to stdout only.
    pub app_log_path: Option<PathBuf>,
    pub log_level: String,
    /// Also log to stdout when a log file is configured.
    pub enable_console_logger: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            app_log_path: None,
            log_level: "info".to_string(),
            enable_console_logger: false,
        }
    }
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Call once, before the first log line.
pub fn init(opts: &LogOptions) -> Result<()> {
    let filter = filter_for(&opts.log_level);

    let Some(path) = &opts.app_log_path else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| SidecarError::Precondition(format!("logger already set: {e}")))?;
        return Ok(());
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SidecarError::io(parent, e))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| SidecarError::io(path, e))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false);
    let console_layer = opts
        .enable_console_logger
        .then(|| tracing_subscriber::fmt::layer().with_target(false));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| SidecarError::Precondition(format!("logger already set: {e}")))
}
