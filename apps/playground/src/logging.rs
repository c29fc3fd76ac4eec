//! Tracing setup: a compact console layer plus an optional non-blocking,
//! daily-rotated file layer.

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "herald";
const LOG_FILE_SUFFIX: &str = "log";
const MAX_LOG_FILES: usize = 7;

#[derive(Debug, Clone)]
pub(crate) struct LogOptions {
    pub(crate) level: LevelFilter,
    pub(crate) dir: Option<PathBuf>,
    pub(crate) json: bool,
}

/// Keeps the file writer alive; dropping it flushes pending lines.
#[must_use = "Dropping this handle stops the background log writer."]
#[derive(Debug)]
pub(crate) struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Installs the global subscriber.
///
/// # Errors
/// Fails if the log directory cannot be created, the file appender cannot be
/// built, or a global subscriber is already installed.
pub(crate) fn init(options: &LogOptions) -> Result<LogGuard> {
    let mut layers = vec![layer().compact().with_ansi(true).boxed()];

    let file = match &options.dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix(LOG_FILE_SUFFIX)
                .max_log_files(MAX_LOG_FILES)
                .build(dir)
                .context("Failed to build the log file appender")?;
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let file_layer = layer().with_writer(writer).with_ansi(false);
            layers.push(if options.json { file_layer.json().boxed() } else { file_layer.boxed() });
            Some(guard)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter(options.level))
        .with(layers)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    Ok(LogGuard { _file: file })
}

/// `RUST_LOG` directives on top of `level` as the default.
fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::builder().with_default_directive(level.into()).from_env_lossy()
}
