//! Command-line interface of the playground.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Parser)]
#[command(name = "herald")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Runs the reference scenarios of the herald event core")]
pub(crate) struct Cli {
    /// Minimum level to log; `RUST_LOG` takes precedence
    #[arg(long, global = true, default_value = "info", env = "HERALD_LOG_LEVEL")]
    pub(crate) log_level: LevelFilter,

    /// Also write daily-rotated log files into this directory
    #[arg(long, global = true, env = "HERALD_LOG_DIR")]
    pub(crate) log_dir: Option<PathBuf>,

    /// Write the log files as JSON lines
    #[arg(long, global = true, requires = "log_dir")]
    pub(crate) json: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Compose two events on a widget and trigger them
    Demo,
    /// Trigger a deferred event in a loop, re-arming once-handlers every round
    Bench {
        #[arg(short, long, default_value_t = 100_000)]
        iterations: u64,

        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
        handlers: u16,
    },
    /// Wait on the main thread for a trigger fired from another thread
    Wait {
        /// Delay before the other thread triggers
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,

        /// How long the main thread waits; 0 waits without limit
        #[arg(long, default_value_t = 1_000)]
        timeout_ms: u64,
    },
}
