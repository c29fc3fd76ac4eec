mod cli;
mod logging;
mod scenarios;

use crate::cli::{Cli, Command};
use crate::logging::LogOptions;

use anyhow::Result;
use clap::Parser;
use herald_events::WorkerPool;
use herald_runtime::{RuntimeConfig, build_runtime};
use std::time::Duration;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let options = LogOptions { level: cli.log_level, dir: cli.log_dir, json: cli.json };
    let _log = logging::init(&options)?;

    match cli.command {
        Command::Demo => {
            scenarios::demo();
        },
        Command::Bench { iterations, handlers } => {
            scenarios::bench(iterations, usize::from(handlers))?;
        },
        Command::Wait { delay_ms, timeout_ms } => {
            let runtime =
                build_runtime(&RuntimeConfig::default().with_thread_name("herald-playground"))?;
            let timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));
            scenarios::wait(
                WorkerPool::from_runtime(&runtime),
                Duration::from_millis(delay_ms),
                timeout,
            )?;
        },
    }

    Ok(())
}
