// SPDX-License-Identifier: MIT

//! fnreg - Functions registry execution guard CLI

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod commands;
mod error;
mod output;
mod registry;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{event, lock, runs};
use fnreg_core::{GuardConfig, InvocationIdGen, RandomIdGen};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "fnreg",
    version,
    about = "Functions registry - distributed execution guard for stateless jobs"
)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = "fnreg.toml")]
    config: PathBuf,

    /// Registry database (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command while holding a job lock
    Lock(lock::LockArgs),
    /// Record the start or finish of an event-triggered job
    Event(event::EventArgs),
    /// List recent runs of a job
    Runs(runs::RunsArgs),
    /// Print a new invocation id
    Id,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = GuardConfig::load_or_default(&cli.config)?;
    if let Some(db) = cli.db {
        config.database = db;
    }
    setup_logging(&config);

    let ids = RandomIdGen;
    if let Commands::Id = cli.command {
        println!("{}", ids.next());
        return Ok(ExitCode::SUCCESS);
    }

    let recorder = match registry::open_recorder(&config) {
        Ok(recorder) => recorder,
        Err(e) => {
            eprint!("{}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    match cli.command {
        Commands::Lock(args) => lock::handle(args, recorder, &config, &ids).await,
        Commands::Event(args) => event::handle(args, recorder, &config, &ids),
        Commands::Runs(args) => runs::handle(args, recorder),
        Commands::Id => Ok(ExitCode::SUCCESS),
    }
}

/// Log to stderr so stdout stays parseable; `RUST_LOG` wins over the config filter
fn setup_logging(config: &GuardConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
