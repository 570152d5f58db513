// SPDX-License-Identifier: MIT

//! `fnreg lock` - run a command under a job lock

use crate::error::FnregError;
use crate::registry::Recorder;
use anyhow::{Context, Result};
use clap::Args;
use fnreg_core::{
    GuardConfig, GuardError, InvocationId, InvocationIdGen, LockConfig, LockManager,
    INVOCATION_ID_LIMIT,
};
use serde_json::json;
use std::process::ExitCode;
use std::time::Duration;
use tokio::process::Command;

/// Exit status when the job is already running (EX_TEMPFAIL)
pub const EXIT_BLOCKED: u8 = 75;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Args)]
pub struct LockArgs {
    /// Job name shared by every instance
    pub job: String,

    /// Ignore unfinished runs older than this (e.g. 30s, 5m)
    #[arg(long, value_parser = super::parse_staleness)]
    pub staleness: Option<Duration>,

    /// Invocation id recorded on the run (generated when omitted)
    #[arg(long, value_parser = clap::value_parser!(u64).range(..=INVOCATION_ID_LIMIT))]
    pub invocation_id: Option<u64>,

    /// Invocation id of the caller that triggered this run
    #[arg(long, value_parser = clap::value_parser!(u64).range(..=INVOCATION_ID_LIMIT))]
    pub triggered_by: Option<u64>,

    /// Command to run while the lock is held
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

pub async fn handle(
    args: LockArgs,
    recorder: Recorder,
    config: &GuardConfig,
    ids: &impl InvocationIdGen,
) -> Result<ExitCode> {
    let staleness = args.staleness.unwrap_or(config.default_staleness);
    let invocation_id = super::invocation_id(args.invocation_id, ids);
    let lock_config = LockConfig::new(&args.job)
        .with_staleness(staleness)
        .with_invocation(invocation_id)
        .triggered_by(args.triggered_by.map(InvocationId));

    let manager = LockManager::new(recorder);
    let lock = match manager.acquire_with(&lock_config) {
        Ok(lock) => lock,
        Err(GuardError::LockHeld { job_name }) => {
            eprint!("{}", FnregError::lock_held(&job_name, staleness));
            return Ok(ExitCode::from(EXIT_BLOCKED));
        }
        Err(e) => return Err(e.into()),
    };

    let (program, rest) = match args.command.split_first() {
        Some(split) => split,
        None => anyhow::bail!("no command given"),
    };
    let mut child = Command::new(program)
        .args(rest)
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to start {}", program))?;

    let code = tokio::select! {
        status = child.wait() => {
            let status = status.context("failed waiting for command")?;
            // Signal-terminated children have no code
            status.code().map_or(1, |c| c.clamp(0, 255) as u8)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(job = %args.job, "interrupted, stopping command");
            if let Err(e) = child.kill().await {
                tracing::warn!(job = %args.job, error = %e, "failed to stop command");
            }
            EXIT_INTERRUPTED
        }
    };

    lock.release_with(&json!({ "exit_code": code }))?;
    Ok(ExitCode::from(code))
}
