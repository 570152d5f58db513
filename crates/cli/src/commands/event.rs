// SPDX-License-Identifier: MIT

//! `fnreg event` - record start/finish of event-triggered jobs

use crate::output::{render, OutputFormat};
use crate::registry::Recorder;
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use fnreg_core::{
    extract_triggered_by, EventId, GuardConfig, GuardEvent, InvocationId, InvocationIdGen,
    ParallelGuard, Phase, INVOCATION_ID_LIMIT,
};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum PhaseArg {
    Start,
    Finish,
}

impl From<PhaseArg> for Phase {
    fn from(arg: PhaseArg) -> Self {
        match arg {
            PhaseArg::Start => Phase::Start,
            PhaseArg::Finish => Phase::Finish,
        }
    }
}

#[derive(Args)]
pub struct EventArgs {
    pub phase: PhaseArg,

    /// Delivery correlation id
    #[arg(long)]
    pub event_id: String,

    /// Job name shared by every instance
    #[arg(long)]
    pub job: String,

    /// Invocation id recorded on the run (generated when omitted)
    #[arg(long, value_parser = clap::value_parser!(u64).range(..=INVOCATION_ID_LIMIT))]
    pub invocation_id: Option<u64>,

    /// Incoming message payload; `triggered_by_func_id` is read from it
    #[arg(long)]
    pub payload: Option<String>,

    /// Audit params recorded on finish (JSON)
    #[arg(long)]
    pub params: Option<String>,

    /// Ignore unfinished runs older than this (e.g. 30s, 5m)
    #[arg(long, value_parser = super::parse_staleness)]
    pub staleness: Option<Duration>,

    #[arg(short = 'o', long, value_enum, default_value_t)]
    pub output: OutputFormat,
}

#[derive(Debug, Serialize)]
struct EventReport {
    phase: &'static str,
    job: String,
    event_id: String,
    blocked: bool,
}

impl fmt::Display for EventReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.phase, self.blocked) {
            ("start", true) => write!(f, "blocked"),
            ("start", false) => write!(f, "proceed"),
            _ => write!(f, "finished"),
        }
    }
}

pub fn handle(
    args: EventArgs,
    recorder: Recorder,
    config: &GuardConfig,
    ids: &impl InvocationIdGen,
) -> Result<ExitCode> {
    let phase = Phase::from(args.phase);
    let triggered_by_id = args.payload.as_deref().and_then(parse_trigger);
    let finish_payload = args
        .params
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()
        .context("--params is not valid JSON")?;

    let guard = ParallelGuard::new(recorder);
    let blocked = guard.guard_event(GuardEvent {
        phase: phase.as_str(),
        event_id: Some(EventId::new(args.event_id.clone())),
        invocation_id: Some(super::invocation_id(args.invocation_id, ids)),
        triggered_by_id,
        job_name: &args.job,
        staleness: args.staleness.unwrap_or(config.default_staleness),
        finish_payload,
    })?;

    let report = EventReport {
        phase: phase.as_str(),
        job: args.job,
        event_id: args.event_id,
        blocked,
    };
    println!("{}", render(&report, args.output));
    Ok(ExitCode::SUCCESS)
}

/// Unparseable payloads carry no causality
fn parse_trigger(payload: &str) -> Option<InvocationId> {
    match serde_json::from_str::<Value>(payload) {
        Ok(value) => extract_triggered_by(&value),
        Err(e) => {
            tracing::debug!(error = %e, "payload is not JSON");
            None
        }
    }
}
