// SPDX-License-Identifier: MIT

//! `fnreg runs` - list recent runs of a job

use crate::output::{render_table, OutputFormat};
use crate::registry::Recorder;
use anyhow::Result;
use clap::Args;
use fnreg_core::FunctionRun;
use serde::Serialize;
use std::fmt;
use std::process::ExitCode;

#[derive(Args)]
pub struct RunsArgs {
    pub job: String,

    /// Maximum number of runs to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    #[arg(short = 'o', long, value_enum, default_value_t)]
    pub output: OutputFormat,
}

const HEADER: &str = "RUN     EVENT         STARTED                   STATUS";

#[derive(Serialize)]
#[serde(transparent)]
struct RunRow(FunctionRun);

impl fmt::Display for RunRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let run = &self.0;
        let event = run.event_id.as_ref().map_or("-", |e| e.as_str());
        let status = match run.time_finish {
            None => "running".to_string(),
            Some(finish) => {
                let ms = (finish - run.time_start).num_milliseconds();
                format!("finished ({}ms)", ms)
            }
        };
        write!(
            f,
            "{:<7} {:<13} {:<25} {}",
            run.run_id,
            event,
            run.time_start.format("%Y-%m-%d %H:%M:%S%.3f"),
            status
        )
    }
}

pub fn handle(args: RunsArgs, recorder: Recorder) -> Result<ExitCode> {
    let rows: Vec<RunRow> = recorder
        .runs_for_job(&args.job, args.limit)?
        .into_iter()
        .map(RunRow)
        .collect();
    let empty = format!("No runs recorded for {}", args.job);
    println!("{}", render_table(HEADER, &rows, &empty, args.output));
    Ok(ExitCode::SUCCESS)
}
