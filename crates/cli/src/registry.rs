// SPDX-License-Identifier: MIT

//! Recorder factory for CLI commands

use crate::error::FnregError;
use fnreg_core::{GuardConfig, RunRecorder, SystemClock, TracedRegistry};
use fnreg_storage::{SqliteConfig, SqliteRegistry};

pub type Recorder = RunRecorder<TracedRegistry<SqliteRegistry>, SystemClock>;

/// Open the configured registry database with tracing and the system clock
pub fn open_recorder(config: &GuardConfig) -> Result<Recorder, FnregError> {
    let sqlite = SqliteConfig::new(&config.database).with_busy_timeout(config.busy_timeout);
    let store = SqliteRegistry::open(&sqlite)
        .map_err(|e| FnregError::registry_unavailable(&config.database, &e))?;
    Ok(RunRecorder::new(TracedRegistry::new(store), SystemClock))
}
