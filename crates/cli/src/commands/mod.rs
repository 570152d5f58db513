// SPDX-License-Identifier: MIT

//! CLI command implementations

pub mod event;
pub mod lock;
pub mod runs;

use fnreg_core::{InvocationId, InvocationIdGen};
use std::time::Duration;

/// Parse a staleness window such as `30s` or `5m`
pub fn parse_staleness(s: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(s).map_err(|e| e.to_string())?;
    if duration.is_zero() {
        return Err("staleness must be greater than zero".to_string());
    }
    Ok(duration)
}

/// Use the id given on the command line, or draw a fresh one
pub fn invocation_id(given: Option<u64>, ids: &impl InvocationIdGen) -> InvocationId {
    given.map_or_else(|| ids.next(), InvocationId)
}
