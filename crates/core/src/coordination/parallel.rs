// SPDX-License-Identifier: MIT

//! Start/finish guard for bus-triggered jobs
//!
//! A bus-triggered job reports `start` on entry and `finish` on exit, possibly
//! from different process instances. The two calls are tied together only by
//! the delivery's event id, so the start row is always written, even when the
//! caller is told to abstain. That row is what the later finish closes.

use crate::clock::{window_start, Clock};
use crate::error::GuardError;
use crate::recorder::RunRecorder;
use crate::registry::RegistryStore;
use crate::run::{EventId, InvocationId, NewRun, RunSelector};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which end of a guarded execution is being reported
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Start,
    Finish,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Start => "start",
            Phase::Finish => "finish",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Phase::Start),
            "finish" => Ok(Phase::Finish),
            other => Err(UnknownPhase(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase: {0}")]
pub struct UnknownPhase(pub String);

/// One report from a bus-triggered job
#[derive(Clone, Debug)]
pub struct GuardEvent<'a> {
    pub phase: &'a str,
    pub event_id: Option<EventId>,
    pub invocation_id: Option<InvocationId>,
    pub triggered_by_id: Option<InvocationId>,
    pub job_name: &'a str,
    pub staleness: Duration,
    /// Recorded as the run's params on finish
    pub finish_payload: Option<Value>,
}

/// Start/finish recorder for event-triggered jobs
#[derive(Clone, Debug)]
pub struct ParallelGuard<S, C> {
    recorder: RunRecorder<S, C>,
}

impl<S: RegistryStore, C: Clock> ParallelGuard<S, C> {
    pub fn new(recorder: RunRecorder<S, C>) -> Self {
        Self { recorder }
    }

    pub fn recorder(&self) -> &RunRecorder<S, C> {
        &self.recorder
    }

    /// Record one phase of an event-triggered job
    ///
    /// Returns `true` when another instance appears to be running and this
    /// one should skip its main work. Unknown phases and missing event ids
    /// are ignored and return `false` without touching the store.
    pub fn guard_event(&self, event: GuardEvent<'_>) -> Result<bool, GuardError> {
        let phase = match event.phase.parse::<Phase>() {
            Ok(phase) => phase,
            Err(e) => {
                tracing::warn!(job = event.job_name, error = %e, "ignoring guard call");
                return Ok(false);
            }
        };
        let Some(event_id) = event.event_id else {
            tracing::warn!(job = event.job_name, %phase, "ignoring guard call without event id");
            return Ok(false);
        };

        match phase {
            Phase::Start => self.start(
                event.job_name,
                event_id,
                event.invocation_id,
                event.triggered_by_id,
                event.staleness,
            ),
            Phase::Finish => {
                self.finish(&event_id, event.finish_payload.as_ref())?;
                Ok(false)
            }
        }
    }

    /// Record the start of `event_id`, returning whether the caller is blocked
    pub fn start(
        &self,
        job_name: &str,
        event_id: EventId,
        invocation_id: Option<InvocationId>,
        triggered_by_id: Option<InvocationId>,
        staleness: Duration,
    ) -> Result<bool, GuardError> {
        let since = window_start(self.recorder.now(), staleness);
        let running = self.recorder.find_conflicting_runs(job_name, since, None)?;

        let mut run = NewRun::new(job_name)
            .with_event(event_id)
            .triggered_by(triggered_by_id);
        run.invocation_id = invocation_id;
        let run_id = self.recorder.insert(&run)?;

        let blocked = running > 0;
        if blocked {
            tracing::info!(
                job = job_name,
                run_id = run_id.0,
                running,
                "another instance is running, abstaining"
            );
        } else {
            tracing::info!(job = job_name, run_id = run_id.0, "start recorded");
        }
        Ok(blocked)
    }

    /// Record the finish of `event_id`; repeated finishes are harmless
    pub fn finish(&self, event_id: &EventId, payload: Option<&Value>) -> Result<(), GuardError> {
        self.recorder
            .finish_run(&RunSelector::Event(event_id.clone()), payload)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "parallel_tests.rs"]
mod tests;
