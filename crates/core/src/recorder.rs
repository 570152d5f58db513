// SPDX-License-Identifier: MIT

//! Run recorder: low-level insert/finish/conflict operations on the registry
//!
//! Both the lock manager and the parallel guard go through
//! [`RunRecorder::find_conflicting_runs`], so they agree on what counts as a
//! run in flight.

use crate::clock::Clock;
use crate::error::GuardError;
use crate::id::INVOCATION_ID_LIMIT;
use crate::registry::RegistryStore;
use crate::run::{EventId, FinishOutcome, FunctionRun, InvocationId, NewRun, RunId, RunSelector};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Data access over a registry store using a given clock
#[derive(Clone, Debug)]
pub struct RunRecorder<S, C> {
    store: S,
    clock: C,
}

impl<S: RegistryStore, C: Clock> RunRecorder<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Record the start of a run; the row is in flight until finished
    pub fn insert_run(
        &self,
        job_name: &str,
        invocation_id: Option<InvocationId>,
        triggered_by_id: Option<InvocationId>,
        event_id: Option<EventId>,
    ) -> Result<RunId, GuardError> {
        let mut run = NewRun::new(job_name).triggered_by(triggered_by_id);
        run.invocation_id = invocation_id;
        run.event_id = event_id;
        self.insert(&run)
    }

    pub fn insert(&self, run: &NewRun) -> Result<RunId, GuardError> {
        if run.job_name.trim().is_empty() {
            return Err(GuardError::InvalidJobName);
        }
        for id in [run.invocation_id, run.triggered_by_id].into_iter().flatten() {
            if id.0 > INVOCATION_ID_LIMIT {
                return Err(GuardError::InvocationIdOutOfRange(id.0));
            }
        }
        let run_id = self.store.insert_run(run, self.clock.now())?;
        tracing::debug!(job = %run.job_name, run_id = run_id.0, "run recorded");
        Ok(run_id)
    }

    /// Close the in-flight run(s) matched by `selector`
    ///
    /// Finding nothing to close is reported, not raised: deliveries are
    /// at-least-once, so duplicate finishes are routine.
    pub fn finish_run(
        &self,
        selector: &RunSelector,
        params: Option<&Value>,
    ) -> Result<FinishOutcome, GuardError> {
        let rows = self.store.finish_runs(selector, self.clock.now(), params)?;
        let outcome = FinishOutcome::from_rows(rows);
        match outcome {
            FinishOutcome::Finished { rows } => {
                tracing::debug!(selector = %selector, rows, "run finished")
            }
            FinishOutcome::NoMatchingRun => {
                tracing::warn!(selector = %selector, "no in-flight run to finish")
            }
        }
        Ok(outcome)
    }

    /// Count in-flight runs of `job_name` started after `since`, other than `exclude`
    pub fn find_conflicting_runs(
        &self,
        job_name: &str,
        since: DateTime<Utc>,
        exclude: Option<RunId>,
    ) -> Result<u64, GuardError> {
        Ok(self.store.count_in_flight(job_name, since, exclude)?)
    }

    pub fn run(&self, run_id: RunId) -> Result<Option<FunctionRun>, GuardError> {
        Ok(self.store.get_run(run_id)?)
    }

    pub fn runs_for_job(
        &self,
        job_name: &str,
        limit: usize,
    ) -> Result<Vec<FunctionRun>, GuardError> {
        Ok(self.store.runs_for_job(job_name, limit)?)
    }

    pub fn runs_for_event(&self, event_id: &EventId) -> Result<Vec<FunctionRun>, GuardError> {
        Ok(self.store.runs_for_event(event_id)?)
    }
}

#[cfg(test)]
#[path = "recorder_tests.rs"]
mod tests;
