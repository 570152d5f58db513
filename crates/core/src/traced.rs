// SPDX-License-Identifier: MIT

//! Traced registry wrapper for consistent observability

use crate::error::StoreError;
use crate::registry::RegistryStore;
use crate::run::{EventId, FunctionRun, NewRun, RunId, RunSelector};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Instant;

/// Wrapper that adds tracing to any RegistryStore
#[derive(Clone, Debug)]
pub struct TracedRegistry<S> {
    inner: S,
}

impl<S> TracedRegistry<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

impl<S: RegistryStore> RegistryStore for TracedRegistry<S> {
    fn insert_run(&self, run: &NewRun, time_start: DateTime<Utc>) -> Result<RunId, StoreError> {
        let span = tracing::info_span!(
            "registry.insert",
            job = %run.job_name,
            event_id = run.event_id.as_ref().map(|e| e.as_str()),
        );
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.insert_run(run, time_start);

        match &result {
            Ok(run_id) => {
                tracing::debug!(run_id = run_id.0, elapsed_ms = elapsed_ms(start), "inserted")
            }
            Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "insert failed"),
        }

        result
    }

    fn finish_runs(
        &self,
        selector: &RunSelector,
        time_finish: DateTime<Utc>,
        params: Option<&Value>,
    ) -> Result<usize, StoreError> {
        let span = tracing::info_span!("registry.finish", selector = %selector);
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.finish_runs(selector, time_finish, params);

        match &result {
            Ok(rows) => tracing::debug!(
                rows,
                has_params = params.is_some(),
                elapsed_ms = elapsed_ms(start),
                "finished"
            ),
            Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "finish failed"),
        }

        result
    }

    fn count_in_flight(
        &self,
        job_name: &str,
        since: DateTime<Utc>,
        exclude: Option<RunId>,
    ) -> Result<u64, StoreError> {
        let span = tracing::info_span!(
            "registry.count_in_flight",
            job = job_name,
            since = %since,
            exclude = exclude.map(|id| id.0),
        );
        let _guard = span.enter();

        let start = Instant::now();
        let result = self.inner.count_in_flight(job_name, since, exclude);

        match &result {
            Ok(count) => tracing::trace!(count, elapsed_ms = elapsed_ms(start), "counted"),
            Err(e) => tracing::error!(elapsed_ms = elapsed_ms(start), error = %e, "count failed"),
        }

        result
    }

    fn get_run(&self, run_id: RunId) -> Result<Option<FunctionRun>, StoreError> {
        let result = self.inner.get_run(run_id);
        let found = result.as_ref().map(|r| r.is_some()).ok();
        tracing::trace!(run_id = run_id.0, found = ?found, "looked up");
        result
    }

    fn runs_for_job(&self, job_name: &str, limit: usize) -> Result<Vec<FunctionRun>, StoreError> {
        let result = self.inner.runs_for_job(job_name, limit);
        if let Err(e) = &result {
            tracing::error!(job = job_name, error = %e, "listing runs failed");
        }
        result
    }

    fn runs_for_event(&self, event_id: &EventId) -> Result<Vec<FunctionRun>, StoreError> {
        let result = self.inner.runs_for_event(event_id);
        if let Err(e) = &result {
            tracing::error!(event_id = event_id.as_str(), error = %e, "listing event runs failed");
        }
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
