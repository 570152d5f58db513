// SPDX-License-Identifier: MIT

//! Registry store trait: the shared table every instance coordinates through
//!
//! Implementations must make each call atomic and immediately visible to
//! other processes. No implementation may cache rows; correctness depends on
//! re-reading the shared table on every check.

use crate::error::StoreError;
use crate::run::{EventId, FunctionRun, NewRun, RunId, RunSelector};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Durable storage of function-run rows
pub trait RegistryStore: Send + Sync {
    /// Insert an in-flight row and return its store-assigned id
    fn insert_run(&self, run: &NewRun, time_start: DateTime<Utc>) -> Result<RunId, StoreError>;

    /// Close in-flight rows matched by `selector`, returning how many changed
    ///
    /// Already-finished rows are never touched. A finish time earlier than
    /// the row's start is clamped to the start.
    fn finish_runs(
        &self,
        selector: &RunSelector,
        time_finish: DateTime<Utc>,
        params: Option<&Value>,
    ) -> Result<usize, StoreError>;

    /// Count in-flight rows for `job_name` started after `since`, skipping `exclude`
    fn count_in_flight(
        &self,
        job_name: &str,
        since: DateTime<Utc>,
        exclude: Option<RunId>,
    ) -> Result<u64, StoreError>;

    fn get_run(&self, run_id: RunId) -> Result<Option<FunctionRun>, StoreError>;

    /// Most recent rows for a job, newest first
    fn runs_for_job(&self, job_name: &str, limit: usize) -> Result<Vec<FunctionRun>, StoreError>;

    /// All rows recorded for an event, oldest first
    fn runs_for_event(&self, event_id: &EventId) -> Result<Vec<FunctionRun>, StoreError>;
}

impl<S: RegistryStore + ?Sized> RegistryStore for Arc<S> {
    fn insert_run(&self, run: &NewRun, time_start: DateTime<Utc>) -> Result<RunId, StoreError> {
        (**self).insert_run(run, time_start)
    }

    fn finish_runs(
        &self,
        selector: &RunSelector,
        time_finish: DateTime<Utc>,
        params: Option<&Value>,
    ) -> Result<usize, StoreError> {
        (**self).finish_runs(selector, time_finish, params)
    }

    fn count_in_flight(
        &self,
        job_name: &str,
        since: DateTime<Utc>,
        exclude: Option<RunId>,
    ) -> Result<u64, StoreError> {
        (**self).count_in_flight(job_name, since, exclude)
    }

    fn get_run(&self, run_id: RunId) -> Result<Option<FunctionRun>, StoreError> {
        (**self).get_run(run_id)
    }

    fn runs_for_job(&self, job_name: &str, limit: usize) -> Result<Vec<FunctionRun>, StoreError> {
        (**self).runs_for_job(job_name, limit)
    }

    fn runs_for_event(&self, event_id: &EventId) -> Result<Vec<FunctionRun>, StoreError> {
        (**self).runs_for_event(event_id)
    }
}
