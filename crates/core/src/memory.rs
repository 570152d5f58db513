// SPDX-License-Identifier: MIT

//! In-process registry store
//!
//! Shares rows between clones, so several recorders built on clones of one
//! `MemoryRegistry` behave like separate instances talking to one table.

use crate::error::StoreError;
use crate::registry::RegistryStore;
use crate::run::{EventId, FunctionRun, NewRun, RunId, RunSelector};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    rows: Vec<FunctionRun>,
    last_id: i64,
    unavailable: bool,
}

/// Registry store kept in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryRegistry {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the store were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    /// Snapshot of all rows, in insertion order
    pub fn rows(&self) -> Vec<FunctionRun> {
        self.lock().rows.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn available(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        let state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("memory registry offline".to_string()));
        }
        Ok(state)
    }
}

impl RegistryStore for MemoryRegistry {
    fn insert_run(&self, run: &NewRun, time_start: DateTime<Utc>) -> Result<RunId, StoreError> {
        let mut state = self.available()?;
        state.last_id += 1;
        let run_id = RunId(state.last_id);
        state.rows.push(FunctionRun {
            run_id,
            event_id: run.event_id.clone(),
            job_name: run.job_name.clone(),
            invocation_id: run.invocation_id,
            triggered_by_id: run.triggered_by_id,
            time_start,
            time_finish: None,
            params: None,
        });
        Ok(run_id)
    }

    fn finish_runs(
        &self,
        selector: &RunSelector,
        time_finish: DateTime<Utc>,
        params: Option<&Value>,
    ) -> Result<usize, StoreError> {
        let mut state = self.available()?;
        let mut changed = 0;
        for row in state.rows.iter_mut().filter(|r| r.is_in_flight()) {
            let matches = match selector {
                RunSelector::Run(id) => row.run_id == *id,
                RunSelector::Event(id) => row.event_id.as_ref() == Some(id),
            };
            if !matches {
                continue;
            }
            row.time_finish = Some(time_finish.max(row.time_start));
            if let Some(params) = params {
                row.params = Some(params.clone());
            }
            changed += 1;
        }
        Ok(changed)
    }

    fn count_in_flight(
        &self,
        job_name: &str,
        since: DateTime<Utc>,
        exclude: Option<RunId>,
    ) -> Result<u64, StoreError> {
        let state = self.available()?;
        let count = state
            .rows
            .iter()
            .filter(|r| r.conflicts_with(job_name, since, exclude))
            .count();
        Ok(count as u64)
    }

    fn get_run(&self, run_id: RunId) -> Result<Option<FunctionRun>, StoreError> {
        let state = self.available()?;
        Ok(state.rows.iter().find(|r| r.run_id == run_id).cloned())
    }

    fn runs_for_job(&self, job_name: &str, limit: usize) -> Result<Vec<FunctionRun>, StoreError> {
        let state = self.available()?;
        Ok(state
            .rows
            .iter()
            .rev()
            .filter(|r| r.job_name == job_name)
            .take(limit)
            .cloned()
            .collect())
    }

    fn runs_for_event(&self, event_id: &EventId) -> Result<Vec<FunctionRun>, StoreError> {
        let state = self.available()?;
        Ok(state
            .rows
            .iter()
            .filter(|r| r.event_id.as_ref() == Some(event_id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
