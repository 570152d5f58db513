// SPDX-License-Identifier: MIT

//! Table-backed lock with staleness-based expiry
//!
//! A lock is a registry row with no finish time. Holders that crash never
//! finish their row; once the row is older than the staleness window it no
//! longer blocks anyone, trading strict exclusion for liveness.
//!
//! Check and insert are separate store calls, so two callers can both pass
//! the first check. A second check after inserting detects most such races;
//! the caller that detects one backs out. This narrows the window but does
//! not close it.

use crate::clock::{window_start, Clock};
use crate::error::GuardError;
use crate::recorder::RunRecorder;
use crate::registry::RegistryStore;
use crate::run::{FinishOutcome, InvocationId, NewRun, RunId, RunSelector};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default staleness window for locks
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(5 * 60);

/// Lock configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Job name identifying this lock
    pub job_name: String,
    /// How long an unfinished run keeps blocking others
    #[serde(with = "humantime_serde")]
    pub staleness: Duration,
    /// Causality id recorded on the holder's row
    #[serde(default)]
    pub invocation_id: Option<InvocationId>,
    #[serde(default)]
    pub triggered_by_id: Option<InvocationId>,
}

impl LockConfig {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            staleness: DEFAULT_STALENESS,
            invocation_id: None,
            triggered_by_id: None,
        }
    }

    pub fn with_staleness(mut self, staleness: Duration) -> Self {
        self.staleness = staleness;
        self
    }

    pub fn with_invocation(mut self, invocation_id: InvocationId) -> Self {
        self.invocation_id = Some(invocation_id);
        self
    }

    pub fn triggered_by(mut self, triggered_by_id: Option<InvocationId>) -> Self {
        self.triggered_by_id = triggered_by_id;
        self
    }
}

/// Acquires named locks against the registry
#[derive(Clone, Debug)]
pub struct LockManager<S, C> {
    recorder: RunRecorder<S, C>,
}

impl<S: RegistryStore, C: Clock> LockManager<S, C> {
    pub fn new(recorder: RunRecorder<S, C>) -> Self {
        Self { recorder }
    }

    pub fn recorder(&self) -> &RunRecorder<S, C> {
        &self.recorder
    }

    /// Acquire `job_name`, failing with [`GuardError::LockHeld`] if another run is in flight
    pub fn acquire(
        &self,
        job_name: &str,
        staleness: Duration,
    ) -> Result<Lock<'_, S, C>, GuardError> {
        self.acquire_with(&LockConfig::new(job_name).with_staleness(staleness))
    }

    pub fn acquire_with(&self, config: &LockConfig) -> Result<Lock<'_, S, C>, GuardError> {
        let job_name = config.job_name.as_str();
        let since = window_start(self.recorder.now(), config.staleness);

        let existing = self.recorder.find_conflicting_runs(job_name, since, None)?;
        if existing > 0 {
            tracing::info!(job = job_name, existing, "lock held by another run");
            return Err(GuardError::LockHeld {
                job_name: job_name.to_string(),
            });
        }

        let mut run = NewRun::new(job_name).triggered_by(config.triggered_by_id);
        run.invocation_id = config.invocation_id;
        let run_id = self.recorder.insert(&run)?;

        let racing = match self.recorder.find_conflicting_runs(job_name, since, Some(run_id)) {
            Ok(racing) => racing,
            Err(e) => {
                self.back_out(run_id);
                return Err(e);
            }
        };
        if racing > 0 {
            tracing::warn!(
                job = job_name,
                run_id = run_id.0,
                racing,
                "concurrent acquire detected, backing out"
            );
            self.recorder.finish_run(&RunSelector::Run(run_id), None)?;
            return Err(GuardError::LockHeld {
                job_name: job_name.to_string(),
            });
        }

        tracing::info!(job = job_name, run_id = run_id.0, "lock acquired");
        Ok(Lock {
            recorder: &self.recorder,
            job_name: job_name.to_string(),
            run_id,
            released: false,
        })
    }

    /// Run `f` while holding `job_name`; the lock is released however `f` exits
    ///
    /// A failed release is logged, not returned, so the caller still gets `f`'s value.
    pub fn with_lock<T, F>(
        &self,
        job_name: &str,
        staleness: Duration,
        f: F,
    ) -> Result<T, GuardError>
    where
        F: FnOnce(&Lock<'_, S, C>) -> T,
    {
        let lock = self.acquire(job_name, staleness)?;
        let value = f(&lock);
        let run_id = lock.run_id();
        // The work already ran; an unreleased row ages out with the window
        if let Err(e) = lock.release() {
            tracing::error!(
                job = job_name,
                run_id = run_id.0,
                error = %e,
                "failed to release lock; it will expire after the staleness window"
            );
        }
        Ok(value)
    }

    fn back_out(&self, run_id: RunId) {
        if let Err(e) = self.recorder.finish_run(&RunSelector::Run(run_id), None) {
            tracing::error!(run_id = run_id.0, error = %e, "failed to back out run");
        }
    }
}

/// A held lock; finishing its registry row releases it
///
/// Dropping the handle without calling [`Lock::release`] still finishes the
/// row, so early returns and unwinding panics release too.
#[derive(Debug)]
pub struct Lock<'a, S: RegistryStore, C: Clock> {
    recorder: &'a RunRecorder<S, C>,
    job_name: String,
    run_id: RunId,
    released: bool,
}

impl<S: RegistryStore, C: Clock> Lock<'_, S, C> {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn release(self) -> Result<FinishOutcome, GuardError> {
        self.release_inner(None)
    }

    /// Release and record an audit payload on the run
    pub fn release_with(self, params: &Value) -> Result<FinishOutcome, GuardError> {
        self.release_inner(Some(params))
    }

    fn release_inner(mut self, params: Option<&Value>) -> Result<FinishOutcome, GuardError> {
        self.released = true;
        let outcome = self
            .recorder
            .finish_run(&RunSelector::Run(self.run_id), params)?;
        tracing::info!(job = %self.job_name, run_id = self.run_id.0, "lock released");
        Ok(outcome)
    }
}

impl<S: RegistryStore, C: Clock> Drop for Lock<'_, S, C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self
            .recorder
            .finish_run(&RunSelector::Run(self.run_id), None)
        {
            Ok(_) => tracing::info!(
                job = %self.job_name,
                run_id = self.run_id.0,
                "lock released on drop"
            ),
            Err(e) => tracing::error!(
                job = %self.job_name,
                run_id = self.run_id.0,
                error = %e,
                "failed to release lock; it will expire after the staleness window"
            ),
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
