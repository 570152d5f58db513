// SPDX-License-Identifier: MIT

//! Error types for the execution guard

use thiserror::Error;

/// Failures reported by a registry store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("registry row is corrupt: {0}")]
    Corrupt(String),
}

/// Errors surfaced to guard callers
///
/// Contention on the parallel guard is reported as a boolean, not an error;
/// only the lock manager uses [`GuardError::LockHeld`].
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
    #[error("lock held: another instance of {job_name} is in flight")]
    LockHeld { job_name: String },
    #[error("job name must not be empty")]
    InvalidJobName,
    #[error("invocation id {0} exceeds the storable limit")]
    InvocationIdOutOfRange(u64),
}

impl GuardError {
    pub fn is_lock_held(&self) -> bool {
        matches!(self, GuardError::LockHeld { .. })
    }
}
