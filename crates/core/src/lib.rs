// SPDX-License-Identifier: MIT

//! fnreg-core: Distributed execution guard for stateless functions
//!
//! This crate provides:
//! - The function-run data model and the `RegistryStore` trait
//! - A run recorder with the shared "in flight" predicate
//! - A scoped lock manager and a start/finish parallel guard
//! - Causality id generation and trigger extraction
//! - Clock abstraction and an in-memory store for tests

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod config;
pub mod error;
pub mod id;
pub mod run;

pub mod coordination;
pub mod memory;
pub mod recorder;
pub mod registry;
pub mod traced;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{ConfigError, GuardConfig};
pub use coordination::{GuardEvent, Lock, LockConfig, LockManager, ParallelGuard, Phase};
pub use error::{GuardError, StoreError};
pub use id::{
    extract_triggered_by, new_invocation_id, InvocationIdGen, RandomIdGen, SequentialIdGen,
    INVOCATION_ID_LIMIT,
};
pub use memory::MemoryRegistry;
pub use recorder::RunRecorder;
pub use registry::RegistryStore;
pub use run::{EventId, FinishOutcome, FunctionRun, InvocationId, NewRun, RunId, RunSelector};
pub use traced::TracedRegistry;
