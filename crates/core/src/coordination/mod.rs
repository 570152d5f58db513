// SPDX-License-Identifier: MIT

//! Execution guards built on the functions registry
//!
//! This module provides:
//! - **LockManager** - Scoped exclusive acquisition with staleness-based expiry
//! - **ParallelGuard** - Start/finish recording for bus-triggered jobs

pub mod lock;
pub mod parallel;

pub use lock::{Lock, LockConfig, LockManager, DEFAULT_STALENESS};
pub use parallel::{GuardEvent, ParallelGuard, Phase, UnknownPhase};
