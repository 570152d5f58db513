// SPDX-License-Identifier: MIT

//! Causality identifiers for tracing which invocation triggered which
//!
//! The hosting layer does not expose an invocation id to business logic, so
//! every invocation draws its own. Collisions are accepted: the id exists for
//! causal tracing, not for correctness.

use crate::run::InvocationId;
use rand::Rng;
use serde_json::Value;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Smallest twelve-digit invocation id
pub const INVOCATION_ID_MIN: u64 = 100_000_000_000;
/// Largest twelve-digit invocation id
pub const INVOCATION_ID_MAX: u64 = 999_999_999_999;

/// Largest id a registry row can carry (signed 64-bit storage)
pub const INVOCATION_ID_LIMIT: u64 = i64::MAX as u64;

/// Payload field carrying the invocation id of the triggering run
pub const TRIGGERED_BY_FIELD: &str = "triggered_by_func_id";

pub fn invocation_id_range() -> RangeInclusive<u64> {
    INVOCATION_ID_MIN..=INVOCATION_ID_MAX
}

/// Generates invocation identifiers
pub trait InvocationIdGen: Clone + Send + Sync {
    fn next(&self) -> InvocationId;
}

/// Uniform random ids over the twelve-digit range
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIdGen;

impl InvocationIdGen for RandomIdGen {
    fn next(&self) -> InvocationId {
        InvocationId(rand::thread_rng().gen_range(invocation_id_range()))
    }
}

/// Sequential ids for testing, counting up from the bottom of the range
#[derive(Clone, Debug)]
pub struct SequentialIdGen {
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new() -> Self {
        Self::starting_at(INVOCATION_ID_MIN)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(first)),
        }
    }
}

impl Default for SequentialIdGen {
    fn default() -> Self {
        Self::new()
    }
}

impl InvocationIdGen for SequentialIdGen {
    fn next(&self) -> InvocationId {
        InvocationId(self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

/// Draw a fresh random invocation id
pub fn new_invocation_id() -> InvocationId {
    RandomIdGen.next()
}

/// Read the triggering invocation id from an inbound event payload
///
/// Accepts a non-negative integer or a decimal string no larger than
/// [`INVOCATION_ID_LIMIT`]. Anything else, including a missing field or a
/// non-object payload, yields `None`.
pub fn extract_triggered_by(payload: &Value) -> Option<InvocationId> {
    let field = payload.as_object()?.get(TRIGGERED_BY_FIELD)?;
    let parsed = match field {
        Value::Null => return None,
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .filter(|id| *id <= INVOCATION_ID_LIMIT);
    if parsed.is_none() {
        tracing::debug!(value = %field, "malformed trigger metadata, treating as unknown");
    }
    parsed.map(InvocationId)
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
