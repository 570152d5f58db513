// SPDX-License-Identifier: MIT

//! Function-run records kept in the shared registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned identity of a registry row
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External correlation key supplied by the message-delivery layer
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Causality identifier of a single invocation attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub u64);

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which rows a finish call closes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunSelector {
    Run(RunId),
    Event(EventId),
}

impl fmt::Display for RunSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunSelector::Run(id) => write!(f, "run:{}", id),
            RunSelector::Event(id) => write!(f, "event:{}", id),
        }
    }
}

/// Fields supplied by the caller when a run begins
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRun {
    pub job_name: String,
    pub event_id: Option<EventId>,
    pub invocation_id: Option<InvocationId>,
    /// `None` means no known trigger
    pub triggered_by_id: Option<InvocationId>,
}

impl NewRun {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            event_id: None,
            invocation_id: None,
            triggered_by_id: None,
        }
    }

    pub fn with_event(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
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

/// One row of the functions registry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionRun {
    pub run_id: RunId,
    pub event_id: Option<EventId>,
    pub job_name: String,
    pub invocation_id: Option<InvocationId>,
    pub triggered_by_id: Option<InvocationId>,
    pub time_start: DateTime<Utc>,
    pub time_finish: Option<DateTime<Utc>>,
    /// Audit payload written once at finish; never read by the guards
    pub params: Option<serde_json::Value>,
}

impl FunctionRun {
    pub fn is_in_flight(&self) -> bool {
        self.time_finish.is_none()
    }

    /// Whether this row blocks `job_name` for a window starting at `since`
    pub fn conflicts_with(
        &self,
        job_name: &str,
        since: DateTime<Utc>,
        exclude: Option<RunId>,
    ) -> bool {
        self.job_name == job_name
            && self.time_start > since
            && self.is_in_flight()
            && exclude != Some(self.run_id)
    }
}

/// Result of closing a run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishOutcome {
    Finished { rows: usize },
    /// Nothing in flight matched; normal under at-least-once delivery
    NoMatchingRun,
}

impl FinishOutcome {
    pub fn from_rows(rows: usize) -> Self {
        if rows == 0 {
            FinishOutcome::NoMatchingRun
        } else {
            FinishOutcome::Finished { rows }
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
