// SPDX-License-Identifier: MIT

//! User-friendly error display with context and suggestions.

use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Error with context and recovery suggestions for user-friendly display.
#[derive(Debug)]
pub struct FnregError {
    /// What went wrong
    pub message: String,
    /// Why it might have happened
    pub context: Vec<String>,
    /// How to fix it
    pub suggestions: Vec<String>,
}

impl FnregError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Another run of the job is in flight.
    pub fn lock_held(job: &str, staleness: Duration) -> Self {
        FnregError::new(format!("Job '{}' is already running", job))
            .with_context(format!(
                "An unfinished run started within the last {}",
                humantime::format_duration(staleness)
            ))
            .with_suggestion("Retry later; the current run releases the lock when it exits")
            .with_suggestion(format!("Inspect recent runs: fnreg runs {}", job))
    }

    /// The registry database could not be opened.
    pub fn registry_unavailable(path: &Path, cause: &dyn std::error::Error) -> Self {
        FnregError::new(format!("Cannot open registry at {}", path.display()))
            .with_context(cause.to_string())
            .with_suggestion("Check the --db path or the `database` entry in fnreg.toml")
    }
}

impl fmt::Display for FnregError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.message)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            for ctx in &self.context {
                writeln!(f, "  -> {}", ctx)?;
            }
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            writeln!(f, "suggestions:")?;
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for FnregError {}
