// SPDX-License-Identifier: MIT

//! Output formatting for CLI commands

use clap::ValueEnum;
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Render a single record
pub fn render<T: Serialize + Display>(value: &T, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => value.to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(value).unwrap_or_default(),
    }
}

/// Render rows as a table under `header`, or as a JSON array
///
/// An empty list renders `empty` in text mode and `[]` in JSON mode.
pub fn render_table<T: Serialize + Display>(
    header: &str,
    rows: &[T],
    empty: &str,
    format: OutputFormat,
) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(rows).unwrap_or_default(),
        OutputFormat::Text if rows.is_empty() => empty.to_string(),
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(header);
            out.push('\n');
            out.push_str(&"-".repeat(header.len()));
            for row in rows {
                out.push('\n');
                out.push_str(&row.to_string());
            }
            out
        }
    }
}
