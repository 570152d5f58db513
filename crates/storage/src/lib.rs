// SPDX-License-Identifier: MIT

//! fnreg-storage: SQLite-backed functions registry

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod sqlite;

pub use sqlite::{JournalMode, SqliteConfig, SqliteError, SqliteRegistry, SCHEMA_VERSION};
