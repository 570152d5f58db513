// SPDX-License-Identifier: MIT

//! Durable functions registry on SQLite
//!
//! One connection per `SqliteRegistry`, serialized by a mutex. Separate
//! processes open their own connections to the same file; SQLite's locking
//! plus the busy timeout make each statement atomic across them.

use chrono::{DateTime, TimeZone, Utc};
use fnreg_core::{
    EventId, FunctionRun, InvocationId, NewRun, RegistryStore, RunId, RunSelector, StoreError,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// Schema version written to `registry_meta`
pub const SCHEMA_VERSION: i64 = 1;

const RUN_COLUMNS: &str = "run_id, event_id, job_name, invocation_id, triggered_by_id, \
                           time_start, time_finish, params";

/// Errors from the SQLite registry
#[derive(Debug, Error)]
pub enum SqliteError {
    #[error("sqlite error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("registry schema version {found} is newer than supported {supported}")]
    SchemaTooNew { found: i64, supported: i64 },
    #[error("invocation id {0} does not fit in an INTEGER column")]
    OutOfRange(u64),
    #[error("corrupt row {run_id}: {reason}")]
    Corrupt { run_id: i64, reason: String },
}

impl From<SqliteError> for StoreError {
    fn from(err: SqliteError) -> Self {
        match err {
            SqliteError::Json(_) | SqliteError::Corrupt { .. } | SqliteError::OutOfRange(_) => {
                StoreError::Corrupt(err.to_string())
            }
            SqliteError::Db(_) | SqliteError::Io(_) | SqliteError::SchemaTooNew { .. } => {
                StoreError::Unavailable(err.to_string())
            }
        }
    }
}

/// SQLite journal mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "wal",
            JournalMode::Delete => "delete",
        }
    }
}

/// Connection settings for the registry database
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub journal_mode: JournalMode,
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
            journal_mode: JournalMode::default(),
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}

/// Functions registry stored in a SQLite database
#[derive(Clone, Debug)]
pub struct SqliteRegistry {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRegistry {
    /// Open (creating if needed) the registry described by `config`
    pub fn open(config: &SqliteConfig) -> Result<Self, SqliteError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = {};",
            config.journal_mode.pragma_value()
        ))?;
        tracing::debug!(path = %config.path.display(), "opened registry database");
        Self::with_connection(conn)
    }

    pub fn open_path(path: &Path) -> Result<Self, SqliteError> {
        Self::open(&SqliteConfig::new(path))
    }

    /// Private in-memory database, mostly for tests
    pub fn open_in_memory() -> Result<Self, SqliteError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, SqliteError> {
        initialize_schema(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn query_runs(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<FunctionRun>, SqliteError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let raw = stmt
            .query_map(args, RawRun::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter().map(RawRun::into_run).collect()
    }

    fn insert(&self, run: &NewRun, time_start: DateTime<Utc>) -> Result<RunId, SqliteError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO functions_registry \
             (event_id, job_name, invocation_id, triggered_by_id, time_start) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run.event_id.as_ref().map(EventId::as_str),
                run.job_name,
                id_to_sql(run.invocation_id)?,
                id_to_sql(run.triggered_by_id)?,
                time_start.timestamp_millis(),
            ],
        )?;
        Ok(RunId(conn.last_insert_rowid()))
    }

    fn finish(
        &self,
        selector: &RunSelector,
        time_finish: DateTime<Utc>,
        params: Option<&Value>,
    ) -> Result<usize, SqliteError> {
        let params_json = params.map(serde_json::to_string).transpose()?;
        let finish_ms = time_finish.timestamp_millis();
        let conn = self.conn();
        let rows = match selector {
            RunSelector::Run(run_id) => conn.execute(
                "UPDATE functions_registry \
                 SET time_finish = MAX(?1, time_start), params = COALESCE(?2, params) \
                 WHERE run_id = ?3 AND time_finish IS NULL",
                params![finish_ms, params_json, run_id.0],
            )?,
            RunSelector::Event(event_id) => conn.execute(
                "UPDATE functions_registry \
                 SET time_finish = MAX(?1, time_start), params = COALESCE(?2, params) \
                 WHERE event_id = ?3 AND time_finish IS NULL",
                params![finish_ms, params_json, event_id.as_str()],
            )?,
        };
        Ok(rows)
    }

    fn count(
        &self,
        job_name: &str,
        since: DateTime<Utc>,
        exclude: Option<RunId>,
    ) -> Result<u64, SqliteError> {
        let conn = self.conn();
        // run ids start at 1, so 0 excludes nothing
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM functions_registry \
             WHERE job_name = ?1 AND time_start > ?2 AND time_finish IS NULL AND run_id != ?3",
            params![job_name, since.timestamp_millis(), exclude.map_or(0, |id| id.0)],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn get(&self, run_id: RunId) -> Result<Option<FunctionRun>, SqliteError> {
        let raw = {
            let conn = self.conn();
            conn.query_row(
                &format!("SELECT {RUN_COLUMNS} FROM functions_registry WHERE run_id = ?1"),
                params![run_id.0],
                RawRun::from_row,
            )
            .optional()?
        };
        raw.map(RawRun::into_run).transpose()
    }
}

impl RegistryStore for SqliteRegistry {
    fn insert_run(&self, run: &NewRun, time_start: DateTime<Utc>) -> Result<RunId, StoreError> {
        Ok(self.insert(run, time_start)?)
    }

    fn finish_runs(
        &self,
        selector: &RunSelector,
        time_finish: DateTime<Utc>,
        params: Option<&Value>,
    ) -> Result<usize, StoreError> {
        Ok(self.finish(selector, time_finish, params)?)
    }

    fn count_in_flight(
        &self,
        job_name: &str,
        since: DateTime<Utc>,
        exclude: Option<RunId>,
    ) -> Result<u64, StoreError> {
        Ok(self.count(job_name, since, exclude)?)
    }

    fn get_run(&self, run_id: RunId) -> Result<Option<FunctionRun>, StoreError> {
        Ok(self.get(run_id)?)
    }

    fn runs_for_job(&self, job_name: &str, limit: usize) -> Result<Vec<FunctionRun>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(self.query_runs(
            &format!(
                "SELECT {RUN_COLUMNS} FROM functions_registry \
                 WHERE job_name = ?1 ORDER BY run_id DESC LIMIT ?2"
            ),
            params![job_name, limit],
        )?)
    }

    fn runs_for_event(&self, event_id: &EventId) -> Result<Vec<FunctionRun>, StoreError> {
        Ok(self.query_runs(
            &format!(
                "SELECT {RUN_COLUMNS} FROM functions_registry \
                 WHERE event_id = ?1 ORDER BY run_id ASC"
            ),
            params![event_id.as_str()],
        )?)
    }
}

/// Row as stored, before timestamp and JSON decoding
struct RawRun {
    run_id: i64,
    event_id: Option<String>,
    job_name: String,
    invocation_id: Option<i64>,
    triggered_by_id: Option<i64>,
    time_start: i64,
    time_finish: Option<i64>,
    params: Option<String>,
}

impl RawRun {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            run_id: row.get(0)?,
            event_id: row.get(1)?,
            job_name: row.get(2)?,
            invocation_id: row.get(3)?,
            triggered_by_id: row.get(4)?,
            time_start: row.get(5)?,
            time_finish: row.get(6)?,
            params: row.get(7)?,
        })
    }

    fn into_run(self) -> Result<FunctionRun, SqliteError> {
        let run_id = self.run_id;
        let corrupt = |reason: &str| SqliteError::Corrupt {
            run_id,
            reason: reason.to_string(),
        };
        let time_start = ms_to_dt(self.time_start).ok_or_else(|| corrupt("bad time_start"))?;
        let time_finish = match self.time_finish {
            Some(ms) => Some(ms_to_dt(ms).ok_or_else(|| corrupt("bad time_finish"))?),
            None => None,
        };
        let invocation_id =
            sql_to_id(self.invocation_id).ok_or_else(|| corrupt("negative invocation_id"))?;
        let triggered_by_id =
            sql_to_id(self.triggered_by_id).ok_or_else(|| corrupt("negative triggered_by_id"))?;
        let params = self.params.as_deref().map(serde_json::from_str).transpose()?;

        Ok(FunctionRun {
            run_id: RunId(self.run_id),
            event_id: self.event_id.map(EventId),
            job_name: self.job_name,
            invocation_id,
            triggered_by_id,
            time_start,
            time_finish,
            params,
        })
    }
}

fn ms_to_dt(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn id_to_sql(id: Option<InvocationId>) -> Result<Option<i64>, SqliteError> {
    id.map(|id| i64::try_from(id.0).map_err(|_| SqliteError::OutOfRange(id.0)))
        .transpose()
}

/// `None` when the stored value is negative; `Some(None)` for NULL
fn sql_to_id(value: Option<i64>) -> Option<Option<InvocationId>> {
    match value {
        None => Some(None),
        Some(v) => u64::try_from(v).ok().map(|v| Some(InvocationId(v))),
    }
}

fn initialize_schema(conn: &mut Connection) -> Result<(), SqliteError> {
    let tx = conn.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS registry_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM registry_meta LIMIT 1", [], |row| row.get(0))
        .optional()?;
    match version {
        Some(found) if found > SCHEMA_VERSION => {
            return Err(SqliteError::SchemaTooNew {
                found,
                supported: SCHEMA_VERSION,
            });
        }
        Some(_) => {}
        None => {
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS functions_registry (
                    run_id          INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_id        TEXT,
                    job_name        TEXT NOT NULL,
                    invocation_id   INTEGER,
                    triggered_by_id INTEGER,
                    time_start      INTEGER NOT NULL,
                    time_finish     INTEGER,
                    params          TEXT
                );
                CREATE INDEX IF NOT EXISTS functions_registry_job_start
                    ON functions_registry (job_name, time_start);
                CREATE INDEX IF NOT EXISTS functions_registry_event
                    ON functions_registry (event_id);",
            )?;
            tx.execute(
                "INSERT INTO registry_meta (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            tracing::info!(version = SCHEMA_VERSION, "initialized registry schema");
        }
    }
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
