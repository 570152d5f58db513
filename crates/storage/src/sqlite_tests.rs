// SPDX-License-Identifier: MIT

use super::*;
use chrono::Duration as ChronoDuration;
use fnreg_core::clock::{Clock, FakeClock};
use fnreg_core::coordination::{GuardEvent, LockManager, ParallelGuard};
use fnreg_core::{extract_triggered_by, GuardError, RunRecorder};
use serde_json::json;

fn at(clock: &FakeClock, seconds: i64) -> DateTime<Utc> {
    clock.now() + ChronoDuration::seconds(seconds)
}

#[test]
fn insert_and_get_round_trip() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let run = NewRun::new("send_notifications")
        .with_event(EventId::new("4242"))
        .with_invocation(InvocationId(123_456_789_012))
        .triggered_by(Some(InvocationId(999_999_999_999)));

    let run_id = store.insert_run(&run, clock.now()).unwrap();
    let row = store.get_run(run_id).unwrap().unwrap();

    assert_eq!(row.run_id, run_id);
    assert_eq!(row.job_name, "send_notifications");
    assert_eq!(row.event_id, Some(EventId::new("4242")));
    assert_eq!(row.invocation_id, Some(InvocationId(123_456_789_012)));
    assert_eq!(row.triggered_by_id, Some(InvocationId(999_999_999_999)));
    assert_eq!(row.time_start, clock.now());
    assert_eq!(row.time_finish, None);
    assert_eq!(row.params, None);
}

#[test]
fn missing_run_is_none() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    assert!(store.get_run(RunId(99)).unwrap().is_none());
}

#[test]
fn run_ids_start_at_one_and_increase() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let a = store.insert_run(&NewRun::new("job"), clock.now()).unwrap();
    let b = store.insert_run(&NewRun::new("job"), clock.now()).unwrap();
    assert_eq!(a, RunId(1));
    assert_eq!(b, RunId(2));
}

#[test]
fn finish_by_run_id_sets_time_and_params_once() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let run_id = store.insert_run(&NewRun::new("job"), clock.now()).unwrap();

    let rows = store
        .finish_runs(&RunSelector::Run(run_id), at(&clock, 2), Some(&json!({"ids": [1]})))
        .unwrap();
    let again = store
        .finish_runs(&RunSelector::Run(run_id), at(&clock, 5), Some(&json!({"ids": [2]})))
        .unwrap();

    assert_eq!(rows, 1);
    assert_eq!(again, 0);
    let row = store.get_run(run_id).unwrap().unwrap();
    assert_eq!(row.time_finish, Some(at(&clock, 2)));
    assert_eq!(row.params, Some(json!({"ids": [1]})));
}

#[test]
fn finish_by_event_id() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let event = EventId::new("evt-7");
    store
        .insert_run(&NewRun::new("job").with_event(event.clone()), clock.now())
        .unwrap();
    store.insert_run(&NewRun::new("job"), clock.now()).unwrap();

    let rows = store
        .finish_runs(&RunSelector::Event(event.clone()), at(&clock, 1), None)
        .unwrap();

    assert_eq!(rows, 1);
    let runs = store.runs_for_event(&event).unwrap();
    assert_eq!(runs.len(), 1);
    assert!(!runs[0].is_in_flight());
    assert!(store.get_run(RunId(2)).unwrap().unwrap().is_in_flight());
}

#[test]
fn finish_before_start_is_clamped() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let run_id = store.insert_run(&NewRun::new("job"), clock.now()).unwrap();

    store
        .finish_runs(&RunSelector::Run(run_id), at(&clock, -30), None)
        .unwrap();

    let row = store.get_run(run_id).unwrap().unwrap();
    assert_eq!(row.time_finish, Some(clock.now()));
}

#[test]
fn count_in_flight_applies_predicate() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let old = store.insert_run(&NewRun::new("job"), at(&clock, -10)).unwrap();
    let fresh = store.insert_run(&NewRun::new("job"), clock.now()).unwrap();
    let done = store.insert_run(&NewRun::new("job"), clock.now()).unwrap();
    store.insert_run(&NewRun::new("other"), clock.now()).unwrap();
    store
        .finish_runs(&RunSelector::Run(done), clock.now(), None)
        .unwrap();

    let since = at(&clock, -5);
    assert_eq!(store.count_in_flight("job", since, None).unwrap(), 1);
    assert_eq!(store.count_in_flight("job", since, Some(fresh)).unwrap(), 0);
    assert_eq!(store.count_in_flight("job", at(&clock, -60), Some(old)).unwrap(), 1);
    assert_eq!(store.count_in_flight("job", clock.now(), None).unwrap(), 0);
}

#[test]
fn runs_for_job_newest_first() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    for _ in 0..4 {
        store.insert_run(&NewRun::new("job"), clock.now()).unwrap();
    }

    let runs = store.runs_for_job("job", 3).unwrap();
    let ids: Vec<i64> = runs.iter().map(|r| r.run_id.0).collect();
    assert_eq!(ids, vec![4, 3, 2]);
}

#[test]
fn oversized_invocation_id_is_rejected() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let run = NewRun::new("job").with_invocation(InvocationId(u64::MAX));

    let err = store.insert_run(&run, clock.now()).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[test]
fn reopening_keeps_rows_and_never_reuses_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let clock = FakeClock::new();

    {
        let store = SqliteRegistry::open_path(&path).unwrap();
        store.insert_run(&NewRun::new("job"), clock.now()).unwrap();
    }

    let store = SqliteRegistry::open_path(&path).unwrap();
    assert_eq!(store.runs_for_job("job", 10).unwrap().len(), 1);
    let next = store.insert_run(&NewRun::new("job"), clock.now()).unwrap();
    assert_eq!(next, RunId(2));
}

#[test]
fn open_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/deeper/registry.db");
    let config = SqliteConfig::new(&path)
        .with_busy_timeout(Duration::from_millis(100))
        .with_journal_mode(JournalMode::Delete);

    SqliteRegistry::open(&config).unwrap();
    assert!(path.exists());
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    SqliteRegistry::open_path(&path).unwrap();
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute("UPDATE registry_meta SET version = ?1", params![SCHEMA_VERSION + 1])
            .unwrap();
    }

    let err = SqliteRegistry::open_path(&path).unwrap_err();
    assert!(matches!(err, SqliteError::SchemaTooNew { .. }));
}

#[test]
fn corrupt_params_surface_as_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let store = SqliteRegistry::open_path(&path).unwrap();
    let clock = FakeClock::new();
    let run_id = store.insert_run(&NewRun::new("job"), clock.now()).unwrap();
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE functions_registry SET params = 'not json' WHERE run_id = ?1",
            params![run_id.0],
        )
        .unwrap();
    }

    let err = store.get_run(run_id).unwrap_err();
    assert!(matches!(err, StoreError::Corrupt(_)));
}

#[test]
fn separate_connections_coordinate_through_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    let clock = FakeClock::new();
    let staleness = Duration::from_secs(5);

    let first = LockManager::new(RunRecorder::new(
        SqliteRegistry::open_path(&path).unwrap(),
        clock.clone(),
    ));
    let second = LockManager::new(RunRecorder::new(
        SqliteRegistry::open_path(&path).unwrap(),
        clock.clone(),
    ));

    let lock = first.acquire("send_notifications", staleness).unwrap();
    assert!(second
        .acquire("send_notifications", staleness)
        .unwrap_err()
        .is_lock_held());
    lock.release().unwrap();
    assert!(second.acquire("send_notifications", staleness).is_ok());
}

#[test]
fn parallel_guard_round_trip_on_sqlite() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let clock = FakeClock::new();
    let guard = ParallelGuard::new(RunRecorder::new(store.clone(), clock.clone()));
    let start = GuardEvent {
        phase: "start",
        event_id: Some(EventId::from(1_234u64)),
        invocation_id: Some(InvocationId(100_000_000_001)),
        triggered_by_id: None,
        job_name: "identify_updates_of_topics",
        staleness: Duration::from_secs(60),
        finish_payload: None,
    };

    assert!(!guard.guard_event(start.clone()).unwrap());
    assert!(guard
        .guard_event(GuardEvent {
            event_id: Some(EventId::from(1_235u64)),
            ..start.clone()
        })
        .unwrap());

    let finish = GuardEvent {
        phase: "finish",
        finish_payload: Some(json!({"topics": 3})),
        ..start
    };
    guard.guard_event(finish.clone()).unwrap();
    guard.guard_event(finish).unwrap();

    let rows = store.runs_for_event(&EventId::new("1234")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].params, Some(json!({"topics": 3})));
    assert_eq!(store.runs_for_job("identify_updates_of_topics", 10).unwrap().len(), 2);
}

#[test]
fn start_with_oversized_trigger_records_run_without_causality() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let guard = ParallelGuard::new(RunRecorder::new(store.clone(), FakeClock::new()));
    let payload = json!({ "triggered_by_func_id": u64::MAX });

    let blocked = guard
        .guard_event(GuardEvent {
            phase: "start",
            event_id: Some(EventId::from(77u64)),
            invocation_id: Some(InvocationId(100_000_000_002)),
            triggered_by_id: extract_triggered_by(&payload),
            job_name: "send_notifications",
            staleness: Duration::from_secs(60),
            finish_payload: None,
        })
        .unwrap();

    assert!(!blocked);
    let rows = store.runs_for_event(&EventId::from(77u64)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].triggered_by_id, None);
}

#[test]
fn recorder_rejects_oversized_id_before_the_store() {
    let store = SqliteRegistry::open_in_memory().unwrap();
    let recorder = RunRecorder::new(store.clone(), FakeClock::new());

    let err = recorder
        .insert_run("send_notifications", Some(InvocationId(u64::MAX)), None, None)
        .unwrap_err();

    assert!(matches!(err, GuardError::InvocationIdOutOfRange(u64::MAX)));
    assert!(store.runs_for_job("send_notifications", 10).unwrap().is_empty());
}
