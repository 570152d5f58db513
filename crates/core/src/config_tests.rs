// SPDX-License-Identifier: MIT

use super::*;
use tempfile::TempDir;

#[test]
fn empty_config_uses_defaults() {
    let config = GuardConfig::from_toml_str("").unwrap();
    assert_eq!(config, GuardConfig::default());
    assert_eq!(config.default_staleness, Duration::from_secs(300));
}

#[test]
fn default_staleness_matches_lock_default() {
    let lock = crate::coordination::LockConfig::new("job");
    assert_eq!(GuardConfig::default().default_staleness, lock.staleness);
}

#[test]
fn parses_humantime_durations() {
    let config = GuardConfig::from_toml_str(
        r#"
        database = "/var/lib/registry.db"
        default_staleness = "5s"
        busy_timeout = "250ms"
        log_filter = "fnreg_core=debug"
        "#,
    )
    .unwrap();

    assert_eq!(config.database, PathBuf::from("/var/lib/registry.db"));
    assert_eq!(config.default_staleness, Duration::from_secs(5));
    assert_eq!(config.busy_timeout, Duration::from_millis(250));
    assert_eq!(config.log_filter, "fnreg_core=debug");
}

#[test]
fn rejects_unknown_fields() {
    let err = GuardConfig::from_toml_str("stalenes = \"5s\"").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn rejects_bad_duration() {
    assert!(GuardConfig::from_toml_str("default_staleness = \"soon\"").is_err());
}

#[test]
fn load_resolves_database_relative_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("fnreg.toml");
    std::fs::write(&path, "database = \"runs.db\"\n").unwrap();

    let config = GuardConfig::load(&path).unwrap();
    assert_eq!(config.database, dir.path().join("runs.db"));
}

#[test]
fn load_or_default_tolerates_missing_file() {
    let dir = TempDir::new().unwrap();
    let config = GuardConfig::load_or_default(&dir.path().join("missing.toml")).unwrap();
    assert_eq!(config, GuardConfig::default());
}

#[test]
fn load_reports_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = GuardConfig::load(&dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
