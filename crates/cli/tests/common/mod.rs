// SPDX-License-Identifier: MIT

//! Shared helpers for CLI integration tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory holding a registry database and optional fnreg.toml
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn db(&self) -> PathBuf {
        self.path().join("registry.db")
    }

    pub fn file(&self, rel: &str, content: &str) {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write file");
    }

    /// `fnreg` running in the project directory without a `--db` override
    pub fn bare(&self) -> Command {
        let mut cmd = Command::cargo_bin("fnreg").expect("fnreg binary not built");
        cmd.current_dir(self.path()).env_remove("RUST_LOG");
        cmd
    }

    /// `fnreg` bound to this project's registry
    pub fn fnreg(&self) -> Command {
        let mut cmd = self.bare();
        cmd.arg("--db").arg(self.db());
        cmd
    }

    pub fn start(&self, job: &str, event_id: &str) -> String {
        stdout(
            self.fnreg()
                .args(["event", "start", "--job", job, "--event-id", event_id])
                .assert()
                .success(),
        )
    }

    pub fn finish(&self, job: &str, event_id: &str) -> String {
        stdout(
            self.fnreg()
                .args(["event", "finish", "--job", job, "--event-id", event_id])
                .assert()
                .success(),
        )
    }

    pub fn runs_json(&self, job: &str) -> Vec<serde_json::Value> {
        let out = stdout(self.fnreg().args(["runs", job, "-o", "json"]).assert().success());
        serde_json::from_str(&out).expect("runs output is not JSON")
    }
}

pub fn stdout(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8_lossy(&assert.get_output().stdout).trim().to_string()
}
