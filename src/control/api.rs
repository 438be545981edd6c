// src/control/api.rs
//! Control API surface
//!
//! The interface the bot/CLI layer drives runs through. Implementations
//! report negative conditions (`RunNotFound`, `NotSupported`,
//! `FileNotFound`) as their own error variants so callers can render a
//! user-facing message without pattern matching on transient I/O
//! failures, and reject path escapes before touching the disk.

use crate::recording::RunStatus;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Candidate log files inside a run directory, in lookup order
pub(crate) const LOG_CANDIDATES: [&str; 4] = ["stdout.log", "logs.txt", "log.txt", "run.log"];

/// Candidate report files, in lookup order
pub(crate) const REPORT_CANDIDATES: [&str; 6] = [
    "penetration_test_report.md",
    "report.txt",
    "report.md",
    "report.html",
    "report.json",
    "report.pdf",
];

/// Maximum characters returned by `get_report_summary`
pub(crate) const REPORT_SUMMARY_CHARS: usize = 4000;

/// Summary of one run as seen by the control surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: String,
    pub target: String,
    pub status: RunStatus,
    pub severity_summary: Option<HashMap<String, usize>>,
    pub started_at: Option<String>,
    pub instruction: Option<String>,
}

impl RunInfo {
    /// A run only known from its directory on disk
    pub fn unknown(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            target: "unknown".to_string(),
            status: RunStatus::Unknown,
            severity_summary: None,
            started_at: None,
            instruction: None,
        }
    }
}

/// One directory entry inside a run directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Path relative to the run directory
    pub path: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Location and size of a file inside a run directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    pub path: PathBuf,
    pub size: u64,
}

/// Control surface consumed by the bot/CLI layer.
///
/// Read operations work against the run directory on disk; lifecycle
/// operations (`start_run`, `resume_run`, `stop_run`) are only available
/// on implementations wired to a live engine.
#[async_trait]
pub trait ControlApi: Send + Sync {
    /// Start a new run against `target`
    async fn start_run(&self, target: &str, instruction: Option<&str>) -> Result<RunInfo>;

    /// Most recent runs, newest first, at most `limit`
    async fn list_runs(&self, limit: usize) -> Result<Vec<RunInfo>>;

    /// Info for one run; `RunNotFound` if it is neither active nor on disk
    async fn get_run_info(&self, run_id: &str) -> Result<RunInfo>;

    /// Lines `offset..offset+limit` of the run's log file; empty when the
    /// run has no log yet
    async fn tail_logs(&self, run_id: &str, offset: usize, limit: usize) -> Result<Vec<String>>;

    /// First [`REPORT_SUMMARY_CHARS`] characters of the run's report;
    /// empty when no report exists yet
    async fn get_report_summary(&self, run_id: &str) -> Result<String>;

    /// Path of the run's report file, when one exists
    async fn get_report_file(&self, run_id: &str) -> Result<Option<PathBuf>>;

    /// Size and resolved path of a file inside the run directory;
    /// `Ok(None)` when no such file exists
    async fn get_file_metadata(&self, run_id: &str, path: &str) -> Result<Option<FileMetadata>>;

    /// Directory listing inside the run directory; empty when `path` does
    /// not name an existing directory
    async fn list_files(&self, run_id: &str, path: &str) -> Result<Vec<FileEntry>>;

    /// Contents of a file inside the run directory
    async fn read_file(&self, run_id: &str, path: &str) -> Result<Vec<u8>>;

    /// Reattach to an active run; `Ok(false)` when it is not resumable
    async fn resume_run(&self, run_id: &str) -> Result<bool>;

    /// Stop an active run; `Ok(false)` when it is not active
    async fn stop_run(&self, run_id: &str) -> Result<bool>;
}

/// Join `subpath` onto `base` after checking it cannot escape.
///
/// Purely lexical, so the check happens before any I/O: absolute paths,
/// `..` components, and prefix components are all rejected.
pub(crate) fn safe_join(base: &Path, subpath: &str) -> Result<PathBuf> {
    let rel = Path::new(subpath);
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(EngineError::PathViolation(subpath.to_string())),
        }
    }
    Ok(base.join(rel))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_join_accepts_nested_relative() {
        let joined = safe_join(Path::new("/runs/run-1"), "vulnerabilities/vuln-0001.md").unwrap();
        assert_eq!(
            joined,
            Path::new("/runs/run-1/vulnerabilities/vuln-0001.md")
        );
    }

    #[test]
    fn test_safe_join_rejects_parent_traversal() {
        let err = safe_join(Path::new("/runs/run-1"), "../other-run/secrets").unwrap_err();
        assert!(matches!(err, EngineError::PathViolation(_)));

        let err = safe_join(Path::new("/runs/run-1"), "logs/../../escape").unwrap_err();
        assert!(matches!(err, EngineError::PathViolation(_)));
    }

    #[test]
    fn test_safe_join_rejects_absolute() {
        let err = safe_join(Path::new("/runs/run-1"), "/etc/passwd").unwrap_err();
        assert!(matches!(err, EngineError::PathViolation(_)));
    }
}
