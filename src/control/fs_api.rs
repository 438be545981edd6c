// src/control/fs_api.rs
//! Filesystem-backed control API
//!
//! Read-only view over run directories that already exist on disk, for
//! operators inspecting past runs without a live engine. Lifecycle
//! operations return `NotSupported`. Listings are sorted newest first by
//! directory mtime and cached for a short TTL to keep chatty bot
//! frontends from hammering the disk.

use crate::control::api::{
    safe_join, ControlApi, FileEntry, FileMetadata, RunInfo, LOG_CANDIDATES, REPORT_CANDIDATES,
    REPORT_SUMMARY_CHARS,
};
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::fs;

/// Default listing cache TTL
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10);

/// Read-only control API over existing run directories
pub struct FileSystemControlApi {
    runs_dir: PathBuf,
    cache_ttl: Duration,
    runs_cache: Mutex<Option<(Vec<RunInfo>, Instant)>>,
}

impl FileSystemControlApi {
    pub fn new(runs_dir: impl Into<PathBuf>) -> Self {
        Self::with_cache_ttl(runs_dir, DEFAULT_CACHE_TTL)
    }

    pub fn with_cache_ttl(runs_dir: impl Into<PathBuf>, cache_ttl: Duration) -> Self {
        Self {
            runs_dir: runs_dir.into(),
            cache_ttl,
            runs_cache: Mutex::new(None),
        }
    }

    /// Resolve an existing run directory; `RunNotFound` otherwise
    async fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        let dir = safe_join(&self.runs_dir, run_id)?;
        if !dir.is_dir() {
            return Err(EngineError::RunNotFound(run_id.to_string()));
        }
        Ok(dir)
    }
}

#[async_trait]
impl ControlApi for FileSystemControlApi {
    async fn start_run(&self, _target: &str, _instruction: Option<&str>) -> Result<RunInfo> {
        Err(EngineError::NotSupported(
            "start_run requires a live engine".to_string(),
        ))
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<RunInfo>> {
        {
            let cache = self.runs_cache.lock();
            if let Some((runs, at)) = cache.as_ref() {
                if at.elapsed() < self.cache_ttl {
                    return Ok(runs.iter().take(limit).cloned().collect());
                }
            }
        }

        let runs = list_run_dirs(&self.runs_dir).await?;
        *self.runs_cache.lock() = Some((runs.clone(), Instant::now()));
        Ok(runs.into_iter().take(limit).collect())
    }

    async fn get_run_info(&self, run_id: &str) -> Result<RunInfo> {
        self.run_dir(run_id).await?;
        Ok(RunInfo::unknown(run_id))
    }

    async fn tail_logs(&self, run_id: &str, offset: usize, limit: usize) -> Result<Vec<String>> {
        let dir = self.run_dir(run_id).await?;
        tail_log_lines(&dir, offset, limit).await
    }

    async fn get_report_summary(&self, run_id: &str) -> Result<String> {
        let dir = self.run_dir(run_id).await?;
        read_report_summary(&dir).await
    }

    async fn get_report_file(&self, run_id: &str) -> Result<Option<PathBuf>> {
        let dir = self.run_dir(run_id).await?;
        Ok(find_report_file(&dir))
    }

    async fn get_file_metadata(&self, run_id: &str, path: &str) -> Result<Option<FileMetadata>> {
        let dir = self.run_dir(run_id).await?;
        file_metadata(&dir, path).await
    }

    async fn list_files(&self, run_id: &str, path: &str) -> Result<Vec<FileEntry>> {
        let dir = self.run_dir(run_id).await?;
        list_dir_entries(&dir, path).await
    }

    async fn read_file(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        let dir = self.run_dir(run_id).await?;
        read_run_file(&dir, path).await
    }

    async fn resume_run(&self, _run_id: &str) -> Result<bool> {
        Err(EngineError::NotSupported(
            "resume_run requires a live engine".to_string(),
        ))
    }

    async fn stop_run(&self, _run_id: &str) -> Result<bool> {
        Err(EngineError::NotSupported(
            "stop_run requires a live engine".to_string(),
        ))
    }
}

/// Run directories under `runs_dir`, newest mtime first
pub(crate) async fn list_run_dirs(runs_dir: &Path) -> Result<Vec<RunInfo>> {
    if !runs_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut dir = fs::read_dir(runs_dir).await?;
    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_dir() {
            continue;
        }
        let mtime = metadata
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        entries.push((entry.file_name().to_string_lossy().into_owned(), mtime));
    }
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(entries
        .into_iter()
        .map(|(name, _)| RunInfo::unknown(name))
        .collect())
}

/// Lines `offset..offset+limit` of the run's log, empty when no log exists
pub(crate) async fn tail_log_lines(
    run_dir: &Path,
    offset: usize,
    limit: usize,
) -> Result<Vec<String>> {
    let log_file = LOG_CANDIDATES
        .iter()
        .map(|name| run_dir.join(name))
        .find(|path| path.is_file());
    let Some(log_file) = log_file else {
        return Ok(Vec::new());
    };

    let content = fs::read_to_string(&log_file).await?;
    Ok(content
        .lines()
        .skip(offset)
        .take(limit)
        .map(str::to_string)
        .collect())
}

/// The run's report file, when one exists
pub(crate) fn find_report_file(run_dir: &Path) -> Option<PathBuf> {
    REPORT_CANDIDATES
        .iter()
        .map(|name| run_dir.join(name))
        .find(|path| path.is_file())
}

/// First [`REPORT_SUMMARY_CHARS`] characters of the run's report
pub(crate) async fn read_report_summary(run_dir: &Path) -> Result<String> {
    let Some(report_file) = find_report_file(run_dir) else {
        return Ok(String::new());
    };
    let content = fs::read_to_string(&report_file).await?;
    Ok(content.chars().take(REPORT_SUMMARY_CHARS).collect())
}

/// `Ok(None)` when `path` does not name an existing regular file
pub(crate) async fn file_metadata(run_dir: &Path, path: &str) -> Result<Option<FileMetadata>> {
    let target = safe_join(run_dir, path)?;
    match fs::metadata(&target).await {
        Ok(metadata) if metadata.is_file() => Ok(Some(FileMetadata {
            path: target,
            size: metadata.len(),
        })),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Entries of a directory inside the run directory, empty when `path`
/// does not name an existing directory
pub(crate) async fn list_dir_entries(run_dir: &Path, path: &str) -> Result<Vec<FileEntry>> {
    let base = safe_join(run_dir, path)?;
    if !base.is_dir() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    let mut dir = fs::read_dir(&base).await?;
    while let Some(entry) = dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        let rel = entry
            .path()
            .strip_prefix(run_dir)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| entry.file_name().to_string_lossy().into_owned());
        results.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: rel,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
        });
    }
    Ok(results)
}

/// Contents of a file inside the run directory
pub(crate) async fn read_run_file(run_dir: &Path, path: &str) -> Result<Vec<u8>> {
    let target = safe_join(run_dir, path)?;
    if !target.is_file() {
        return Err(EngineError::FileNotFound(path.to_string()));
    }
    Ok(fs::read(&target).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;
    use tempfile::tempdir;

    fn seed_run(runs_dir: &Path, run_id: &str) -> PathBuf {
        let dir = runs_dir.join(run_id);
        std_fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_lifecycle_operations_not_supported() {
        let root = tempdir().unwrap();
        let api = FileSystemControlApi::new(root.path());

        for err in [
            api.start_run("https://x", None).await.unwrap_err(),
            api.resume_run("run-1").await.unwrap_err(),
            api.stop_run("run-1").await.unwrap_err(),
        ] {
            assert!(matches!(err, EngineError::NotSupported(_)));
            assert!(err.is_negative_result());
        }
    }

    #[tokio::test]
    async fn test_list_runs_newest_first_with_limit() {
        let root = tempdir().unwrap();
        let api = FileSystemControlApi::with_cache_ttl(root.path(), Duration::ZERO);

        for run_id in ["run-old", "run-mid", "run-new"] {
            seed_run(root.path(), run_id);
            // Distinct mtimes.
            std::thread::sleep(Duration::from_millis(20));
        }
        std_fs::write(root.path().join("not-a-run.txt"), b"x").unwrap();

        let runs = api.list_runs(2).await.unwrap();
        let ids: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(ids, ["run-new", "run-mid"]);
    }

    #[tokio::test]
    async fn test_list_runs_cache() {
        let root = tempdir().unwrap();
        let api = FileSystemControlApi::with_cache_ttl(root.path(), Duration::from_secs(60));

        seed_run(root.path(), "run-a");
        assert_eq!(api.list_runs(10).await.unwrap().len(), 1);

        // Within the TTL the cached listing is served.
        seed_run(root.path(), "run-b");
        assert_eq!(api.list_runs(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_run_info_distinguishes_missing() {
        let root = tempdir().unwrap();
        let api = FileSystemControlApi::new(root.path());
        seed_run(root.path(), "run-a");

        let info = api.get_run_info("run-a").await.unwrap();
        assert_eq!(info.run_id, "run-a");

        let err = api.get_run_info("run-z").await.unwrap_err();
        assert!(matches!(err, EngineError::RunNotFound(_)));
    }

    #[tokio::test]
    async fn test_tail_logs_offset_and_limit() {
        let root = tempdir().unwrap();
        let api = FileSystemControlApi::new(root.path());
        let dir = seed_run(root.path(), "run-a");
        std_fs::write(dir.join("run.log"), "l0\nl1\nl2\nl3\nl4\n").unwrap();

        let lines = api.tail_logs("run-a", 1, 2).await.unwrap();
        assert_eq!(lines, ["l1", "l2"]);

        // A run without a log file yields an empty tail, not an error.
        seed_run(root.path(), "run-b");
        assert!(api.tail_logs("run-b", 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_summary_truncated() {
        let root = tempdir().unwrap();
        let api = FileSystemControlApi::new(root.path());
        let dir = seed_run(root.path(), "run-a");
        std_fs::write(
            dir.join("penetration_test_report.md"),
            "x".repeat(REPORT_SUMMARY_CHARS + 500),
        )
        .unwrap();

        let summary = api.get_report_summary("run-a").await.unwrap();
        assert_eq!(summary.chars().count(), REPORT_SUMMARY_CHARS);

        let report = api.get_report_file("run-a").await.unwrap().unwrap();
        assert!(report.ends_with("penetration_test_report.md"));
    }

    #[tokio::test]
    async fn test_file_access_is_path_safe() {
        let root = tempdir().unwrap();
        let api = FileSystemControlApi::new(root.path());
        let dir = seed_run(root.path(), "run-a");
        std_fs::write(dir.join("note.txt"), b"hello").unwrap();

        let err = api.read_file("run-a", "../run-b/secret").await.unwrap_err();
        assert!(matches!(err, EngineError::PathViolation(_)));
        let err = api
            .get_file_metadata("run-a", "/etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PathViolation(_)));

        assert_eq!(api.read_file("run-a", "note.txt").await.unwrap(), b"hello");
        let err = api.read_file("run-a", "missing.txt").await.unwrap_err();
        assert!(matches!(err, EngineError::FileNotFound(_)));
        assert!(api
            .get_file_metadata("run-a", "missing.txt")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_files_relative_paths() {
        let root = tempdir().unwrap();
        let api = FileSystemControlApi::new(root.path());
        let dir = seed_run(root.path(), "run-a");
        std_fs::create_dir(dir.join("vulnerabilities")).unwrap();
        std_fs::write(dir.join("vulnerabilities").join("vuln-0001.md"), b"# x").unwrap();

        let entries = api.list_files("run-a", "vulnerabilities").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "vuln-0001.md");
        assert_eq!(entries[0].path, "vulnerabilities/vuln-0001.md");
        assert!(!entries[0].is_dir);

        assert!(api.list_files("run-a", "nope").await.unwrap().is_empty());
    }
}
