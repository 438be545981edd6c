// src/control/run_control.rs
//! Engine-backed control API
//!
//! `EngineControlApi` starts runs through an injected [`ScanDriver`] and
//! tracks them in an active-run registry. Each started run gets its own
//! `RunRecorder`; the driver receives the recorder explicitly rather than
//! through any process-global handle, so concurrent runs stay isolated.
//!
//! Finished tasks are reaped lazily on the next read: the runner task
//! records its own outcome, and the reaper catches panicked tasks that
//! never got to. Read operations fall back to the run directory on disk,
//! so runs from earlier engine processes remain visible.

use crate::agents::{
    calculate_iteration_budget, classify_target, ScanConfig, DEFAULT_BASE,
};
use crate::control::api::{safe_join, ControlApi, FileEntry, FileMetadata, RunInfo};
use crate::control::fs_api::{
    file_metadata, find_report_file, list_dir_entries, list_run_dirs, read_report_summary,
    read_run_file, tail_log_lines,
};
use crate::recording::{RunRecorder, RunStatus, VulnerabilityListener};
use crate::utils::config::EngineConfig;
use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Executes the actual scan for one run.
///
/// Implementations drive the agent loop; the control API owns run
/// lifecycle, telemetry wiring, and the iteration budget.
#[async_trait]
pub trait ScanDriver: Send + Sync {
    async fn run_scan(&self, recorder: Arc<RunRecorder>, config: ScanConfig) -> Result<()>;
}

struct ActiveRun {
    recorder: Arc<RunRecorder>,
    handle: Option<JoinHandle<()>>,
    target: String,
    instruction: Option<String>,
    status: RunStatus,
    started_at: String,
    ended_at: Option<String>,
}

/// Control API wired to a live engine
pub struct EngineControlApi {
    runs_dir: PathBuf,
    llm_timeout: Option<u64>,
    driver: Arc<dyn ScanDriver>,
    active: Arc<DashMap<String, ActiveRun>>,
    listener: RwLock<Option<Arc<dyn VulnerabilityListener>>>,
}

impl EngineControlApi {
    pub fn new(config: &EngineConfig, driver: Arc<dyn ScanDriver>) -> Self {
        Self {
            runs_dir: config.storage.runs_dir.clone(),
            llm_timeout: config.llm.timeout_secs,
            driver,
            active: Arc::new(DashMap::new()),
            listener: RwLock::new(None),
        }
    }

    /// Listener attached to every subsequently started run's recorder
    pub fn set_vulnerability_listener(&self, listener: Arc<dyn VulnerabilityListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Mark finished-but-still-running entries.
    ///
    /// The runner task records completed/failed itself; anything whose
    /// task is finished while the entry still says running panicked or
    /// was torn down without cleanup.
    fn reap_finished(&self) {
        for mut entry in self.active.iter_mut() {
            let finished = entry
                .handle
                .as_ref()
                .map(|handle| handle.is_finished())
                .unwrap_or(false);
            if finished && entry.status == RunStatus::Running {
                entry.status = RunStatus::Failed;
                entry.ended_at = Some(Utc::now().to_rfc3339());
            }
        }
    }

    fn run_dir(&self, run_id: &str) -> Result<PathBuf> {
        let dir = safe_join(&self.runs_dir, run_id)?;
        if !dir.is_dir() {
            return Err(EngineError::RunNotFound(run_id.to_string()));
        }
        Ok(dir)
    }

    /// Snapshot of one active entry, without the recorder's summary
    fn basic_info(run_id: &str, entry: &ActiveRun) -> RunInfo {
        RunInfo {
            run_id: run_id.to_string(),
            target: entry.target.clone(),
            status: entry.status,
            severity_summary: None,
            started_at: Some(entry.started_at.clone()),
            instruction: entry.instruction.clone(),
        }
    }
}

#[async_trait]
impl ControlApi for EngineControlApi {
    async fn start_run(&self, target: &str, instruction: Option<&str>) -> Result<RunInfo> {
        let recorder = Arc::new(RunRecorder::new(None, &self.runs_dir));
        let run_id = recorder.run_id().await;

        if let Some(listener) = self.listener.read().clone() {
            recorder.set_vulnerability_listener(listener);
        }

        let config = ScanConfig {
            targets: vec![classify_target(target)],
            user_instructions: instruction.unwrap_or_default().to_string(),
            max_iterations: None,
        };
        recorder.set_scan_config(config.clone()).await?;

        let policy = calculate_iteration_budget(&config.targets, self.llm_timeout, DEFAULT_BASE);
        recorder.set_iteration_policy(policy).await;

        let started_at = Utc::now().to_rfc3339();
        self.active.insert(
            run_id.clone(),
            ActiveRun {
                recorder: Arc::clone(&recorder),
                handle: None,
                target: target.to_string(),
                instruction: instruction.map(str::to_string),
                status: RunStatus::Running,
                started_at: started_at.clone(),
                ended_at: None,
            },
        );

        let driver = Arc::clone(&self.driver);
        let active = Arc::clone(&self.active);
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            let outcome = driver.run_scan(Arc::clone(&recorder), config).await;
            let status = match outcome {
                Ok(()) => RunStatus::Completed,
                Err(e) => {
                    error!(run_id = %task_run_id, error = %e, "Run failed");
                    RunStatus::Failed
                }
            };
            recorder.cleanup().await;
            if let Some(mut entry) = active.get_mut(&task_run_id) {
                entry.status = status;
                entry.ended_at = Some(Utc::now().to_rfc3339());
            }
        });
        if let Some(mut entry) = self.active.get_mut(&run_id) {
            entry.handle = Some(handle);
        }

        info!(run_id = %run_id, target, "Started run");
        metrics::counter!("control_runs_started").increment(1);

        Ok(RunInfo {
            run_id,
            target: target.to_string(),
            status: RunStatus::Running,
            severity_summary: None,
            started_at: Some(started_at),
            instruction: instruction.map(str::to_string),
        })
    }

    async fn list_runs(&self, limit: usize) -> Result<Vec<RunInfo>> {
        self.reap_finished();

        // Snapshot before awaiting so no registry lock is held across
        // the recorder calls.
        let snapshot: Vec<(RunInfo, Arc<RunRecorder>)> = self
            .active
            .iter()
            .take(limit)
            .map(|entry| {
                (
                    Self::basic_info(entry.key(), &entry),
                    Arc::clone(&entry.recorder),
                )
            })
            .collect();

        let mut runs = Vec::with_capacity(snapshot.len());
        for (mut info, recorder) in snapshot {
            info.severity_summary = Some(recorder.severity_summary().await);
            runs.push(info);
        }

        // Fill the remainder with on-disk runs from earlier processes.
        if runs.len() < limit {
            let existing: std::collections::HashSet<String> =
                runs.iter().map(|r| r.run_id.clone()).collect();
            for info in list_run_dirs(&self.runs_dir).await? {
                if runs.len() >= limit {
                    break;
                }
                if !existing.contains(&info.run_id) {
                    runs.push(info);
                }
            }
        }
        Ok(runs)
    }

    async fn get_run_info(&self, run_id: &str) -> Result<RunInfo> {
        self.reap_finished();

        let snapshot = self
            .active
            .get(run_id)
            .map(|entry| (Self::basic_info(run_id, &entry), Arc::clone(&entry.recorder)));

        match snapshot {
            Some((mut info, recorder)) => {
                info.severity_summary = Some(recorder.severity_summary().await);
                Ok(info)
            }
            None => {
                self.run_dir(run_id)?;
                Ok(RunInfo::unknown(run_id))
            }
        }
    }

    async fn tail_logs(&self, run_id: &str, offset: usize, limit: usize) -> Result<Vec<String>> {
        let dir = self.run_dir(run_id)?;
        tail_log_lines(&dir, offset, limit).await
    }

    async fn get_report_summary(&self, run_id: &str) -> Result<String> {
        let dir = self.run_dir(run_id)?;
        read_report_summary(&dir).await
    }

    async fn get_report_file(&self, run_id: &str) -> Result<Option<PathBuf>> {
        let dir = self.run_dir(run_id)?;
        Ok(find_report_file(&dir))
    }

    async fn get_file_metadata(&self, run_id: &str, path: &str) -> Result<Option<FileMetadata>> {
        let dir = self.run_dir(run_id)?;
        file_metadata(&dir, path).await
    }

    async fn list_files(&self, run_id: &str, path: &str) -> Result<Vec<FileEntry>> {
        let dir = self.run_dir(run_id)?;
        list_dir_entries(&dir, path).await
    }

    async fn read_file(&self, run_id: &str, path: &str) -> Result<Vec<u8>> {
        let dir = self.run_dir(run_id)?;
        read_run_file(&dir, path).await
    }

    async fn resume_run(&self, run_id: &str) -> Result<bool> {
        self.reap_finished();

        let Some(mut entry) = self.active.get_mut(run_id) else {
            return Ok(false);
        };
        let alive = entry
            .handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false);
        if !alive {
            return Ok(false);
        }

        if let Some(listener) = self.listener.read().clone() {
            entry.recorder.set_vulnerability_listener(listener);
        }
        entry.status = RunStatus::Running;
        Ok(true)
    }

    async fn stop_run(&self, run_id: &str) -> Result<bool> {
        self.reap_finished();

        let recorder = {
            let Some(mut entry) = self.active.get_mut(run_id) else {
                return Ok(false);
            };
            if let Some(handle) = &entry.handle {
                handle.abort();
            }
            entry.status = RunStatus::Stopped;
            entry.ended_at = Some(Utc::now().to_rfc3339());
            Arc::clone(&entry.recorder)
        };

        // Aborted tasks never reach their own cleanup.
        recorder.cleanup().await;
        info!(run_id, "Stopped run");
        metrics::counter!("control_runs_stopped").increment(1);
        Ok(true)
    }
}
