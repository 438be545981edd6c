// src/recording/recorder.rs
//! Per-run telemetry recorder
//!
//! `RunRecorder` is the append-only record of a single run: its agents,
//! tool executions, chat messages, and vulnerability findings. Mutating
//! operations update in-memory state under one internal lock and trigger
//! best-effort flushes of the on-disk report bundle.
//!
//! Flush policy: per-finding Markdown detail files are written at most
//! once each; the consolidated CSV/JSONL/SARIF indices are rewritten in
//! full every flush, sorted by severity rank then timestamp. Flush I/O
//! errors are caught, logged, and swallowed: telemetry persistence must
//! never abort the owning run, and the next flush retries anything not
//! yet persisted.
//!
//! Recorders for different runs share nothing; hosts pass each component
//! an explicit `Arc<RunRecorder>` instead of a process-wide singleton.

use crate::agents::{IterationPolicy, ScanConfig, Target};
use crate::recording::report::{
    render_csv_index, render_jsonl_index, sorted_for_index, VulnerabilityReport,
    REPORT_TIMESTAMP_FORMAT,
};
use crate::recording::sarif::build_sarif;
use crate::recording::storage::RunStorage;
use crate::utils::errors::{EngineError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use ulid::Ulid;

/// Bookkeeping pseudo-tools excluded from the real tool count
const PSEUDO_TOOLS: [&str; 2] = ["scan_start_info", "subagent_start_info"];

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Stopped,
    Unknown,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
            RunStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Status of an agent in the delegation tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

/// Status of one tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolExecutionStatus {
    Running,
    Completed,
    Failed,
}

/// One node in a run's delegation tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: String,
    pub name: String,
    pub task: String,
    pub status: AgentStatus,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub error_message: Option<String>,
    /// Execution ids owned by this agent, in start order
    pub tool_executions: Vec<u64>,
}

/// One tool invocation by an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionRecord {
    pub execution_id: u64,
    pub agent_id: String,
    pub tool_name: String,
    pub args: Value,
    pub status: ToolExecutionStatus,
    pub result: Option<Value>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// One chat message in the run's ordered log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRecord {
    pub message_id: u64,
    pub content: String,
    pub role: String,
    pub agent_id: Option<String>,
    pub timestamp: String,
    pub metadata: Value,
}

/// Run-level metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub run_name: Option<String>,
    pub start_time: String,
    pub end_time: Option<String>,
    pub targets: Vec<Target>,
    pub status: RunStatus,
    pub max_iterations: Option<u32>,
    pub user_instructions: String,
    pub iteration_policy: Option<IterationPolicy>,
}

/// Optional metadata attached to a new finding
#[derive(Debug, Clone, Default)]
pub struct VulnerabilityDetails {
    pub cvss_score: Option<f64>,
    pub references: Vec<String>,
    pub fix_recommendation: Option<String>,
    pub cwe: Vec<String>,
}

/// Capability interface for finding notifications.
///
/// The recorder swallows and logs listener errors; a broken listener
/// never blocks recording or persistence.
pub trait VulnerabilityListener: Send + Sync {
    fn on_vulnerability_found(
        &self,
        report_id: &str,
        title: &str,
        content: &str,
        severity: &str,
    ) -> Result<()>;
}

struct RecorderState {
    metadata: RunMetadata,
    agents: HashMap<String, AgentRecord>,
    tool_executions: BTreeMap<u64, ToolExecutionRecord>,
    chat_messages: Vec<ChatMessageRecord>,
    vulnerability_reports: Vec<VulnerabilityReport>,
    final_scan_result: Option<String>,
    scan_success: Option<bool>,
    next_execution_id: u64,
    next_message_id: u64,
    saved_vuln_ids: HashSet<String>,
}

/// Append-only telemetry store for a single run
pub struct RunRecorder {
    storage: RunStorage,
    state: Mutex<RecorderState>,
    listener: RwLock<Option<Arc<dyn VulnerabilityListener>>>,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn now_report_timestamp() -> String {
    Utc::now().format(REPORT_TIMESTAMP_FORMAT).to_string()
}

impl RunRecorder {
    /// Create a recorder for one run.
    ///
    /// Without a name the run id is a generated `run-<ulid>`. The run
    /// directory under `runs_root` is created lazily on first flush.
    pub fn new(run_name: Option<String>, runs_root: impl Into<PathBuf>) -> Self {
        let run_id = run_name
            .clone()
            .unwrap_or_else(|| format!("run-{}", Ulid::new().to_string().to_lowercase()));

        let metadata = RunMetadata {
            run_id,
            run_name,
            start_time: now_iso(),
            end_time: None,
            targets: Vec::new(),
            status: RunStatus::Running,
            max_iterations: None,
            user_instructions: String::new(),
            iteration_policy: None,
        };

        Self {
            storage: RunStorage::new(runs_root),
            state: Mutex::new(RecorderState {
                metadata,
                agents: HashMap::new(),
                tool_executions: BTreeMap::new(),
                chat_messages: Vec::new(),
                vulnerability_reports: Vec::new(),
                final_scan_result: None,
                scan_success: None,
                next_execution_id: 1,
                next_message_id: 1,
                saved_vuln_ids: HashSet::new(),
            }),
            listener: RwLock::new(None),
        }
    }

    /// The run identifier
    pub async fn run_id(&self) -> String {
        self.state.lock().await.metadata.run_id.clone()
    }

    /// Rename the run. Only meaningful before the run directory has been
    /// created; an existing directory keeps its original name.
    pub async fn set_run_name(&self, run_name: impl Into<String>) {
        let run_name = run_name.into();
        let mut state = self.state.lock().await;
        state.metadata.run_id = run_name.clone();
        state.metadata.run_name = Some(run_name);
    }

    /// Register the listener notified on each new finding
    pub fn set_vulnerability_listener(&self, listener: Arc<dyn VulnerabilityListener>) {
        *self.listener.write() = Some(listener);
    }

    /// Record scan configuration on the run's metadata and eagerly create
    /// the run directory so partial artifacts have a home.
    pub async fn set_scan_config(&self, config: ScanConfig) -> Result<()> {
        let run_id = {
            let mut state = self.state.lock().await;
            state.metadata.targets = config.targets;
            state.metadata.user_instructions = config.user_instructions;
            state.metadata.max_iterations = Some(config.max_iterations.unwrap_or(300));
            state.metadata.run_id.clone()
        };
        self.storage.run_dir(&run_id).await?;
        Ok(())
    }

    /// Record the externally computed iteration budget
    pub async fn set_iteration_policy(&self, policy: IterationPolicy) {
        let mut state = self.state.lock().await;
        state.metadata.max_iterations = Some(policy.max_iterations);
        state.metadata.iteration_policy = Some(policy);
    }

    /// Register a new agent with status running.
    ///
    /// `parent_id` is not validated here; the upstream graph validator
    /// guarantees it, and lookups by parent stay defensive regardless.
    pub async fn log_agent_creation(
        &self,
        agent_id: &str,
        name: &str,
        task: &str,
        parent_id: Option<&str>,
    ) {
        let now = now_iso();
        let record = AgentRecord {
            id: agent_id.to_string(),
            name: name.to_string(),
            task: task.to_string(),
            status: AgentStatus::Running,
            parent_id: parent_id.map(str::to_string),
            created_at: now.clone(),
            updated_at: now,
            error_message: None,
            tool_executions: Vec::new(),
        };

        let mut state = self.state.lock().await;
        state.agents.insert(agent_id.to_string(), record);
    }

    /// Append a chat message; returns its per-run monotonic id (from 1)
    pub async fn log_chat_message(
        &self,
        content: &str,
        role: &str,
        agent_id: Option<&str>,
        metadata: Option<Value>,
    ) -> u64 {
        let mut state = self.state.lock().await;
        let message_id = state.next_message_id;
        state.next_message_id += 1;

        state.chat_messages.push(ChatMessageRecord {
            message_id,
            content: content.to_string(),
            role: role.to_string(),
            agent_id: agent_id.map(str::to_string),
            timestamp: now_iso(),
            metadata: metadata.unwrap_or_else(|| Value::Object(Default::default())),
        });

        message_id
    }

    /// Record the start of a tool execution; returns its monotonic id
    /// (from 1) and appends it to the owning agent's list when the agent
    /// is known.
    pub async fn log_tool_execution_start(
        &self,
        agent_id: &str,
        tool_name: &str,
        args: Value,
    ) -> u64 {
        let mut state = self.state.lock().await;
        let execution_id = state.next_execution_id;
        state.next_execution_id += 1;

        let now = now_iso();
        state.tool_executions.insert(
            execution_id,
            ToolExecutionRecord {
                execution_id,
                agent_id: agent_id.to_string(),
                tool_name: tool_name.to_string(),
                args,
                status: ToolExecutionStatus::Running,
                result: None,
                started_at: now,
                completed_at: None,
            },
        );

        if let Some(agent) = state.agents.get_mut(agent_id) {
            agent.tool_executions.push(execution_id);
        }

        execution_id
    }

    /// Update a tool execution's status and result. Unknown execution ids
    /// are a no-op, not an error.
    pub async fn update_tool_execution(
        &self,
        execution_id: u64,
        status: ToolExecutionStatus,
        result: Option<Value>,
    ) {
        let mut state = self.state.lock().await;
        if let Some(execution) = state.tool_executions.get_mut(&execution_id) {
            execution.status = status;
            execution.result = result;
            execution.completed_at = Some(now_iso());
        }
    }

    /// Update an agent's status. Unknown agents are a no-op.
    pub async fn update_agent_status(
        &self,
        agent_id: &str,
        status: AgentStatus,
        error_message: Option<&str>,
    ) {
        let mut state = self.state.lock().await;
        if let Some(agent) = state.agents.get_mut(agent_id) {
            agent.status = status;
            agent.updated_at = now_iso();
            if let Some(message) = error_message {
                agent.error_message = Some(message.to_string());
            }
        }
    }

    /// Record a new finding.
    ///
    /// Assigns the next sequential id, normalizes severity to lowercase,
    /// trims title and content, notifies the registered listener (errors
    /// swallowed and logged), then triggers an incremental flush.
    pub async fn add_vulnerability_report(
        &self,
        title: &str,
        content: &str,
        severity: &str,
        details: VulnerabilityDetails,
    ) -> String {
        let report = {
            let mut state = self.state.lock().await;
            let report = VulnerabilityReport {
                id: format!("vuln-{:04}", state.vulnerability_reports.len() + 1),
                title: title.trim().to_string(),
                content: content.trim().to_string(),
                severity: severity.trim().to_lowercase(),
                timestamp: now_report_timestamp(),
                cvss_score: details.cvss_score,
                references: details.references,
                fix_recommendation: details.fix_recommendation,
                cwe: details.cwe,
            };
            state.vulnerability_reports.push(report.clone());
            report
        };

        info!(id = %report.id, title = %report.title, severity = %report.severity,
              "Added vulnerability report");
        metrics::counter!("recorder_vulnerabilities").increment(1);

        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            if let Err(e) = listener.on_vulnerability_found(
                &report.id,
                &report.title,
                &report.content,
                &report.severity,
            ) {
                warn!(id = %report.id, error = %e, "Vulnerability listener failed");
            }
        }

        self.save_run_data(false).await;
        report.id
    }

    /// Record the terminal summary and flush with completion
    pub async fn set_final_scan_result(&self, content: &str, success: bool) {
        {
            let mut state = self.state.lock().await;
            state.final_scan_result = Some(content.trim().to_string());
            state.scan_success = Some(success);
        }
        info!(success, "Set final scan result");
        self.save_run_data(true).await;
    }

    /// Final flush with completion; safe to call more than once
    pub async fn cleanup(&self) {
        self.save_run_data(true).await;
    }

    /// Persist the report bundle.
    ///
    /// Idempotent and crash-tolerant: new detail files are written once,
    /// indices are fully rewritten, and any I/O error is logged and
    /// swallowed without rolling back in-memory state.
    pub async fn save_run_data(&self, mark_complete: bool) {
        if let Err(e) = self.try_save(mark_complete).await {
            metrics::counter!("recorder_flush_failures").increment(1);
            error!(error = %e, "Failed to save run data");
        }
    }

    async fn try_save(&self, mark_complete: bool) -> Result<()> {
        let mut state = self.state.lock().await;

        if mark_complete {
            state.metadata.end_time = Some(now_iso());
        }

        let run_id = state.metadata.run_id.clone();
        let run_name = state.metadata.run_name.clone();
        let run_dir = self.storage.run_dir(&run_id).await?.to_path_buf();

        if let Some(final_result) = state.final_scan_result.clone() {
            let report_file = run_dir.join("penetration_test_report.md");
            let body = format!(
                "# Security Penetration Test Report\n\n**Generated:** {}\n\n{}\n",
                now_report_timestamp(),
                final_result
            );
            fs::write(&report_file, body).await.map_err(|e| {
                EngineError::Persistence(format!("failed to write final report: {}", e))
            })?;
            info!(file = %report_file.display(), "Saved final penetration test report");
        }

        if !state.vulnerability_reports.is_empty() {
            let vuln_dir = self.storage.vulnerabilities_dir(&run_id).await?;

            let new_reports: Vec<VulnerabilityReport> = state
                .vulnerability_reports
                .iter()
                .filter(|report| !state.saved_vuln_ids.contains(&report.id))
                .cloned()
                .collect();

            for report in &new_reports {
                let detail_file = vuln_dir.join(format!("{}.md", report.id));
                fs::write(&detail_file, report.render_markdown())
                    .await
                    .map_err(|e| {
                        EngineError::Persistence(format!(
                            "failed to write {}: {}",
                            detail_file.display(),
                            e
                        ))
                    })?;
                state.saved_vuln_ids.insert(report.id.clone());
            }

            let sorted = sorted_for_index(&state.vulnerability_reports);

            fs::write(run_dir.join("vulnerabilities.csv"), render_csv_index(&sorted))
                .await
                .map_err(|e| {
                    EngineError::Persistence(format!("failed to write CSV index: {}", e))
                })?;

            let jsonl = render_jsonl_index(&sorted, &run_id, run_name.as_deref())?;
            fs::write(run_dir.join("vulnerabilities.jsonl"), jsonl)
                .await
                .map_err(|e| {
                    EngineError::Persistence(format!("failed to write JSONL index: {}", e))
                })?;

            let sarif = build_sarif(&sorted, &run_id, run_name.as_deref());
            fs::write(
                run_dir.join("vulnerabilities.sarif.json"),
                serde_json::to_string_pretty(&sarif)?,
            )
            .await
            .map_err(|e| {
                EngineError::Persistence(format!("failed to write SARIF index: {}", e))
            })?;

            if !new_reports.is_empty() {
                info!(
                    count = new_reports.len(),
                    dir = %vuln_dir.display(),
                    "Saved new vulnerability report(s)"
                );
            }
        }

        metrics::counter!("recorder_flushes").increment(1);
        Ok(())
    }

    /// Snapshot of the run metadata
    pub async fn metadata(&self) -> RunMetadata {
        self.state.lock().await.metadata.clone()
    }

    /// Snapshot of one agent record
    pub async fn agent(&self, agent_id: &str) -> Option<AgentRecord> {
        self.state.lock().await.agents.get(agent_id).cloned()
    }

    /// Snapshot of the ordered chat message log
    pub async fn chat_messages(&self) -> Vec<ChatMessageRecord> {
        self.state.lock().await.chat_messages.clone()
    }

    /// Snapshot of one tool execution record
    pub async fn tool_execution(&self, execution_id: u64) -> Option<ToolExecutionRecord> {
        self.state
            .lock()
            .await
            .tool_executions
            .get(&execution_id)
            .cloned()
    }

    /// All tool executions owned by an agent, in id order
    pub async fn agent_tools(&self, agent_id: &str) -> Vec<ToolExecutionRecord> {
        self.state
            .lock()
            .await
            .tool_executions
            .values()
            .filter(|execution| execution.agent_id == agent_id)
            .cloned()
            .collect()
    }

    /// Count of tool executions excluding bookkeeping pseudo-tools
    pub async fn real_tool_count(&self) -> usize {
        self.state
            .lock()
            .await
            .tool_executions
            .values()
            .filter(|execution| !PSEUDO_TOOLS.contains(&execution.tool_name.as_str()))
            .count()
    }

    /// Snapshot of all findings, in creation order
    pub async fn vulnerability_reports(&self) -> Vec<VulnerabilityReport> {
        self.state.lock().await.vulnerability_reports.clone()
    }

    /// Finding counts keyed by severity
    pub async fn severity_summary(&self) -> HashMap<String, usize> {
        let state = self.state.lock().await;
        let mut summary = HashMap::new();
        for report in &state.vulnerability_reports {
            *summary.entry(report.severity.clone()).or_insert(0) += 1;
        }
        summary
    }

    /// Wall-clock duration in seconds; 0.0 while the run is still open
    pub async fn duration_seconds(&self) -> f64 {
        let state = self.state.lock().await;
        let end = match &state.metadata.end_time {
            Some(end) => end,
            None => return 0.0,
        };
        match (
            DateTime::parse_from_rfc3339(&state.metadata.start_time),
            DateTime::parse_from_rfc3339(end),
        ) {
            (Ok(start), Ok(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct RecordingListener {
        seen: parking_lot::Mutex<Vec<(String, String, String, String)>>,
        fail: bool,
    }

    impl RecordingListener {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                seen: parking_lot::Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl VulnerabilityListener for RecordingListener {
        fn on_vulnerability_found(
            &self,
            report_id: &str,
            title: &str,
            content: &str,
            severity: &str,
        ) -> Result<()> {
            self.seen.lock().push((
                report_id.to_string(),
                title.to_string(),
                content.to_string(),
                severity.to_string(),
            ));
            if self.fail {
                return Err(EngineError::Backend("listener exploded".to_string()));
            }
            Ok(())
        }
    }

    fn recorder(dir: &tempfile::TempDir) -> RunRecorder {
        RunRecorder::new(Some("test-run".to_string()), dir.path())
    }

    #[tokio::test]
    async fn test_report_ids_sequential_and_padded() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        for expected in ["vuln-0001", "vuln-0002", "vuln-0003"] {
            let id = rec
                .add_vulnerability_report("XSS", "found", "high", Default::default())
                .await;
            assert_eq!(id, expected);
        }
    }

    #[tokio::test]
    async fn test_normalization_and_listener() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);
        let listener = RecordingListener::new(false);
        rec.set_vulnerability_listener(listener.clone());

        let id = rec
            .add_vulnerability_report("  SQL Injection  ", "  details  ", "  HIGH ", Default::default())
            .await;

        let seen = listener.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (id, "SQL Injection".to_string(), "details".to_string(), "high".to_string()));
    }

    #[tokio::test]
    async fn test_listener_error_swallowed() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);
        rec.set_vulnerability_listener(RecordingListener::new(true));

        // Must not propagate the listener failure.
        let id = rec
            .add_vulnerability_report("XSS", "found", "low", Default::default())
            .await;
        assert_eq!(id, "vuln-0001");
    }

    #[tokio::test]
    async fn test_detail_file_written_exactly_once() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        rec.add_vulnerability_report("XSS", "found", "high", Default::default())
            .await;

        let detail = dir
            .path()
            .join("test-run")
            .join("vulnerabilities")
            .join("vuln-0001.md");
        assert!(detail.is_file());

        // Deleting the detail file and flushing again must not recreate
        // it: detail files are written at most once per finding.
        std::fs::remove_file(&detail).unwrap();
        rec.save_run_data(false).await;
        rec.save_run_data(false).await;
        assert!(!detail.exists());
    }

    #[tokio::test]
    async fn test_index_rewritten_sorted_every_flush() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        rec.add_vulnerability_report("Low finding", "x", "low", Default::default())
            .await;
        rec.add_vulnerability_report("Critical finding", "x", "critical", Default::default())
            .await;
        rec.add_vulnerability_report("Medium finding", "x", "medium", Default::default())
            .await;

        let csv =
            std::fs::read_to_string(dir.path().join("test-run").join("vulnerabilities.csv"))
                .unwrap();
        let ids: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|line| line.split(',').next().unwrap())
            .collect();
        assert_eq!(ids, ["vuln-0002", "vuln-0003", "vuln-0001"]);

        let jsonl =
            std::fs::read_to_string(dir.path().join("test-run").join("vulnerabilities.jsonl"))
                .unwrap();
        assert_eq!(jsonl.lines().count(), 3);

        let sarif: Value = serde_json::from_str(
            &std::fs::read_to_string(
                dir.path().join("test-run").join("vulnerabilities.sarif.json"),
            )
            .unwrap(),
        )
        .unwrap();
        assert_eq!(sarif["runs"][0]["results"].as_array().unwrap().len(), 3);
        assert_eq!(sarif["runs"][0]["results"][0]["ruleId"], "TALON.CRITICAL");
    }

    #[tokio::test]
    async fn test_finalize_writes_report_and_end_time() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        rec.set_final_scan_result("  All clear.  ", true).await;

        let report = std::fs::read_to_string(
            dir.path().join("test-run").join("penetration_test_report.md"),
        )
        .unwrap();
        assert!(report.starts_with("# Security Penetration Test Report\n"));
        assert!(report.contains("All clear."));

        let metadata = rec.metadata().await;
        assert!(metadata.end_time.is_some());
        assert!(rec.duration_seconds().await >= 0.0);
    }

    #[tokio::test]
    async fn test_flush_failure_swallowed() {
        let dir = tempdir().unwrap();
        // Point the runs root at an existing *file* so directory creation
        // fails on every flush.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"not a dir").unwrap();
        let rec = RunRecorder::new(Some("test-run".to_string()), &blocked);

        let id = rec
            .add_vulnerability_report("XSS", "found", "high", Default::default())
            .await;
        assert_eq!(id, "vuln-0001");

        // In-memory state is intact and retried on the next flush.
        assert_eq!(rec.vulnerability_reports().await.len(), 1);
    }

    #[tokio::test]
    async fn test_message_and_execution_ids_monotonic() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        assert_eq!(rec.log_chat_message("hi", "user", None, None).await, 1);
        assert_eq!(rec.log_chat_message("yo", "assistant", None, None).await, 2);

        rec.log_agent_creation("agent-1", "Root", "scan", None).await;
        let e1 = rec
            .log_tool_execution_start("agent-1", "port_scan", json!({"host": "a"}))
            .await;
        let e2 = rec
            .log_tool_execution_start("agent-1", "port_scan", json!({"host": "b"}))
            .await;
        assert_eq!((e1, e2), (1, 2));

        let agent = rec.agent("agent-1").await.unwrap();
        assert_eq!(agent.tool_executions, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_no_ops() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        rec.update_tool_execution(42, ToolExecutionStatus::Completed, Some(json!("ok")))
            .await;
        rec.update_agent_status("ghost", AgentStatus::Failed, Some("boom"))
            .await;

        assert!(rec.tool_execution(42).await.is_none());
        assert!(rec.agent("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_agent_on_tool_start_is_defensive() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        // Agent not registered: the execution is still recorded, it just
        // isn't linked to an agent record.
        let id = rec
            .log_tool_execution_start("ghost", "port_scan", json!({}))
            .await;
        assert_eq!(id, 1);
        assert!(rec.tool_execution(1).await.is_some());
    }

    #[tokio::test]
    async fn test_tool_execution_update() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        rec.log_agent_creation("agent-1", "Root", "scan", None).await;
        let id = rec
            .log_tool_execution_start("agent-1", "port_scan", json!({}))
            .await;
        rec.update_tool_execution(id, ToolExecutionStatus::Completed, Some(json!({"open": [80]})))
            .await;

        let execution = rec.tool_execution(id).await.unwrap();
        assert_eq!(execution.status, ToolExecutionStatus::Completed);
        assert_eq!(execution.result, Some(json!({"open": [80]})));
        assert!(execution.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_real_tool_count_excludes_pseudo_tools() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        rec.log_agent_creation("agent-1", "Root", "scan", None).await;
        rec.log_tool_execution_start("agent-1", "scan_start_info", json!({}))
            .await;
        rec.log_tool_execution_start("agent-1", "subagent_start_info", json!({}))
            .await;
        rec.log_tool_execution_start("agent-1", "port_scan", json!({}))
            .await;

        assert_eq!(rec.real_tool_count().await, 1);
        assert_eq!(rec.agent_tools("agent-1").await.len(), 3);
    }

    #[tokio::test]
    async fn test_iteration_policy_recorded() {
        let dir = tempdir().unwrap();
        let rec = recorder(&dir);

        let policy = crate::agents::calculate_iteration_budget(&[], None, 300);
        rec.set_iteration_policy(policy.clone()).await;

        let metadata = rec.metadata().await;
        assert_eq!(metadata.max_iterations, Some(policy.max_iterations));
        assert_eq!(metadata.iteration_policy, Some(policy));
    }

    #[tokio::test]
    async fn test_concurrent_report_ids_never_repeat() {
        let dir = tempdir().unwrap();
        let rec = Arc::new(recorder(&dir));
        let count = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let rec = Arc::clone(&rec);
            let count = Arc::clone(&count);
            handles.push(tokio::spawn(async move {
                let id = rec
                    .add_vulnerability_report("XSS", "found", "info", Default::default())
                    .await;
                count.fetch_add(1, Ordering::SeqCst);
                id
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
    }
}
