// src/recording/mod.rs
//! Run recording and report persistence
//!
//! ```text
//!   agents / tools / chat           findings
//!          |                           |
//!          v                           v
//!   +-------------------------------------+
//!   |            RunRecorder              |
//!   |  in-memory state, one lock per run  |
//!   +------------------+------------------+
//!                      | best-effort flush
//!                      v
//!   +-------------------------------------+
//!   |             RunStorage              |
//!   |  <runs_root>/<run_id>/              |
//!   |    penetration_test_report.md       |
//!   |    vulnerabilities.{csv,jsonl}      |
//!   |    vulnerabilities.sarif.json       |
//!   |    vulnerabilities/vuln-NNNN.md     |
//!   +-------------------------------------+
//! ```

pub mod recorder;
pub mod report;
pub mod sarif;
pub mod storage;

pub use recorder::{
    AgentRecord, AgentStatus, ChatMessageRecord, RunMetadata, RunRecorder, RunStatus,
    ToolExecutionRecord, ToolExecutionStatus, VulnerabilityDetails, VulnerabilityListener,
};
pub use report::{severity_rank, VulnerabilityReport, REPORT_TIMESTAMP_FORMAT};
pub use sarif::{build_sarif, SarifDocument};
pub use storage::RunStorage;
