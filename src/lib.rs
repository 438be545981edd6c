// src/lib.rs
//! Talon Run Orchestration Engine Library
//!
//! Core components for orchestrating autonomous security-testing runs
//! and recording their telemetry.
//!
//! # Architecture
//!
//! The engine is structured into several key modules:
//!
//! - **llm**: Primary/fallback request routing over generation backends
//! - **runtime**: Tool server pooling and bounded concurrent task execution
//! - **agents**: Scan targets and the iteration budget policy
//! - **recording**: Per-run telemetry capture and report persistence
//! - **control**: The run control surface consumed by bot/CLI frontends
//! - **observability**: Tracing subscriber setup
//! - **utils**: Configuration and error types

pub mod agents;
pub mod control;
pub mod llm;
pub mod observability;
pub mod recording;
pub mod runtime;
pub mod utils;

// Re-export commonly used types
pub use control::{ControlApi, EngineControlApi, FileSystemControlApi, RunInfo, ScanDriver};
pub use llm::{ChatBackend, MultiplexingLlm};
pub use recording::{RunRecorder, VulnerabilityListener, VulnerabilityReport};
pub use runtime::{RunManager, ToolServerPool};
pub use utils::config::EngineConfig;
pub use utils::errors::{EngineError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
