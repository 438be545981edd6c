// src/runtime/mod.rs
//! Run execution runtime
//!
//! This module bounds and pools the resources a run consumes:
//!
//! - **Run Manager**: named task batches under a concurrency ceiling with
//!   per-task fault isolation
//! - **Tool Pool**: capacity-bounded lazy pool of tool server instances
//!   with one-way health demotion
//! - **Benchmark**: wall-clock timing helper for tool actions
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──► RunManager (semaphore, N permits)
//!                     │
//!          ┌──────────┼──────────┐
//!        task A     task B     task C        (independent, isolated)
//!          │          │          │
//!          └───► ToolServerPool ◄┘           (≤ capacity instances)
//! ```

pub mod benchmark;
pub mod run_manager;
pub mod tool_pool;

pub use benchmark::{run_benchmark, BenchmarkResult};
pub use run_manager::{NamedTask, RunManager, TaskOutcome};
pub use tool_pool::{InstanceHealth, PoolStats, PooledInstance, ToolServerPool};
