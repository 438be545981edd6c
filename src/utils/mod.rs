// src/utils/mod.rs
//! Common utilities
//!
//! - **Errors**: engine-wide error enum and `Result` alias
//! - **Config**: layered configuration loading (defaults, file, env)

pub mod config;
pub mod errors;

pub use config::{EngineConfig, LlmConfig, RuntimeConfig, StorageConfig};
pub use errors::{EngineError, Result};
