// src/utils/config.rs
//! Engine configuration
//!
//! Layered configuration: serde defaults, then an optional `talon` config
//! file in the working directory, then `TALON_`-prefixed environment
//! variables. Missing required settings are a fatal `Config` error at
//! startup.

use crate::utils::errors::{EngineError, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run orchestration settings
    pub runtime: RuntimeConfig,

    /// Report bundle storage settings
    pub storage: StorageConfig,

    /// LLM routing settings
    pub llm: LlmConfig,
}

/// Run orchestration settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Maximum concurrently executing runs / probe tasks
    pub max_concurrent: usize,

    /// Maximum tool server instances per pool
    pub max_tool_instances: usize,
}

/// Report bundle storage settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per run
    pub runs_dir: PathBuf,
}

/// LLM routing settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Request timeout in seconds, feeds the iteration budget
    pub timeout_secs: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 2,
            max_tool_instances: 2,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            runs_dir: PathBuf::from("talon_runs"),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self { timeout_secs: None }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            storage: StorageConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file and environment.
    ///
    /// Sources, lowest precedence first: serde defaults, an optional
    /// `talon.{toml,yaml,json}` file in the working directory, then
    /// `TALON_`-prefixed environment variables (`TALON_RUNTIME__MAX_CONCURRENT`).
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("talon").required(false))
            .add_source(
                config::Environment::with_prefix("TALON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let config: EngineConfig = settings
            .try_deserialize()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.runtime.max_concurrent == 0 {
            return Err(EngineError::Config(
                "runtime.max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.runtime.max_tool_instances == 0 {
            return Err(EngineError::Config(
                "runtime.max_tool_instances must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.runtime.max_concurrent, 2);
        assert_eq!(config.runtime.max_tool_instances, 2);
        assert_eq!(config.storage.runs_dir, PathBuf::from("talon_runs"));
        assert!(config.llm.timeout_secs.is_none());
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let mut config = EngineConfig::default();
        config.runtime.max_concurrent = 0;
        assert!(matches!(
            config.validate(),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_validation_accepts_defaults() {
        assert!(EngineConfig::default().validate().is_ok());
    }
}
