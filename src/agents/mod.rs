// src/agents/mod.rs
//! Agent-facing run types
//!
//! Targets and scan configuration consumed by the recorder and the
//! iteration budget policy. The agent delegation graph itself is
//! validated upstream; this module only carries the data shapes.

pub mod iteration_policy;

use serde::{Deserialize, Serialize};

pub use iteration_policy::{
    calculate_iteration_budget, IterationPolicy, PolicyInputs, DEFAULT_BASE, MAX_CAP, MIN_CAP,
};

/// Kind of asset a run is pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Repository,
    WebApplication,
    LocalCode,
    IpAddress,
    /// Anything the classifier did not recognize
    #[serde(other)]
    Unknown,
}

/// One scan target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Classified target kind
    #[serde(rename = "type")]
    pub target_type: TargetType,

    /// The target exactly as the user supplied it
    #[serde(default)]
    pub original: String,
}

impl Target {
    pub fn new(target_type: TargetType, original: impl Into<String>) -> Self {
        Self {
            target_type,
            original: original.into(),
        }
    }
}

/// Classify a raw user-supplied target string.
///
/// Order matters: an `https://...` git remote counts as a repository only
/// with an explicit `.git` suffix, otherwise it is treated as a web
/// application.
pub fn classify_target(raw: &str) -> Target {
    let trimmed = raw.trim();
    let target_type = if trimmed.starts_with("git@") || trimmed.ends_with(".git") {
        TargetType::Repository
    } else if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        TargetType::WebApplication
    } else if trimmed.parse::<std::net::IpAddr>().is_ok() {
        TargetType::IpAddress
    } else if std::path::Path::new(trimmed).exists() {
        TargetType::LocalCode
    } else {
        TargetType::Unknown
    };
    Target::new(target_type, trimmed)
}

/// Scan configuration recorded on a run's metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Targets for this run
    #[serde(default)]
    pub targets: Vec<Target>,

    /// Free-form operator instructions
    #[serde(default)]
    pub user_instructions: String,

    /// Iteration ceiling, when preset rather than computed
    #[serde(default)]
    pub max_iterations: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_type_deserializes_snake_case() {
        let target: Target =
            serde_json::from_str(r#"{"type": "web_application", "original": "https://x"}"#)
                .unwrap();
        assert_eq!(target.target_type, TargetType::WebApplication);
        assert_eq!(target.original, "https://x");
    }

    #[test]
    fn test_unrecognized_target_type_is_unknown() {
        let target: Target = serde_json::from_str(r#"{"type": "mainframe"}"#).unwrap();
        assert_eq!(target.target_type, TargetType::Unknown);
    }

    #[test]
    fn test_classify_target() {
        assert_eq!(
            classify_target("https://example.com/login").target_type,
            TargetType::WebApplication
        );
        assert_eq!(
            classify_target("git@github.com:acme/app.git").target_type,
            TargetType::Repository
        );
        assert_eq!(
            classify_target("https://github.com/acme/app.git").target_type,
            TargetType::Repository
        );
        assert_eq!(
            classify_target("10.0.0.7").target_type,
            TargetType::IpAddress
        );
        assert_eq!(
            classify_target("not-a-real-thing").target_type,
            TargetType::Unknown
        );
    }
}
