// src/utils/errors.rs
//! Engine error types
//!
//! A single error enum covers the whole engine. Variants map to the
//! recovery policy expected by callers:
//!
//! - **Config**: fatal at startup, never recovered
//! - **Backend**: recovered by router fallback when policy allows
//! - **Persistence**: caught and logged inside flush, never surfaced
//! - **RunNotFound / NotSupported**: explicit negative results for the
//!   control surface, so callers can render a message without matching
//!   on transient I/O failures
//! - **PathViolation**: rejected before any I/O is attempted

use thiserror::Error;

/// Engine-wide error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid configuration (fatal at startup)
    #[error("configuration error: {0}")]
    Config(String),

    /// A generation backend failed
    #[error("backend error: {0}")]
    Backend(String),

    /// Report bundle persistence failed
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Unknown run identifier
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// Operation not supported by this control API implementation
    #[error("not supported: {0}")]
    NotSupported(String),

    /// File access escaping the run directory
    #[error("invalid path: {0}")]
    PathViolation(String),

    /// Requested file does not exist inside the run directory
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result alias used throughout the engine
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Whether this error is a negative result rather than a failure.
    ///
    /// Negative results (`RunNotFound`, `NotSupported`, `FileNotFound`)
    /// are expected conditions the control surface reports to users;
    /// everything else indicates something actually went wrong.
    pub fn is_negative_result(&self) -> bool {
        matches!(
            self,
            EngineError::RunNotFound(_)
                | EngineError::NotSupported(_)
                | EngineError::FileNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::RunNotFound("run-xyz".to_string());
        assert_eq!(err.to_string(), "run not found: run-xyz");
    }

    #[test]
    fn test_negative_results() {
        assert!(EngineError::RunNotFound("x".into()).is_negative_result());
        assert!(EngineError::NotSupported("stop".into()).is_negative_result());
        assert!(!EngineError::Persistence("disk full".into()).is_negative_result());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: EngineError = io.into();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
