// src/recording/storage.rs
//! Run directory management
//!
//! Each run owns one directory under the runs root, named by the run id
//! and created lazily on first use. The first name used wins; later
//! renames do not move an already-created directory. Runs are never
//! deleted here, retention is an external concern.

use crate::utils::errors::{EngineError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::OnceCell;
use tracing::info;

/// Lazily created per-run storage location
pub struct RunStorage {
    runs_root: PathBuf,
    run_dir: OnceCell<PathBuf>,
}

impl RunStorage {
    /// Create storage rooted at `runs_root`; nothing is touched on disk yet
    pub fn new(runs_root: impl Into<PathBuf>) -> Self {
        Self {
            runs_root: runs_root.into(),
            run_dir: OnceCell::new(),
        }
    }

    /// The runs root directory
    pub fn runs_root(&self) -> &Path {
        &self.runs_root
    }

    /// Get (and on first call create) the run directory for `run_id`
    pub async fn run_dir(&self, run_id: &str) -> Result<&Path> {
        let dir = self
            .run_dir
            .get_or_try_init(|| async {
                let dir = self.runs_root.join(run_id);
                fs::create_dir_all(&dir).await.map_err(|e| {
                    EngineError::Persistence(format!(
                        "failed to create run directory {}: {}",
                        dir.display(),
                        e
                    ))
                })?;
                info!(run_dir = %dir.display(), "Created run directory");
                Ok::<PathBuf, EngineError>(dir)
            })
            .await?;
        Ok(dir)
    }

    /// Get (and create) the vulnerabilities subdirectory
    pub async fn vulnerabilities_dir(&self, run_id: &str) -> Result<PathBuf> {
        let dir = self.run_dir(run_id).await?.join("vulnerabilities");
        fs::create_dir_all(&dir).await.map_err(|e| {
            EngineError::Persistence(format!(
                "failed to create vulnerabilities directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(dir)
    }
}
