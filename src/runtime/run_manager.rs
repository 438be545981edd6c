// src/runtime/run_manager.rs
//! Bounded concurrent execution of named task batches
//!
//! `RunManager` runs a batch of independent async tasks under a fixed
//! concurrency ceiling. Each task acquires a semaphore permit before it
//! starts and releases it when it finishes, whatever the outcome.
//!
//! Failures are isolated: a task that errors (or panics) produces a
//! `Failure` entry in the result map and never aborts or cancels its
//! siblings. The returned map is complete, one entry per submitted task.

use crate::utils::errors::Result;
use futures::future::{join_all, BoxFuture};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// A named unit of work: the name keys the result map
pub type NamedTask = (String, BoxFuture<'static, Result<Value>>);

/// Outcome of one task in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskOutcome {
    /// The task's own result value
    Success(Value),

    /// The task failed; serialized as `{"success": false, "error": "..."}`
    Failure {
        success: bool,
        error: String,
    },
}

impl TaskOutcome {
    fn failure(error: impl Into<String>) -> Self {
        TaskOutcome::Failure {
            success: false,
            error: error.into(),
        }
    }

    /// Whether the task completed without error
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    /// The failure message, if any
    pub fn error(&self) -> Option<&str> {
        match self {
            TaskOutcome::Success(_) => None,
            TaskOutcome::Failure { error, .. } => Some(error),
        }
    }
}

/// Bounded concurrent task runner
pub struct RunManager {
    semaphore: Arc<Semaphore>,
}

impl RunManager {
    /// Create a runner with a fixed number of concurrency permits
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Run every named task under the concurrency ceiling.
    ///
    /// All tasks are launched together and awaited together; the call
    /// returns once every task has finished. The result map is keyed by
    /// the caller-supplied names and has exactly one entry per task.
    /// An empty batch returns an empty map immediately.
    pub async fn run_with_budget(&self, tasks: Vec<NamedTask>) -> HashMap<String, TaskOutcome> {
        if tasks.is_empty() {
            return HashMap::new();
        }

        debug!(tasks = tasks.len(), "Launching task batch");

        let handles: Vec<_> = tasks
            .into_iter()
            .map(|(name, future)| {
                let semaphore = Arc::clone(&self.semaphore);
                let handle = tokio::spawn(async move {
                    // Closed-semaphore errors cannot occur: the semaphore
                    // lives as long as the spawned task.
                    let _permit = semaphore.acquire_owned().await;
                    future.await
                });
                (name, handle)
            })
            .collect();

        let names: Vec<String> = handles.iter().map(|(name, _)| name.clone()).collect();
        let outcomes = join_all(handles.into_iter().map(|(_, handle)| handle)).await;

        let mut results = HashMap::with_capacity(names.len());
        for (name, joined) in names.into_iter().zip(outcomes) {
            let outcome = match joined {
                Ok(Ok(value)) => {
                    metrics::counter!("run_manager_tasks_completed").increment(1);
                    TaskOutcome::Success(value)
                }
                Ok(Err(err)) => {
                    warn!(task = %name, error = %err, "Task failed");
                    metrics::counter!("run_manager_tasks_failed").increment(1);
                    TaskOutcome::failure(err.to_string())
                }
                Err(join_err) => {
                    warn!(task = %name, error = %join_err, "Task panicked");
                    metrics::counter!("run_manager_tasks_failed").increment(1);
                    TaskOutcome::failure(join_err.to_string())
                }
            };
            results.insert(name, outcome);
        }

        results
    }
}
