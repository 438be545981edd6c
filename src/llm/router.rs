// src/llm/router.rs
//! Primary/fallback request multiplexing
//!
//! `MultiplexingLlm` routes a generation request to a primary backend and,
//! when the primary fails and the retry predicate allows it, replays the
//! request against a fallback backend. It is a pure failover: no caching,
//! no merging of primary/fallback output.
//!
//! ```text
//! generate(req) ──► primary ──ok──► response
//!                      │
//!                    error ──should_retry?──► fallback ──► response / error
//!                      │
//!                     no ──► primary error (unchanged)
//! ```

use crate::utils::errors::{EngineError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One chat message in a generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role (system, user, assistant, tool)
    pub role: String,

    /// Message content
    pub content: String,
}

/// A generation request routed through the multiplexer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Conversation so far
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// Completion token limit
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    /// Build a single-message user request
    pub fn from_user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: content.into(),
            }],
            temperature: None,
            max_tokens: None,
        }
    }
}

/// A generation response from a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated text
    pub content: String,

    /// Model that produced the response, if the backend reports it
    pub model: Option<String>,

    /// Prompt tokens consumed
    pub input_tokens: u64,

    /// Completion tokens produced
    pub output_tokens: u64,
}

/// A request-handling endpoint behind the router
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Run one generation request to completion
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse>;
}

/// Predicate deciding whether a primary failure is worth retrying on the
/// fallback backend
pub type RetryPredicate = Arc<dyn Fn(&EngineError) -> bool + Send + Sync>;

/// Request counters for the router
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouterStats {
    /// Total generation requests
    pub requests: u64,

    /// Requests where the primary backend failed
    pub failed_requests: u64,

    /// Requests served by the fallback backend
    pub fallback_requests: u64,
}

/// Primary/fallback generation router
pub struct MultiplexingLlm {
    primary: Arc<dyn ChatBackend>,
    fallback: Option<Arc<dyn ChatBackend>>,
    should_retry: RetryPredicate,
    stats: Mutex<RouterStats>,
}

impl MultiplexingLlm {
    /// Create a router with an optional fallback backend.
    ///
    /// The default retry predicate allows fallback on any primary error.
    pub fn new(primary: Arc<dyn ChatBackend>, fallback: Option<Arc<dyn ChatBackend>>) -> Self {
        Self {
            primary,
            fallback,
            should_retry: Arc::new(|_| true),
            stats: Mutex::new(RouterStats::default()),
        }
    }

    /// Replace the retry predicate
    pub fn with_retry_predicate(mut self, should_retry: RetryPredicate) -> Self {
        self.should_retry = should_retry;
        self
    }

    /// Route one generation request.
    ///
    /// Calls the primary backend; on error, if a fallback exists and the
    /// retry predicate accepts the error, the fallback's outcome (success
    /// or failure) is returned. Otherwise the primary's error propagates
    /// unchanged.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        {
            let mut stats = self.stats.lock().await;
            stats.requests += 1;
        }

        match self.primary.generate(request).await {
            Ok(response) => Ok(response),
            Err(primary_err) => {
                {
                    let mut stats = self.stats.lock().await;
                    stats.failed_requests += 1;
                }
                metrics::counter!("llm_primary_failures").increment(1);

                match &self.fallback {
                    Some(fallback) if (self.should_retry)(&primary_err) => {
                        warn!(
                            primary = self.primary.name(),
                            fallback = fallback.name(),
                            error = %primary_err,
                            "Primary backend failed, retrying on fallback"
                        );
                        let mut stats = self.stats.lock().await;
                        stats.fallback_requests += 1;
                        drop(stats);

                        fallback.generate(request).await
                    }
                    _ => {
                        debug!(
                            primary = self.primary.name(),
                            "Primary backend failed, no fallback applies"
                        );
                        Err(primary_err)
                    }
                }
            }
        }
    }

    /// Current request counters
    pub async fn stats(&self) -> RouterStats {
        self.stats.lock().await.clone()
    }
}
