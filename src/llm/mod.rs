// src/llm/mod.rs
//! LLM request routing
//!
//! - **Router**: primary/fallback generation multiplexing with a
//!   caller-supplied retry predicate

pub mod router;

pub use router::{
    ChatBackend, ChatMessage, GenerationRequest, GenerationResponse, MultiplexingLlm,
    RetryPredicate, RouterStats,
};
