// src/agents/iteration_policy.rs
//! Iteration budget computation
//!
//! Derives a run's iteration ceiling from its target mix and the LLM
//! request timeout. Heavier targets (repositories, web applications) and
//! slower backends buy more iterations; the result is clamped to
//! [`MIN_CAP`], [`MAX_CAP`]. Pure and deterministic: the recorder stores
//! the returned policy on the run's metadata.

use crate::agents::{Target, TargetType};
use serde::{Deserialize, Serialize};

/// Default base iteration budget
pub const DEFAULT_BASE: u32 = 300;

/// Lower clamp on the computed budget
pub const MIN_CAP: u32 = 180;

/// Upper clamp on the computed budget
pub const MAX_CAP: u32 = 600;

/// Inputs that produced an iteration budget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyInputs {
    pub target_count: usize,
    pub target_weight: u32,
    pub llm_timeout: Option<u64>,
    pub base: u32,
    pub latency_adjustment: u32,
}

/// A computed iteration budget with its audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationPolicy {
    /// The clamped iteration ceiling
    pub max_iterations: u32,

    /// Breakdown of the inputs used
    pub inputs: PolicyInputs,

    /// Human-readable explanation for reports
    pub rationale: String,
}

fn target_weight(target_type: &TargetType) -> u32 {
    match target_type {
        TargetType::Repository | TargetType::WebApplication => 2,
        TargetType::LocalCode | TargetType::IpAddress => 1,
        TargetType::Unknown => 0,
    }
}

fn latency_adjustment(llm_timeout: Option<u64>) -> u32 {
    match llm_timeout {
        Some(timeout) if timeout > 900 => 60,
        Some(timeout) if timeout > 600 => 40,
        Some(timeout) if timeout > 300 => 20,
        _ => 0,
    }
}

/// Compute the iteration budget for a target list.
///
/// `budget = clamp(base + 20 * weight + latency_adjustment, 180, 600)`
/// where repositories and web applications weigh 2, local code and IP
/// addresses weigh 1, and unrecognized target types weigh 0.
pub fn calculate_iteration_budget(
    targets: &[Target],
    llm_timeout: Option<u64>,
    base: u32,
) -> IterationPolicy {
    let weight: u32 = targets.iter().map(|t| target_weight(&t.target_type)).sum();
    let latency_adj = latency_adjustment(llm_timeout);

    let budget = (base + weight * 20 + latency_adj).clamp(MIN_CAP, MAX_CAP);

    IterationPolicy {
        max_iterations: budget,
        inputs: PolicyInputs {
            target_count: targets.len(),
            target_weight: weight,
            llm_timeout,
            base,
            latency_adjustment: latency_adj,
        },
        rationale: format!(
            "Scaled iterations based on target mix and LLM timeout; clamped to [{}, {}]",
            MIN_CAP, MAX_CAP
        ),
    }
}
