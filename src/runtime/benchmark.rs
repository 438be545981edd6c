// src/runtime/benchmark.rs
//! Micro-benchmark helper for tool actions
//!
//! Wraps a closure and reports wall-clock duration alongside its result.
//! Used by operators to sanity-check tool latency, not a profiler.

use serde::Serialize;
use std::time::Instant;

/// Result of one benchmarked call
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkResult<T> {
    /// Caller-supplied benchmark name
    pub name: String,

    /// Wall-clock duration in milliseconds, rounded to 2 decimals
    pub duration_ms: f64,

    /// The wrapped call's result
    pub result: T,
}

/// Time a single synchronous call
pub fn run_benchmark<T>(name: impl Into<String>, f: impl FnOnce() -> T) -> BenchmarkResult<T> {
    let start = Instant::now();
    let result = f();
    let duration_ms = (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    BenchmarkResult {
        name: name.into(),
        duration_ms,
        result,
    }
}
