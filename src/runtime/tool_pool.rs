// src/runtime/tool_pool.rs
//! Bounded lazy pool of tool server instances
//!
//! Agents share a small set of interchangeable tool-execution backends.
//! The pool spawns instances lazily up to a fixed capacity, hands out the
//! first healthy one, and demotes instances reported unhealthy. Demotion
//! is one-way: the pool never promotes an instance back to healthy.
//!
//! When every instance is unhealthy and capacity is exhausted, `acquire`
//! still returns the first-ever instance instead of failing. Availability
//! wins over strict health here: callers on this path get best-effort
//! service and handle their own errors on use.
//!
//! All registry mutations happen inside a single lock section per call;
//! the factory runs synchronously under the lock (bookkeeping only, the
//! instance's real I/O happens after release).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Health of a pooled instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceHealth {
    Healthy,
    Unhealthy,
}

/// A borrowed handle to a pooled instance.
///
/// Handles are cheap clones; the pool keeps ownership of the registry and
/// instances are never removed from it.
#[derive(Debug)]
pub struct PooledInstance<T> {
    /// Stable identity assigned at spawn, in creation order starting at 1
    pub id: usize,
    instance: Arc<T>,
}

impl<T> PooledInstance<T> {
    /// The underlying instance
    pub fn instance(&self) -> &Arc<T> {
        &self.instance
    }
}

impl<T> Clone for PooledInstance<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            instance: Arc::clone(&self.instance),
        }
    }
}

struct PoolState<T> {
    instances: Vec<PooledInstance<T>>,
    health: HashMap<usize, InstanceHealth>,
    next_id: usize,
}

/// Pool statistics
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_instances: usize,
    pub healthy_instances: usize,
    pub max_instances: usize,
}

/// Capacity-bounded lazy pool of tool server instances
pub struct ToolServerPool<T> {
    factory: Box<dyn Fn() -> T + Send + Sync>,
    max_instances: usize,
    state: Mutex<PoolState<T>>,
}

impl<T: Send + Sync> ToolServerPool<T> {
    /// Create an empty pool with a fixed capacity.
    ///
    /// No instance is spawned until the first `acquire`.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static, max_instances: usize) -> Self {
        Self {
            factory: Box::new(factory),
            max_instances,
            state: Mutex::new(PoolState {
                instances: Vec::new(),
                health: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Acquire an instance.
    ///
    /// Returns the first healthy instance in creation order, spawning a
    /// new one if none is healthy and capacity remains. At capacity with
    /// no healthy instance, the first-ever instance is returned as a
    /// degraded-service fallback; it may be unhealthy.
    pub async fn acquire(&self) -> PooledInstance<T> {
        let mut state = self.state.lock().await;

        if let Some(existing) = state.instances.iter().find(|inst| {
            state.health.get(&inst.id) == Some(&InstanceHealth::Healthy)
        }) {
            debug!(instance = existing.id, "Reusing healthy tool server instance");
            return existing.clone();
        }

        if state.instances.len() < self.max_instances {
            let id = state.next_id;
            state.next_id += 1;

            let pooled = PooledInstance {
                id,
                instance: Arc::new((self.factory)()),
            };
            state.instances.push(pooled.clone());
            state.health.insert(id, InstanceHealth::Healthy);

            debug!(instance = id, "Spawned tool server instance");
            metrics::counter!("tool_pool_spawns").increment(1);
            return pooled;
        }

        // Capacity exhausted and nothing healthy. Hand out the oldest
        // instance anyway rather than blocking or failing.
        warn!("All tool server instances unhealthy at capacity, returning first instance");
        metrics::counter!("tool_pool_degraded_acquires").increment(1);
        state.instances[0].clone()
    }

    /// Demote an instance to unhealthy. Idempotent; unknown ids are ignored.
    pub async fn mark_unhealthy(&self, id: usize) {
        let mut state = self.state.lock().await;
        if let Some(health) = state.health.get_mut(&id) {
            if *health != InstanceHealth::Unhealthy {
                warn!(instance = id, "Marking tool server instance unhealthy");
                metrics::counter!("tool_pool_demotions").increment(1);
            }
            *health = InstanceHealth::Unhealthy;
        }
    }

    /// Snapshot of the health map, keyed by instance identity
    pub async fn snapshot_health(&self) -> HashMap<usize, InstanceHealth> {
        self.state.lock().await.health.clone()
    }

    /// Get pool statistics
    pub async fn stats(&self) -> PoolStats {
        let state = self.state.lock().await;
        let healthy = state
            .health
            .values()
            .filter(|h| **h == InstanceHealth::Healthy)
            .count();

        PoolStats {
            total_instances: state.instances.len(),
            healthy_instances: healthy,
            max_instances: self.max_instances,
        }
    }
}
