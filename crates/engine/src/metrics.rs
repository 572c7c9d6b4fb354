//! Engine counters and status snapshots.

use std::collections::HashMap;

use serde::Serialize;
use vega_memory::PressureLevel;

/// Per-node evaluation counters.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NodeMetrics {
    /// Total evaluations of this node.
    pub evaluations: u64,
    /// Evaluations served from the memoization cache.
    pub cache_hits: u64,
    /// Evaluations satisfied by incremental catch-up.
    pub incremental_evals: u64,
    /// Full recomputes.
    pub full_evals: u64,
    /// Failed evaluations.
    pub failures: u64,
    /// Invalidations applied to this node.
    pub invalidations: u64,
    /// Cumulative evaluation time, microseconds.
    pub total_eval_time_us: u64,
}

impl NodeMetrics {
    /// Mean evaluation time in microseconds.
    #[must_use]
    pub fn avg_eval_time_us(&self) -> f64 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.total_eval_time_us as f64 / self.evaluations as f64
        }
    }

    /// Fraction of evaluations served from cache.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        if self.evaluations == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.evaluations as f64
        }
    }
}

/// Aggregated engine counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineMetrics {
    /// Per-node counters.
    pub nodes: HashMap<String, NodeMetrics>,
    /// Global cache hits.
    pub cache_hits: u64,
    /// Global cache misses.
    pub cache_misses: u64,
    /// Live cache entries.
    pub cache_entries: usize,
    /// Estimated resident bytes across cache and incremental state.
    pub estimated_bytes: usize,
}

/// Point-in-time engine status.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    /// Registered nodes.
    pub node_count: usize,
    /// Live cache entries.
    pub cache_entries: usize,
    /// Estimated resident bytes across cache and incremental state.
    pub estimated_bytes: usize,
    /// Current memory pressure level.
    pub pressure: PressureLevel,
    /// Tracked leak suspects.
    pub leak_suspects: usize,
    /// Whether the maintenance loop is running.
    pub maintenance_running: bool,
}
