//! Engine and memory-governor configuration.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Strategy used when an indicator is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationStrategy {
    /// Age-based invalidation only (periodic sweep).
    Time,
    /// Invalidate when input data changes.
    Data,
    /// Propagate invalidation to transitive dependents.
    Dependency,
    /// Data-driven invalidation plus dependency propagation.
    Hybrid,
}

impl InvalidationStrategy {
    /// Returns true when invalidating a node must also invalidate its
    /// transitive dependents.
    #[must_use]
    pub fn propagates_to_dependents(self) -> bool {
        matches!(
            self,
            InvalidationStrategy::Dependency | InvalidationStrategy::Hybrid
        )
    }
}

/// Main engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Enables the memoization cache.
    #[serde(default = "default_true")]
    pub memoization_enabled: bool,
    /// Enables incremental (streaming) evaluation.
    #[serde(default = "default_true")]
    pub incremental_enabled: bool,
    /// Global capacity of the memoization cache, in entries.
    #[serde(default = "default_max_memoized")]
    pub max_memoized_results: usize,
    /// Invalidation strategy.
    #[serde(default = "default_strategy")]
    pub invalidation_strategy: InvalidationStrategy,
    /// Maximum number of new samples an incremental catch-up may re-scan
    /// before falling back to a full recompute.
    #[serde(default = "default_batch_size")]
    pub incremental_batch_size: usize,
    /// Upper bound on retained lookback samples per node.
    #[serde(default = "default_max_lookback")]
    pub max_lookback: usize,
    /// Retention horizon for never-reused cache entries, nanoseconds.
    #[serde(default = "default_retention_ns")]
    pub cache_retention_ns: i64,
    /// Memory governor configuration.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Memory governor thresholds and intervals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Soft usage threshold in bytes (Warning).
    #[serde(default = "default_soft_limit")]
    pub soft_limit_bytes: usize,
    /// Hard usage threshold in bytes (Critical, triggers reclamation).
    #[serde(default = "default_hard_limit")]
    pub hard_limit_bytes: usize,
    /// Emergency usage threshold in bytes (aggressive shedding).
    #[serde(default = "default_emergency_limit")]
    pub emergency_limit_bytes: usize,
    /// Sampling interval for the monitoring loop, milliseconds.
    #[serde(default = "default_sampling_interval")]
    pub sampling_interval_ms: u64,
    /// Enables leak detection.
    #[serde(default = "default_true")]
    pub leak_detection_enabled: bool,
    /// Number of recent size samples used for leak-slope analysis.
    #[serde(default = "default_leak_window")]
    pub leak_window: usize,
    /// Growth below this rate (bytes/second) never raises a leak alert.
    #[serde(default = "default_noise_floor")]
    pub leak_noise_floor_bytes_per_sec: f64,
    /// Growth at or above this rate classifies as medium suspicion.
    #[serde(default = "default_medium_rate")]
    pub leak_medium_bytes_per_sec: f64,
    /// Growth at or above this rate classifies as high suspicion.
    #[serde(default = "default_high_rate")]
    pub leak_high_bytes_per_sec: f64,
    /// Growth at or above this rate classifies as critical suspicion.
    #[serde(default = "default_critical_rate")]
    pub leak_critical_bytes_per_sec: f64,
    /// Reclamation attempts at Critical before escalating to Emergency.
    #[serde(default = "default_reclaim_attempts")]
    pub max_reclaim_attempts: usize,
    /// Retained size samples per tracked component.
    #[serde(default = "default_sample_horizon")]
    pub sample_horizon: usize,
    /// Retained alert-history entries.
    #[serde(default = "default_alert_history")]
    pub alert_history: usize,
    /// Memoized results kept per node during emergency shedding.
    #[serde(default = "default_emergency_keep")]
    pub emergency_keep_recent: usize,
}

fn default_true() -> bool {
    true
}
fn default_max_memoized() -> usize {
    1024
}
fn default_strategy() -> InvalidationStrategy {
    InvalidationStrategy::Hybrid
}
fn default_batch_size() -> usize {
    32
}
fn default_max_lookback() -> usize {
    512
}
fn default_retention_ns() -> i64 {
    3_600_000_000_000 // 1 hour
}
fn default_soft_limit() -> usize {
    64 * 1024 * 1024
}
fn default_hard_limit() -> usize {
    128 * 1024 * 1024
}
fn default_emergency_limit() -> usize {
    192 * 1024 * 1024
}
fn default_sampling_interval() -> u64 {
    1_000
}
fn default_leak_window() -> usize {
    10
}
fn default_noise_floor() -> f64 {
    1_000.0
}
fn default_medium_rate() -> f64 {
    10_000.0
}
fn default_high_rate() -> f64 {
    100_000.0
}
fn default_critical_rate() -> f64 {
    1_000_000.0
}
fn default_reclaim_attempts() -> usize {
    3
}
fn default_sample_horizon() -> usize {
    64
}
fn default_alert_history() -> usize {
    128
}
fn default_emergency_keep() -> usize {
    3
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memoization_enabled: default_true(),
            incremental_enabled: default_true(),
            max_memoized_results: default_max_memoized(),
            invalidation_strategy: default_strategy(),
            incremental_batch_size: default_batch_size(),
            max_lookback: default_max_lookback(),
            cache_retention_ns: default_retention_ns(),
            memory: MemoryConfig::default(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            soft_limit_bytes: default_soft_limit(),
            hard_limit_bytes: default_hard_limit(),
            emergency_limit_bytes: default_emergency_limit(),
            sampling_interval_ms: default_sampling_interval(),
            leak_detection_enabled: default_true(),
            leak_window: default_leak_window(),
            leak_noise_floor_bytes_per_sec: default_noise_floor(),
            leak_medium_bytes_per_sec: default_medium_rate(),
            leak_high_bytes_per_sec: default_high_rate(),
            leak_critical_bytes_per_sec: default_critical_rate(),
            max_reclaim_attempts: default_reclaim_attempts(),
            sample_horizon: default_sample_horizon(),
            alert_history: default_alert_history(),
            emergency_keep_recent: default_emergency_keep(),
        }
    }
}

impl EngineConfig {
    /// Validates internal consistency.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] when capacities are zero or thresholds
    /// are not strictly ordered.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.max_memoized_results == 0 {
            return Err(CoreError::Config(
                "max_memoized_results must be > 0".to_string(),
            ));
        }
        if self.incremental_enabled && self.incremental_batch_size == 0 {
            return Err(CoreError::Config(
                "incremental_batch_size must be > 0".to_string(),
            ));
        }
        if self.max_lookback == 0 {
            return Err(CoreError::Config("max_lookback must be > 0".to_string()));
        }
        self.memory.validate()
    }
}

impl MemoryConfig {
    /// Validates threshold ordering.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] when soft/hard/emergency thresholds are
    /// not strictly increasing.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.soft_limit_bytes >= self.hard_limit_bytes
            || self.hard_limit_bytes >= self.emergency_limit_bytes
        {
            return Err(CoreError::Config(format!(
                "memory thresholds must be strictly increasing: soft={} hard={} emergency={}",
                self.soft_limit_bytes, self.hard_limit_bytes, self.emergency_limit_bytes
            )));
        }
        if self.leak_window < 2 {
            return Err(CoreError::Config("leak_window must be >= 2".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_strategy_propagation() {
        assert!(InvalidationStrategy::Dependency.propagates_to_dependents());
        assert!(InvalidationStrategy::Hybrid.propagates_to_dependents());
        assert!(!InvalidationStrategy::Time.propagates_to_dependents());
        assert!(!InvalidationStrategy::Data.propagates_to_dependents());
    }

    #[test]
    fn test_threshold_ordering_rejected() {
        let cfg = MemoryConfig {
            soft_limit_bytes: 100,
            hard_limit_bytes: 100,
            ..MemoryConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert!(cfg.memoization_enabled);
        assert_eq!(cfg.max_memoized_results, 1024);
        assert_eq!(cfg.invalidation_strategy, InvalidationStrategy::Hybrid);
        assert_eq!(cfg.memory.leak_window, 10);
    }

    #[test]
    fn test_strategy_snake_case() {
        let s: InvalidationStrategy = serde_json::from_str("\"hybrid\"").unwrap();
        assert_eq!(s, InvalidationStrategy::Hybrid);
    }
}
