//! Leak-slope analysis over per-component size samples.

use std::collections::VecDeque;

use serde::Serialize;
use vega_types::MemoryConfig;

use crate::governor::MemorySample;

/// Suspicion level for a growing component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspicionLevel {
    /// Growth above the noise floor but below the medium threshold.
    Low,
    /// Sustained growth worth watching.
    Medium,
    /// Strong growth, likely a leak.
    High,
    /// Runaway growth.
    Critical,
}

/// A tracked component whose footprint grows persistently.
#[derive(Debug, Clone, Serialize)]
pub struct LeakSuspect {
    /// Component name.
    pub component: String,
    /// Latest measured growth rate, bytes per second.
    pub growth_bytes_per_sec: f64,
    /// Latest suspicion classification.
    pub suspicion: SuspicionLevel,
    /// When the suspect was first recorded, epoch nanoseconds.
    pub first_seen_ns: i64,
    /// When the suspect was last updated, epoch nanoseconds.
    pub last_seen_ns: i64,
    /// Number of sampling rounds the suspect stayed above the floor.
    pub observations: u32,
}

/// Leak finding surfaced to listeners for one sampling round.
#[derive(Debug, Clone, Serialize)]
pub struct LeakReport {
    /// Component name.
    pub component: String,
    /// Measured growth rate, bytes per second.
    pub growth_bytes_per_sec: f64,
    /// Suspicion classification.
    pub suspicion: SuspicionLevel,
}

/// Computes the growth rate over a sample window as Δbytes/Δtime.
///
/// Returns `None` with fewer than two samples or a non-positive time span.
#[must_use]
pub fn growth_rate(samples: &VecDeque<MemorySample>) -> Option<f64> {
    let first = samples.front()?;
    let last = samples.back()?;
    let span_ns = last.timestamp_ns - first.timestamp_ns;
    if span_ns <= 0 {
        return None;
    }
    let delta = last.bytes as f64 - first.bytes as f64;
    Some(delta / (span_ns as f64 / 1e9))
}

/// Classifies a growth rate, or returns `None` below the noise floor.
#[must_use]
pub fn classify(rate_bytes_per_sec: f64, config: &MemoryConfig) -> Option<SuspicionLevel> {
    if rate_bytes_per_sec < config.leak_noise_floor_bytes_per_sec {
        return None;
    }
    let level = if rate_bytes_per_sec >= config.leak_critical_bytes_per_sec {
        SuspicionLevel::Critical
    } else if rate_bytes_per_sec >= config.leak_high_bytes_per_sec {
        SuspicionLevel::High
    } else if rate_bytes_per_sec >= config.leak_medium_bytes_per_sec {
        SuspicionLevel::Medium
    } else {
        SuspicionLevel::Low
    };
    Some(level)
}
