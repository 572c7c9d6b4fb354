//! Time-series sample type.

use serde::{Deserialize, Serialize};

/// A single time-series observation.
///
/// Streams are append-only and time-ordered; the timestamp is Unix epoch
/// nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unix timestamp in nanoseconds.
    pub timestamp_ns: i64,
    /// Observed value.
    pub value: f64,
}

impl Sample {
    /// Creates a new sample.
    #[must_use]
    pub const fn new(timestamp_ns: i64, value: f64) -> Self {
        Self {
            timestamp_ns,
            value,
        }
    }
}
