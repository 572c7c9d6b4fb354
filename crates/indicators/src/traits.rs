//! Indicator traits and result payload.
//!
//! Defines the unit contract the engine schedules: batch computation over a
//! window, and streaming update from a retained buffer plus one new sample.

use std::mem;

use vega_types::Sample;

use crate::error::IndicatorError;

/// Parameters for indicator configuration.
///
/// Uses integer representations so parameter sets stay hashable and
/// comparable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorParams {
    /// Simple period-based parameter (SMA, EMA, ROC).
    Period(
        /// Window length for the indicator.
        usize,
    ),

    /// Fast/slow crossover parameters.
    Crossover {
        /// Fast moving-average period.
        fast: usize,
        /// Slow moving-average period.
        slow: usize,
    },

    /// Custom parameters as key-value pairs (for extensibility)
    Custom(Vec<(String, i64)>),
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams::Period(14)
    }
}

/// Trait for indicator units.
///
/// `compute` produces one output point per input sample; points before the
/// unit's lookback is satisfied are NaN. `update` continues a series from the
/// previous output point and a bounded buffer of retained samples whose last
/// element is the newest sample.
pub trait Indicator: Send + Sync {
    /// Computes the indicator for every sample in the window.
    ///
    /// Returns a `Vec<f64>` with the same length as `samples`. Values at
    /// indices < `min_lookback() - 1` are `f64::NAN`.
    ///
    /// # Errors
    /// Returns [`IndicatorError`] when the unit cannot produce output for the
    /// given input (not for short windows, which yield NaN padding).
    fn compute(&self, samples: &[Sample]) -> Result<Vec<f64>, IndicatorError>;

    /// Produces the next output point from retained state.
    ///
    /// `prev` is the previous output point (if any); `buffer` holds the most
    /// recent samples, at least `min_lookback()` of them when available, with
    /// the newest sample last. The default implementation recomputes over the
    /// buffer, which is correct for any window-local unit; recursive units
    /// (e.g. EMA) override it to continue from `prev` exactly.
    ///
    /// # Errors
    /// Returns [`IndicatorError::ComputationError`] when the buffer is empty.
    fn update(&self, prev: Option<f64>, buffer: &[Sample]) -> Result<f64, IndicatorError> {
        let _ = prev;
        let points = self.compute(buffer)?;
        points
            .last()
            .copied()
            .ok_or_else(|| IndicatorError::computation("update on empty buffer"))
    }

    /// Name of the indicator (e.g., "SMA", "EMA").
    fn name(&self) -> &str;

    /// Minimum number of samples required for a valid output point.
    fn min_lookback(&self) -> usize;
}

/// Immutable result payload of one evaluation.
///
/// Holds the output series aligned to the evaluated window (full mode) or to
/// the retained buffer (incremental mode). Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorValue {
    points: Vec<f64>,
}

impl IndicatorValue {
    /// Creates a result payload from output points.
    #[must_use]
    pub fn new(points: Vec<f64>) -> Self {
        Self { points }
    }

    /// Returns the output points.
    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    /// Returns the latest output point, if any.
    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.points.last().copied()
    }

    /// Returns the number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true when the payload holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Serialized-size approximation used for cache accounting.
    #[must_use]
    pub fn estimated_bytes(&self) -> usize {
        mem::size_of::<Self>() + self.points.len() * mem::size_of::<f64>()
    }
}
