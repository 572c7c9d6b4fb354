//! Evaluation window over an append-only sample stream.

use crate::error::CoreError;
use crate::sample::Sample;

/// A time-ordered slice of samples used as the input of one evaluation.
///
/// Construction validates strict timestamp ordering; everything downstream
/// (fingerprinting, gap detection, incremental catch-up) relies on it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataWindow {
    samples: Vec<Sample>,
}

impl DataWindow {
    /// Creates a window from time-ordered samples.
    ///
    /// # Errors
    /// Returns [`CoreError::Data`] if timestamps are not strictly increasing.
    pub fn new(samples: Vec<Sample>) -> Result<Self, CoreError> {
        for pair in samples.windows(2) {
            if pair[1].timestamp_ns <= pair[0].timestamp_ns {
                return Err(CoreError::Data(format!(
                    "window samples out of order: {} after {}",
                    pair[1].timestamp_ns, pair[0].timestamp_ns
                )));
            }
        }
        Ok(Self { samples })
    }

    /// Builds a window from evenly spaced values, for convenience in tests
    /// and fixtures.
    ///
    /// # Errors
    /// Returns [`CoreError::Data`] if `step_ns` is not positive.
    pub fn from_values(start_ns: i64, step_ns: i64, values: &[f64]) -> Result<Self, CoreError> {
        if step_ns <= 0 {
            return Err(CoreError::Data(format!("invalid step_ns: {step_ns}")));
        }
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, &v)| Sample::new(start_ns + step_ns * i as i64, v))
            .collect();
        Self::new(samples)
    }

    /// Returns the underlying samples.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Returns the number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true when the window holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the first sample, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    /// Returns the last sample, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Returns the raw values in order.
    #[must_use]
    pub fn values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.value).collect()
    }

    /// Returns the samples strictly newer than `timestamp_ns`.
    #[must_use]
    pub fn samples_after(&self, timestamp_ns: i64) -> &[Sample] {
        let idx = self
            .samples
            .partition_point(|s| s.timestamp_ns <= timestamp_ns);
        &self.samples[idx..]
    }

    /// Returns the samples at or before `timestamp_ns`.
    #[must_use]
    pub fn samples_until(&self, timestamp_ns: i64) -> &[Sample] {
        let idx = self
            .samples
            .partition_point(|s| s.timestamp_ns <= timestamp_ns);
        &self.samples[..idx]
    }

    /// Returns the trailing `n` samples (all samples when shorter).
    #[must_use]
    pub fn tail(&self, n: usize) -> &[Sample] {
        let start = self.samples.len().saturating_sub(n);
        &self.samples[start..]
    }
}
