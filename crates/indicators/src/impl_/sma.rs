//! Simple Moving Average (SMA) indicator

use vega_types::Sample;

use crate::error::IndicatorError;
use crate::traits::Indicator;

/// Simple Moving Average
///
/// Calculates the arithmetic mean of the last N sample values.
#[derive(Debug, Clone)]
pub struct SMA {
    /// Number of periods for the moving average
    pub period: usize,
}

impl SMA {
    /// Creates a new SMA indicator with the given period.
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for SMA {
    fn compute(&self, samples: &[Sample]) -> Result<Vec<f64>, IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::invalid_params("SMA period must be > 0"));
        }

        let len = samples.len();
        let mut result = vec![f64::NAN; len];
        if len < self.period {
            return Ok(result);
        }

        // Rolling sum over a fixed window
        let mut sum: f64 = samples[..self.period].iter().map(|s| s.value).sum();
        result[self.period - 1] = sum / self.period as f64;

        for i in self.period..len {
            sum += samples[i].value - samples[i - self.period].value;
            result[i] = sum / self.period as f64;
        }

        Ok(result)
    }

    fn update(&self, _prev: Option<f64>, buffer: &[Sample]) -> Result<f64, IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::invalid_params("SMA period must be > 0"));
        }
        if buffer.is_empty() {
            return Err(IndicatorError::computation("update on empty buffer"));
        }
        if buffer.len() < self.period {
            return Ok(f64::NAN);
        }
        let tail = &buffer[buffer.len() - self.period..];
        Ok(tail.iter().map(|s| s.value).sum::<f64>() / self.period as f64)
    }

    fn name(&self) -> &str {
        "SMA"
    }

    fn min_lookback(&self) -> usize {
        self.period
    }
}
