//! Exponential Moving Average (EMA) indicator

use vega_types::Sample;

use crate::error::IndicatorError;
use crate::traits::Indicator;

/// Exponential Moving Average
///
/// Matches pandas `ewm(span=period, adjust=False).mean()` semantics.
/// Multiplier = 2 / (period + 1)
#[derive(Debug, Clone)]
pub struct EMA {
    /// Number of periods for the EMA
    pub period: usize,
}

impl EMA {
    /// Creates a new EMA indicator with the given period.
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    /// Calculates the EMA multiplier (smoothing factor).
    fn multiplier(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }
}

impl Indicator for EMA {
    fn compute(&self, samples: &[Sample]) -> Result<Vec<f64>, IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::invalid_params("EMA period must be > 0"));
        }

        let len = samples.len();
        let mut result = vec![f64::NAN; len];
        let alpha = self.multiplier();
        let mut prev = f64::NAN;

        for (i, sample) in samples.iter().enumerate() {
            let value = sample.value;
            if !value.is_finite() {
                if prev.is_finite() {
                    result[i] = prev;
                }
                continue;
            }

            if prev.is_finite() {
                prev = alpha * value + (1.0 - alpha) * prev;
            } else {
                prev = value;
            }
            result[i] = prev;
        }

        Ok(result)
    }

    fn update(&self, prev: Option<f64>, buffer: &[Sample]) -> Result<f64, IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::invalid_params("EMA period must be > 0"));
        }
        let newest = buffer
            .last()
            .ok_or_else(|| IndicatorError::computation("update on empty buffer"))?;

        // Recursive continuation from the prior point; exact, no re-scan.
        match prev.filter(|p| p.is_finite()) {
            Some(p) if newest.value.is_finite() => {
                Ok(self.multiplier() * newest.value + (1.0 - self.multiplier()) * p)
            }
            Some(p) => Ok(p),
            None => {
                let points = self.compute(buffer)?;
                points
                    .last()
                    .copied()
                    .ok_or_else(|| IndicatorError::computation("update on empty buffer"))
            }
        }
    }

    fn name(&self) -> &str {
        "EMA"
    }

    fn min_lookback(&self) -> usize {
        1
    }
}
