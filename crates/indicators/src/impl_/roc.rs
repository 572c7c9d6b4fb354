//! Rate of Change (ROC) indicator

use vega_types::Sample;

use crate::error::IndicatorError;
use crate::traits::Indicator;

/// Rate of Change
///
/// Percentage change between the current value and the value `period`
/// samples earlier.
#[derive(Debug, Clone)]
pub struct ROC {
    /// Lookback distance in samples
    pub period: usize,
}

impl ROC {
    /// Creates a new ROC indicator with the given period.
    #[must_use]
    pub fn new(period: usize) -> Self {
        Self { period }
    }
}

impl Indicator for ROC {
    fn compute(&self, samples: &[Sample]) -> Result<Vec<f64>, IndicatorError> {
        if self.period == 0 {
            return Err(IndicatorError::invalid_params("ROC period must be > 0"));
        }

        let len = samples.len();
        let mut result = vec![f64::NAN; len];

        for i in self.period..len {
            let base = samples[i - self.period].value;
            if base.abs() > f64::EPSILON {
                result[i] = (samples[i].value - base) / base * 100.0;
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "ROC"
    }

    fn min_lookback(&self) -> usize {
        self.period + 1
    }
}
