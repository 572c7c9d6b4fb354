//! Fast/slow SMA crossover detector

use vega_types::Sample;

use crate::error::IndicatorError;
use crate::impl_::sma::SMA;
use crate::traits::Indicator;

/// SMA crossover detector.
///
/// Outputs +1.0 on the sample where the fast SMA crosses above the slow SMA,
/// -1.0 on a cross below, and 0.0 otherwise.
#[derive(Debug, Clone)]
pub struct SmaCross {
    /// Fast moving-average period
    pub fast: usize,
    /// Slow moving-average period
    pub slow: usize,
}

impl SmaCross {
    /// Creates a new crossover detector.
    #[must_use]
    pub fn new(fast: usize, slow: usize) -> Self {
        Self { fast, slow }
    }
}

impl Indicator for SmaCross {
    fn compute(&self, samples: &[Sample]) -> Result<Vec<f64>, IndicatorError> {
        if self.fast == 0 || self.slow == 0 {
            return Err(IndicatorError::invalid_params(
                "SMA_CROSS periods must be > 0",
            ));
        }
        if self.fast >= self.slow {
            return Err(IndicatorError::invalid_params(
                "SMA_CROSS fast period must be < slow period",
            ));
        }

        let fast = SMA::new(self.fast).compute(samples)?;
        let slow = SMA::new(self.slow).compute(samples)?;

        let len = samples.len();
        let mut result = vec![f64::NAN; len];

        for i in 0..len {
            if !fast[i].is_finite() || !slow[i].is_finite() {
                continue;
            }
            result[i] = 0.0;
            if i == 0 {
                continue;
            }
            let (pf, ps) = (fast[i - 1], slow[i - 1]);
            if !pf.is_finite() || !ps.is_finite() {
                continue;
            }
            if pf <= ps && fast[i] > slow[i] {
                result[i] = 1.0;
            } else if pf >= ps && fast[i] < slow[i] {
                result[i] = -1.0;
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "SMA_CROSS"
    }

    fn min_lookback(&self) -> usize {
        // One extra sample so the previous fast/slow pair exists.
        self.slow + 1
    }
}
