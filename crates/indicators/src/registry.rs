//! Indicator registry for dynamic unit creation.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::IndicatorError;
use crate::impl_::{cross::SmaCross, ema::EMA, roc::ROC, sma::SMA};
use crate::traits::{Indicator, IndicatorParams};

/// Factory function type for creating indicators from parameters.
pub type IndicatorFactory =
    Box<dyn Fn(&IndicatorParams) -> Result<Arc<dyn Indicator>, IndicatorError> + Send + Sync>;

/// Registry for indicator factories.
///
/// Allows dynamic creation of units by name and parameters. Pre-populated
/// with the bundled units.
pub struct IndicatorRegistry {
    /// Indicator factories by name.
    factories: HashMap<String, IndicatorFactory>,
}

impl IndicatorRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers an indicator factory.
    pub fn register<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&IndicatorParams) -> Result<Arc<dyn Indicator>, IndicatorError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
    }

    /// Creates an indicator by name and parameters.
    ///
    /// # Errors
    ///
    /// Returns [`IndicatorError::UnknownIndicator`] if the name is not
    /// registered and [`IndicatorError::InvalidParams`] when parameters do
    /// not match.
    pub fn create(
        &self,
        name: &str,
        params: &IndicatorParams,
    ) -> Result<Arc<dyn Indicator>, IndicatorError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| IndicatorError::UnknownIndicator(name.to_string()))?;
        factory(params)
    }

    /// Checks if an indicator is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns list of registered indicator names.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Creates a registry with all bundled units pre-registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register("SMA", |params| match params {
            IndicatorParams::Period(0) => {
                Err(IndicatorError::invalid_params("SMA period must be > 0"))
            }
            IndicatorParams::Period(period) => Ok(Arc::new(SMA::new(*period))),
            _ => Err(IndicatorError::invalid_params("SMA requires Period params")),
        });

        registry.register("EMA", |params| match params {
            IndicatorParams::Period(0) => {
                Err(IndicatorError::invalid_params("EMA period must be > 0"))
            }
            IndicatorParams::Period(period) => Ok(Arc::new(EMA::new(*period))),
            _ => Err(IndicatorError::invalid_params("EMA requires Period params")),
        });

        registry.register("ROC", |params| match params {
            IndicatorParams::Period(0) => {
                Err(IndicatorError::invalid_params("ROC period must be > 0"))
            }
            IndicatorParams::Period(period) => Ok(Arc::new(ROC::new(*period))),
            _ => Err(IndicatorError::invalid_params("ROC requires Period params")),
        });

        registry.register("SMA_CROSS", |params| match params {
            IndicatorParams::Crossover { fast, slow } => {
                if *fast == 0 || *fast >= *slow {
                    return Err(IndicatorError::invalid_params(
                        "SMA_CROSS requires 0 < fast < slow",
                    ));
                }
                Ok(Arc::new(SmaCross::new(*fast, *slow)))
            }
            _ => Err(IndicatorError::invalid_params(
                "SMA_CROSS requires Crossover params",
            )),
        });

        registry
    }
}

impl Default for IndicatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
