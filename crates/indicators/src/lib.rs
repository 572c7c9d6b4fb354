//! Vega Indicators
//!
//! Indicator units for the Vega computation engine.
//! A unit is a pure computation contract: batch `compute` over a window of
//! samples, and streaming `update` from retained state plus one new sample.
//!
//! # Features
//! - `Indicator` trait with batch and streaming contracts
//! - Registry for indicator factories
//! - Immutable `IndicatorValue` result payload
//!
//! # Bundled Units
//! - SMA: Simple Moving Average
//! - EMA: Exponential Moving Average
//! - ROC: Rate of Change
//! - SMA_CROSS: fast/slow SMA crossover detector

pub mod error;
pub mod impl_;
pub mod registry;
pub mod traits;

// Re-export main types
pub use error::IndicatorError;
pub use registry::{IndicatorFactory, IndicatorRegistry};
pub use traits::{Indicator, IndicatorParams, IndicatorValue};

// Re-export indicator implementations
pub use impl_::{cross::SmaCross, ema::EMA, roc::ROC, sma::SMA};
