//! Indicator error types.

use thiserror::Error;

/// Errors that can occur during indicator computation or registry operations.
#[derive(Debug, Error)]
pub enum IndicatorError {
    /// Unknown indicator name requested from registry
    #[error("unknown indicator: {0}")]
    UnknownIndicator(String),

    /// Invalid parameters for the indicator
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Insufficient data for computation
    #[error("insufficient data: need {required} samples, got {actual}")]
    InsufficientData {
        /// Required number of samples.
        required: usize,
        /// Actual number of samples provided.
        actual: usize,
    },

    /// Computation error (e.g., non-finite input, invalid state)
    #[error("computation error: {0}")]
    ComputationError(String),
}

impl IndicatorError {
    /// Creates an `InvalidParams` error with a message.
    #[must_use]
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        IndicatorError::InvalidParams(msg.into())
    }

    /// Creates a `ComputationError` with a message.
    #[must_use]
    pub fn computation(msg: impl Into<String>) -> Self {
        IndicatorError::ComputationError(msg.into())
    }
}
