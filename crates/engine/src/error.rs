//! Engine error types.

use thiserror::Error;
use vega_graph::GraphError;
use vega_indicators::IndicatorError;
use vega_types::CoreError;

/// Errors surfaced by the indicator engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Dependency-graph violation (duplicate, cycle, dependents guard).
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Indicator creation failed (unknown name, bad parameters).
    #[error("indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    /// Referenced node is not registered.
    #[error("node not registered: {0}")]
    NotRegistered(String),

    /// A unit failed while computing a node.
    #[error("evaluation failed for '{node}'")]
    Evaluation {
        /// Node whose unit failed.
        node: String,
        /// Underlying computation error.
        #[source]
        source: IndicatorError,
    },

    /// A streamed sample is not newer than the node's processed position.
    #[error("out-of-order sample for '{node}' at {timestamp_ns}")]
    OutOfOrderSample {
        /// Node that rejected the sample.
        node: String,
        /// Timestamp of the rejected sample, epoch nanoseconds.
        timestamp_ns: i64,
    },

    /// Configuration or data error from the core types.
    #[error(transparent)]
    Core(#[from] CoreError),
}
