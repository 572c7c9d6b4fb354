//! Vega Engine
//!
//! Indicator computation engine: dependency-ordered evaluation over data
//! windows, fingerprint-keyed memoization, incremental catch-up from
//! retained per-node state, and governed memory with background
//! maintenance.

pub mod cache;
pub mod engine;
pub mod error;
pub mod events;
pub mod metrics;
pub mod planner;
pub mod state;

pub use cache::MemoCache;
pub use engine::{BatchOutcome, IndicatorEngine, ResultEnvelope};
pub use error::EngineError;
pub use events::{EngineEvent, EventBus, EventListener};
pub use metrics::{EngineMetrics, EngineStatus, NodeMetrics};
pub use planner::EvalMode;
pub use state::{IncrementalState, StateStore};
