//! Vega Types
//!
//! Core data structures for the Vega indicator engine.
//! This crate provides types for time-series samples, evaluation windows,
//! data fingerprints, and engine configuration.

#![deny(clippy::all)]

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod sample;
pub mod window;

// Re-export main types for convenience
pub use config::{EngineConfig, InvalidationStrategy, MemoryConfig};
pub use error::CoreError;
pub use fingerprint::Fingerprint;
pub use sample::Sample;
pub use window::DataWindow;
