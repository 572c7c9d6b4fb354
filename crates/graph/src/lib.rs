//! Vega Graph
//!
//! Dependency graph resolver for the Vega indicator engine.
//! Maintains forward and reverse adjacency over indicator identifiers,
//! rejects cycles at registration time, and produces dependency-first
//! execution orders.

pub mod error;
pub mod graph;

pub use error::GraphError;
pub use graph::DependencyGraph;
