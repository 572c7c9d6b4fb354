//! Graph error types.

use thiserror::Error;

/// Errors that can occur during graph mutation or traversal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A node with this id is already registered
    #[error("duplicate node: {0}")]
    DuplicateNode(String),

    /// Registration would introduce a dependency cycle
    #[error("cycle detected registering '{id}' via dependency '{via}'")]
    CycleDetected {
        /// Node whose registration was rejected.
        id: String,
        /// Dependency through which the cycle closes.
        via: String,
    },

    /// The node still has registered dependents
    #[error("node '{id}' has dependents: {dependents:?}")]
    HasDependents {
        /// Node that could not be removed.
        id: String,
        /// Ids of the remaining dependents.
        dependents: Vec<String>,
    },

    /// The node (or a reachable dependency) is not registered
    #[error("node not registered: {0}")]
    NotRegistered(String),
}
