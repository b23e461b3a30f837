//! Core error types for blockquest-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of block graph construction and level parsing. Malformed
//! graphs are never an error here: the resolver and compiler repair them.

use crate::id::NodeId;
use thiserror::Error;

/// Core errors produced by the blockquest-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node index was not found in the graph.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// Attaching a child would make a node its own ancestor.
    #[error("attaching node {child} under {parent} would create a cycle")]
    CycleDetected { parent: NodeId, child: NodeId },

    /// A node already has a parent; blocks form a tree.
    #[error("node {child} is already attached to a parent")]
    AlreadyAttached { child: NodeId },

    /// A JSON document or level payload could not be decoded.
    #[error("invalid document: {reason}")]
    InvalidDocument { reason: String },
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidDocument {
            reason: err.to_string(),
        }
    }
}
