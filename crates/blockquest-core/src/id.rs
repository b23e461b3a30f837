//! Stable ID newtype for block graph nodes.
//!
//! [`NodeId`] wraps the `u32` index of a petgraph `StableGraph` node so that a
//! node reference cannot be confused with any other integer in the API.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Stable node identifier. Maps to a petgraph `NodeIndex<u32>`.
///
/// Indices of removed nodes may be reused by later insertions, so a `NodeId`
/// says nothing about creation order. Use [`ProgramNode::created`] for that.
///
/// [`ProgramNode::created`]: crate::node::ProgramNode::created
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NodeIndex<u32>> for NodeId {
    fn from(idx: NodeIndex<u32>) -> Self {
        NodeId(idx.index() as u32)
    }
}

impl From<NodeId> for NodeIndex<u32> {
    fn from(id: NodeId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}
