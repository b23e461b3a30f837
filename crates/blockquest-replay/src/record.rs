//! Step records and buffer snapshots.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifies one step buffer inside a [`ReplayHub`](crate::ReplayHub).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BufferId(pub u32);

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// The algorithm visualization a buffer feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationKind {
    /// Dynamic-programming table.
    DpTable,
    /// Priority frontier of a graph search.
    Frontier,
}

/// Where in the visualization a record lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepTarget {
    TableCell { row: i64, col: i64 },
    Frontier { index: usize },
}

/// One immutable state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Push order within the buffer since its last reset.
    pub seq: u64,
    pub target: StepTarget,
    pub value: serde_json::Value,
    /// Comparison operands, decision flags and similar extras.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    /// Milliseconds since the recorder was created.
    pub timestamp_ms: u64,
}

/// The flushed contents of a buffer as published to readers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferSnapshot {
    pub steps: Arc<Vec<StepRecord>>,
    /// Incremented on every reset; stale readers compare against it.
    pub reset_id: u64,
    /// Records dropped from the front since the last reset.
    pub evicted: u64,
}

impl BufferSnapshot {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Records flushed since the last reset, evicted ones included.
    pub fn total(&self) -> u64 {
        self.evicted + self.steps.len() as u64
    }
}
