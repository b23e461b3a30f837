//! Block graph data model for blockquest.
//!
//! The authored program is a [`BlockGraph`]: typed [`ProgramNode`]s joined by
//! slot edges. This crate also owns the JSON exchange formats (block
//! documents and level context), the procedure binding resolver and the
//! static complexity estimate used for scoring.

pub mod analysis;
pub mod binding;
pub mod document;
pub mod error;
pub mod graph;
pub mod id;
pub mod level;
pub mod node;
pub mod victory;

// Re-export commonly used types
pub use analysis::{estimate_complexity, ComplexityClass};
pub use binding::{resolve_bindings, ProcedureBinding, ResolutionReport, DEFAULT_PROCEDURE_NAME};
pub use document::{BlockDocument, BlockSpec, SlotContent};
pub use error::CoreError;
pub use graph::{BlockGraph, GraphDiagnostic, SlotEdge};
pub use id::NodeId;
pub use level::{LevelContext, LevelEdge, LevelNode};
pub use node::{BlockKind, FieldValue, NodeCategory, ProgramNode};
pub use victory::{FunctionTestCase, ObjectiveKind, SecondaryObjective, VictoryConditionSpec};
