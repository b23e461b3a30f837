//! Block node types for the authored program.
//!
//! A [`ProgramNode`] wraps a [`BlockKind`] with its literal fields, structural
//! parameter metadata and a creation sequence. `BlockKind` is a closed sum
//! type: every consumer (validator, compiler, complexity estimate) matches on
//! it exhaustively, so adding a block kind is a compile-time obligation for
//! each of them.
//!
//! Child slots are not stored on the node. They live as edges of the
//! [`BlockGraph`](crate::graph::BlockGraph), see [`SlotEdge`](crate::graph::SlotEdge).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Slot names
// ---------------------------------------------------------------------------

/// Well-known slot names shared by the editor, validator and compiler.
pub mod slot {
    pub const A: &str = "A";
    pub const B: &str = "B";
    pub const BOOL: &str = "BOOL";
    pub const VALUE: &str = "VALUE";
    pub const DELTA: &str = "DELTA";
    pub const LIST: &str = "LIST";
    pub const INDEX: &str = "INDEX";
    pub const ITEM: &str = "ITEM";
    pub const NODE: &str = "NODE";
    pub const ROW: &str = "ROW";
    pub const COL: &str = "COL";
    pub const PRIORITY: &str = "PRIORITY";
    pub const DO: &str = "DO";
    pub const ELSE: &str = "ELSE";
    pub const TIMES: &str = "TIMES";
    pub const FROM: &str = "FROM";
    pub const TO: &str = "TO";
    pub const BY: &str = "BY";
    pub const STACK: &str = "STACK";
    pub const RETURN: &str = "RETURN";

    /// `IF{n}` condition slot of an `if` block.
    pub fn if_cond(n: usize) -> String {
        format!("IF{n}")
    }

    /// `DO{n}` branch body of an `if` block.
    pub fn if_body(n: usize) -> String {
        format!("DO{n}")
    }

    /// `ARG{n}` argument slot of a procedure call.
    pub fn arg(n: usize) -> String {
        format!("ARG{n}")
    }

    /// `ITEM{n}` element slot of a list literal.
    pub fn item(n: usize) -> String {
        format!("ITEM{n}")
    }
}

/// Well-known field names.
pub mod field {
    pub const NUM: &str = "NUM";
    pub const TEXT: &str = "TEXT";
    pub const BOOL: &str = "BOOL";
    pub const VAR: &str = "VAR";
    pub const NAME: &str = "NAME";
    pub const KEY: &str = "KEY";
    pub const FAMILY: &str = "FAMILY";
}

// ---------------------------------------------------------------------------
// Operator sub-enums
// ---------------------------------------------------------------------------

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArithOp {
    #[default]
    Add,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Power,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOp {
    #[default]
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// Boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogicOp {
    #[default]
    And,
    Or,
}

/// Two-operand minimum/maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MinMaxOp {
    #[default]
    Min,
    Max,
}

/// Whether a conditional loop runs while or until its condition holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoopMode {
    #[default]
    While,
    Until,
}

/// Loop exit statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowKind {
    #[default]
    Break,
    Continue,
}

/// World sensors readable from an expression block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Sensor {
    /// Whether an uncollected item lies on the agent's node.
    #[default]
    ItemHere,
    /// Whether the agent stands on the goal node.
    AtGoal,
    /// The agent's current node id.
    CurrentNode,
    /// Ids of nodes adjacent to the agent.
    Neighbors,
}

impl Sensor {
    /// Name passed to `api.sense(..)` in emitted code.
    pub fn wire_name(self) -> &'static str {
        match self {
            Sensor::ItemHere => "ITEM_HERE",
            Sensor::AtGoal => "AT_GOAL",
            Sensor::CurrentNode => "CURRENT_NODE",
            Sensor::Neighbors => "NEIGHBORS",
        }
    }
}

// ---------------------------------------------------------------------------
// Block kinds
// ---------------------------------------------------------------------------

/// Coarse category of a block, matching the editor's palette sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    Statement,
    Expression,
    Control,
    ProcedureDef,
    ProcedureCall,
}

/// Every block the editor can produce.
///
/// Operator choices are carried on the variant; free-form values (numbers,
/// variable names, procedure names) live in [`ProgramNode::fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    // -- expressions --
    Number,
    Text,
    Boolean,
    Null,
    VariableGet,
    Arithmetic {
        #[serde(default)]
        op: ArithOp,
    },
    Compare {
        #[serde(default)]
        op: CompareOp,
    },
    Logic {
        #[serde(default)]
        op: LogicOp,
    },
    Negate,
    MinMax {
        #[serde(default)]
        op: MinMaxOp,
    },
    ListCreate,
    ListGet,
    ListLength,
    ListContains,
    /// Reads a key from the level's algorithm payload.
    AlgorithmInput,
    Sensor {
        #[serde(default)]
        sensor: Sensor,
    },

    // -- statements --
    VariableSet,
    VariableChange,
    ListSet,
    ListPush,
    MoveTo,
    Collect,
    /// Writes one cell of a dynamic-programming table.
    TableUpdate,
    /// Adds a node to the priority frontier.
    FrontierPush,
    /// Selects (removes) a node from the priority frontier.
    FrontierSelect,
    ProcedureReturn,

    // -- control --
    If,
    WhileUntil {
        #[serde(default)]
        mode: LoopMode,
    },
    Repeat,
    ForRange,
    ForEach,
    FlowControl {
        #[serde(default)]
        flow: FlowKind,
    },

    // -- procedures --
    ProcedureDef,
    ProcedureCall,
}

/// Expected shape of a value slot. Drives the compiler's safe defaults when a
/// slot is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotShape {
    Number,
    /// A loop step; defaults to one so an empty slot cannot stall a loop.
    Step,
    Boolean,
    List,
    Any,
}

impl BlockKind {
    /// Returns the palette category of this kind.
    pub fn category(&self) -> NodeCategory {
        match self {
            BlockKind::Number
            | BlockKind::Text
            | BlockKind::Boolean
            | BlockKind::Null
            | BlockKind::VariableGet
            | BlockKind::Arithmetic { .. }
            | BlockKind::Compare { .. }
            | BlockKind::Logic { .. }
            | BlockKind::Negate
            | BlockKind::MinMax { .. }
            | BlockKind::ListCreate
            | BlockKind::ListGet
            | BlockKind::ListLength
            | BlockKind::ListContains
            | BlockKind::AlgorithmInput
            | BlockKind::Sensor { .. } => NodeCategory::Expression,
            BlockKind::VariableSet
            | BlockKind::VariableChange
            | BlockKind::ListSet
            | BlockKind::ListPush
            | BlockKind::MoveTo
            | BlockKind::Collect
            | BlockKind::TableUpdate
            | BlockKind::FrontierPush
            | BlockKind::FrontierSelect
            | BlockKind::ProcedureReturn => NodeCategory::Statement,
            BlockKind::If
            | BlockKind::WhileUntil { .. }
            | BlockKind::Repeat
            | BlockKind::ForRange
            | BlockKind::ForEach
            | BlockKind::FlowControl { .. } => NodeCategory::Control,
            BlockKind::ProcedureDef => NodeCategory::ProcedureDef,
            BlockKind::ProcedureCall => NodeCategory::ProcedureCall,
        }
    }

    /// Returns `true` if the block produces a value.
    pub fn is_expression(&self) -> bool {
        self.category() == NodeCategory::Expression
    }

    /// Returns `true` for blocks that animate the world or a visualization.
    pub fn is_domain_op(&self) -> bool {
        matches!(
            self,
            BlockKind::MoveTo
                | BlockKind::Collect
                | BlockKind::TableUpdate
                | BlockKind::FrontierPush
                | BlockKind::FrontierSelect
        )
    }

    /// Fixed value slots every instance of this kind must fill.
    ///
    /// Kinds with numbered slots (`If`, `ListCreate`, `ProcedureCall`) report
    /// none here; their arity comes from the node itself.
    pub fn value_slots(&self) -> &'static [&'static str] {
        match self {
            BlockKind::Arithmetic { .. }
            | BlockKind::Compare { .. }
            | BlockKind::Logic { .. }
            | BlockKind::MinMax { .. } => &[slot::A, slot::B],
            BlockKind::Negate => &[slot::BOOL],
            BlockKind::ListGet => &[slot::LIST, slot::INDEX],
            BlockKind::ListLength => &[slot::VALUE],
            BlockKind::ListContains => &[slot::LIST, slot::ITEM],
            BlockKind::VariableSet | BlockKind::ProcedureReturn => &[slot::VALUE],
            BlockKind::VariableChange => &[slot::DELTA],
            BlockKind::ListSet => &[slot::LIST, slot::INDEX, slot::VALUE],
            BlockKind::ListPush => &[slot::LIST, slot::VALUE],
            BlockKind::MoveTo | BlockKind::FrontierSelect => &[slot::NODE],
            BlockKind::TableUpdate => &[slot::ROW, slot::COL, slot::VALUE],
            BlockKind::FrontierPush => &[slot::NODE, slot::PRIORITY],
            BlockKind::WhileUntil { .. } => &[slot::BOOL],
            BlockKind::Repeat => &[slot::TIMES],
            BlockKind::ForRange => &[slot::FROM, slot::TO, slot::BY],
            BlockKind::ForEach => &[slot::LIST],
            BlockKind::Number
            | BlockKind::Text
            | BlockKind::Boolean
            | BlockKind::Null
            | BlockKind::VariableGet
            | BlockKind::ListCreate
            | BlockKind::AlgorithmInput
            | BlockKind::Sensor { .. }
            | BlockKind::Collect
            | BlockKind::If
            | BlockKind::FlowControl { .. }
            | BlockKind::ProcedureDef
            | BlockKind::ProcedureCall => &[],
        }
    }

    /// Shape expected in `slot_name`, used to pick a default for empty slots.
    pub fn slot_shape(&self, slot_name: &str) -> SlotShape {
        match (self, slot_name) {
            (BlockKind::Arithmetic { .. }, _)
            | (BlockKind::MinMax { .. }, _)
            | (BlockKind::Compare { .. }, _)
            | (BlockKind::VariableChange, _)
            | (BlockKind::Repeat, _)
            | (BlockKind::TableUpdate, _)
            | (BlockKind::FrontierPush, slot::PRIORITY)
            | (BlockKind::ListGet, slot::INDEX)
            | (BlockKind::ListSet, slot::INDEX) => SlotShape::Number,
            (BlockKind::ForRange, slot::BY) => SlotShape::Step,
            (BlockKind::ForRange, _) => SlotShape::Number,
            (BlockKind::Logic { .. }, _)
            | (BlockKind::Negate, _)
            | (BlockKind::WhileUntil { .. }, _)
            | (BlockKind::If, _) => SlotShape::Boolean,
            (BlockKind::ListGet, slot::LIST)
            | (BlockKind::ListSet, slot::LIST)
            | (BlockKind::ListPush, slot::LIST)
            | (BlockKind::ListLength, _)
            | (BlockKind::ListContains, slot::LIST)
            | (BlockKind::ForEach, _) => SlotShape::List,
            _ => SlotShape::Any,
        }
    }

    /// Statement-sequence slots of this kind.
    pub fn statement_slots(&self) -> &'static [&'static str] {
        match self {
            BlockKind::WhileUntil { .. }
            | BlockKind::Repeat
            | BlockKind::ForRange
            | BlockKind::ForEach => &[slot::DO],
            BlockKind::ProcedureDef => &[slot::STACK],
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Fields and nodes
// ---------------------------------------------------------------------------

/// A literal or enum value stored in a block field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Returns the text payload, if this is a text field.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a numeric reading of the field. Text is parsed leniently.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => s.trim().parse().ok(),
            FieldValue::Bool(_) => None,
        }
    }

    /// Returns a boolean reading of the field. `"TRUE"`/`"FALSE"` text is
    /// accepted because the editor stores dropdown values as text.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) if s.eq_ignore_ascii_case("true") => Some(true),
            FieldValue::Text(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }
}

/// A block in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramNode {
    /// What this block does.
    #[serde(flatten)]
    pub kind: BlockKind,
    /// Field name -> literal/enum value, in editor order.
    #[serde(default)]
    pub fields: IndexMap<String, FieldValue>,
    /// Structural parameter list for procedure definitions and calls.
    ///
    /// For a definition this is the canonical signature. For a call it is a
    /// copy kept in sync by the binding resolver.
    #[serde(default)]
    pub params: Vec<String>,
    /// Identifier assigned by the editor, used in diagnostics.
    #[serde(default)]
    pub editor_id: Option<String>,
    /// Monotonic creation sequence, assigned by the graph.
    #[serde(default)]
    pub created: u64,
}

impl ProgramNode {
    /// Creates a node of `kind` with no fields.
    pub fn new(kind: BlockKind) -> Self {
        ProgramNode {
            kind,
            fields: IndexMap::new(),
            params: Vec::new(),
            editor_id: None,
            created: 0,
        }
    }

    /// Builder: sets a field.
    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Builder: sets a text field.
    pub fn with_text(self, name: &str, value: &str) -> Self {
        self.with_field(name, FieldValue::Text(value.to_string()))
    }

    /// Builder: sets the parameter list.
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the text of `name`, if present and textual.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::as_text)
    }

    /// Returns the procedure name of a definition or call node.
    pub fn procedure_name(&self) -> Option<&str> {
        match self.kind {
            BlockKind::ProcedureDef | BlockKind::ProcedureCall => self.text(field::NAME),
            _ => None,
        }
    }

    /// Overwrites the procedure name field.
    pub fn set_procedure_name(&mut self, name: &str) {
        self.fields
            .insert(field::NAME.to_string(), FieldValue::Text(name.to_string()));
    }

    /// Human-readable handle for diagnostics: the editor id when known.
    pub fn label(&self) -> String {
        match &self.editor_id {
            Some(id) => format!("{:?}#{}", self.kind.category(), id),
            None => format!("{:?}@{}", self.kind.category(), self.created),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_domain_op_is_a_statement() {
        for kind in [
            BlockKind::MoveTo,
            BlockKind::Collect,
            BlockKind::TableUpdate,
            BlockKind::FrontierPush,
            BlockKind::FrontierSelect,
        ] {
            assert!(kind.is_domain_op());
            assert_eq!(kind.category(), NodeCategory::Statement);
        }
    }

    #[test]
    fn binary_operators_have_two_value_slots() {
        let kind = BlockKind::Arithmetic { op: ArithOp::Add };
        assert_eq!(kind.value_slots(), &["A", "B"]);
        assert_eq!(kind.slot_shape("A"), SlotShape::Number);
    }

    #[test]
    fn for_range_step_defaults_to_step_shape() {
        assert_eq!(BlockKind::ForRange.slot_shape(slot::BY), SlotShape::Step);
        assert_eq!(BlockKind::ForRange.slot_shape(slot::TO), SlotShape::Number);
    }

    #[test]
    fn kind_deserializes_with_missing_operator() {
        let kind: BlockKind = serde_json::from_str(r#"{"kind":"arithmetic"}"#).unwrap();
        assert_eq!(kind, BlockKind::Arithmetic { op: ArithOp::Add });

        let kind: BlockKind =
            serde_json::from_str(r#"{"kind":"compare","op":"LTE"}"#).unwrap();
        assert_eq!(kind, BlockKind::Compare { op: CompareOp::Lte });
    }

    #[test]
    fn field_value_readings() {
        assert_eq!(FieldValue::Text(" 12 ".into()).as_number(), Some(12.0));
        assert_eq!(FieldValue::Text("TRUE".into()).as_bool(), Some(true));
        assert_eq!(FieldValue::Number(3.0).as_text(), None);
    }

    #[test]
    fn procedure_name_only_on_procedures() {
        let def = ProgramNode::new(BlockKind::ProcedureDef).with_text(field::NAME, "DFS");
        assert_eq!(def.procedure_name(), Some("DFS"));

        let var = ProgramNode::new(BlockKind::VariableGet).with_text(field::NAME, "x");
        assert_eq!(var.procedure_name(), None);
    }
}
