//! Nested JSON exchange format for block programs.
//!
//! The editor saves programs as a tree of [`BlockSpec`]s rather than as the
//! flat node/edge graph. Slot contents are either a single block (value
//! slots) or an array (statement sequences):
//!
//! ```json
//! {"blocks": [
//!   {"kind": "procedure_def", "fields": {"NAME": "DFS"}, "params": ["graph", "start"],
//!    "inputs": {"STACK": [{"kind": "collect"}]}},
//!   {"kind": "procedure_call", "fields": {"NAME": "DFS"}}
//! ]}
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::BlockGraph;
use crate::id::NodeId;
use crate::level::decode_json_value;
use crate::node::{BlockKind, FieldValue, ProgramNode};

/// A whole saved program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockDocument {
    #[serde(default)]
    pub blocks: Vec<BlockSpec>,
}

/// One block with its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSpec {
    #[serde(flatten)]
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub fields: IndexMap<String, FieldValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inputs: IndexMap<String, SlotContent>,
}

/// Contents of one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotContent {
    Sequence(Vec<BlockSpec>),
    Single(Box<BlockSpec>),
}

impl BlockDocument {
    /// Parses a document from JSON text. A JSON string whose content is the
    /// document (double-encoded, as some stores return it) is accepted too.
    pub fn from_json_str(text: &str) -> Result<Self, CoreError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let value = decode_json_value(value)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl BlockGraph {
    /// Builds a graph from a document. Blocks are created in document
    /// pre-order, so creation order matches reading order.
    pub fn from_document(doc: &BlockDocument) -> Result<Self, CoreError> {
        let mut graph = BlockGraph::new();
        for spec in &doc.blocks {
            graph.insert_spec(spec)?;
        }
        Ok(graph)
    }

    /// Inserts a block tree, returning the id of its top block.
    pub fn insert_spec(&mut self, spec: &BlockSpec) -> Result<NodeId, CoreError> {
        let node = ProgramNode {
            kind: spec.kind,
            fields: spec.fields.clone(),
            params: spec.params.clone(),
            editor_id: spec.id.clone(),
            created: 0,
        };
        let id = self.add_node(node);
        for (slot_name, content) in &spec.inputs {
            match content {
                SlotContent::Single(child) => {
                    let child_id = self.insert_spec(child)?;
                    self.attach(id, slot_name, child_id)?;
                }
                SlotContent::Sequence(children) => {
                    for child in children {
                        let child_id = self.insert_spec(child)?;
                        self.attach(id, slot_name, child_id)?;
                    }
                }
            }
        }
        Ok(id)
    }

    /// Exports the graph back into the nested form.
    pub fn to_document(&self) -> BlockDocument {
        BlockDocument {
            blocks: self
                .roots()
                .into_iter()
                .filter_map(|root| self.export_spec(root))
                .collect(),
        }
    }

    fn export_spec(&self, id: NodeId) -> Option<BlockSpec> {
        let node = self.node(id)?;
        let mut inputs = IndexMap::new();
        for slot_name in self.slot_names(id) {
            let kids: Vec<BlockSpec> = self
                .children(id, &slot_name)
                .into_iter()
                .filter_map(|kid| self.export_spec(kid))
                .collect();
            let content = if kids.len() == 1 && self.child_is_value(&kids[0]) {
                SlotContent::Single(Box::new(kids.into_iter().next()?))
            } else {
                SlotContent::Sequence(kids)
            };
            inputs.insert(slot_name, content);
        }
        Some(BlockSpec {
            kind: node.kind,
            id: node.editor_id.clone(),
            fields: node.fields.clone(),
            params: node.params.clone(),
            inputs,
        })
    }

    fn child_is_value(&self, spec: &BlockSpec) -> bool {
        spec.kind.is_expression() || spec.kind == BlockKind::ProcedureCall
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{field, slot, ArithOp};

    const SAMPLE: &str = r#"{"blocks": [
        {"kind": "variable_set", "id": "set1", "fields": {"VAR": "total"},
         "inputs": {"VALUE": {"kind": "arithmetic", "op": "MULTIPLY",
            "inputs": {"A": {"kind": "number", "fields": {"NUM": 6}},
                       "B": {"kind": "number", "fields": {"NUM": 7}}}}}},
        {"kind": "repeat", "inputs": {"TIMES": {"kind": "number", "fields": {"NUM": 3}},
                                      "DO": [{"kind": "collect"}, {"kind": "collect"}]}}
    ]}"#;

    #[test]
    fn document_builds_graph_in_reading_order() {
        let doc = BlockDocument::from_json_str(SAMPLE).unwrap();
        let graph = BlockGraph::from_document(&doc).unwrap();

        let roots = graph.roots();
        assert_eq!(roots.len(), 2);
        let set = graph.node(roots[0]).unwrap();
        assert_eq!(set.kind, BlockKind::VariableSet);
        assert_eq!(set.editor_id.as_deref(), Some("set1"));
        assert_eq!(set.text(field::VAR), Some("total"));

        let value = graph.child(roots[0], slot::VALUE).unwrap();
        assert_eq!(
            graph.node(value).unwrap().kind,
            BlockKind::Arithmetic { op: ArithOp::Multiply }
        );
        assert_eq!(graph.children(roots[1], slot::DO).len(), 2);
    }

    #[test]
    fn double_encoded_document_is_accepted() {
        let encoded = serde_json::to_string(SAMPLE).unwrap();
        let doc = BlockDocument::from_json_str(&encoded).unwrap();
        assert_eq!(doc.blocks.len(), 2);
    }

    #[test]
    fn export_matches_import() {
        let doc = BlockDocument::from_json_str(SAMPLE).unwrap();
        let graph = BlockGraph::from_document(&doc).unwrap();
        assert_eq!(graph.to_document(), doc);
    }
}
