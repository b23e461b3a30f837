//! BlockGraph: the authored program as a forest of typed blocks.
//!
//! Blocks are nodes of a petgraph `StableGraph`; a child sitting in a named
//! slot of its parent is an edge `parent -> child` carrying a [`SlotEdge`].
//! Statement slots hold ordered sequences, so several edges may share a slot
//! name and are ordered by [`SlotEdge::position`]. Blocks without a parent
//! are top-level roots, ordered by creation.
//!
//! The graph never rejects a malformed block. [`BlockGraph::validate`]
//! reports problems as diagnostics and the compiler substitutes defaults.

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::NodeId;
use crate::node::{slot, BlockKind, NodeCategory, ProgramNode};

/// Edge weight: which slot of the parent holds the child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotEdge {
    /// Slot name on the parent block (`"A"`, `"DO"`, `"ARG0"`, ...).
    pub slot: String,
    /// Order inside a statement sequence. Value slots use position 0.
    pub position: u32,
}

/// A structural problem found by [`BlockGraph::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDiagnostic {
    /// The offending block.
    pub node: NodeId,
    /// What is wrong with it.
    pub message: String,
}

/// The authored block program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockGraph {
    graph: StableGraph<ProgramNode, SlotEdge, Directed, u32>,
    next_created: u64,
}

impl BlockGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        BlockGraph {
            graph: StableGraph::new(),
            next_created: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Read-only accessors
    // -----------------------------------------------------------------------

    /// Number of live blocks.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Looks up a block.
    pub fn node(&self, id: NodeId) -> Option<&ProgramNode> {
        self.graph.node_weight(id.into())
    }

    /// Looks up a block mutably.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut ProgramNode> {
        self.graph.node_weight_mut(id.into())
    }

    /// Returns `true` if `id` refers to a live block.
    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.contains_node(id.into())
    }

    /// All live block ids in creation order.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.graph.node_indices().map(NodeId::from).collect();
        ids.sort_by_key(|id| self.created_of(*id));
        ids
    }

    /// Top-level blocks (no parent) in creation order.
    pub fn roots(&self) -> Vec<NodeId> {
        let mut roots: Vec<NodeId> = self
            .graph
            .node_indices()
            .filter(|idx| {
                self.graph
                    .edges_directed(*idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(NodeId::from)
            .collect();
        roots.sort_by_key(|id| self.created_of(*id));
        roots
    }

    /// The parent block and slot holding `id`, if attached.
    pub fn parent(&self, id: NodeId) -> Option<(NodeId, &SlotEdge)> {
        self.graph
            .edges_directed(id.into(), Direction::Incoming)
            .next()
            .map(|e| (NodeId::from(e.source()), e.weight()))
    }

    /// Children in `slot_name`, ordered by position.
    pub fn children(&self, id: NodeId, slot_name: &str) -> Vec<NodeId> {
        let mut found: Vec<(u32, u64, NodeId)> = self
            .graph
            .edges_directed(id.into(), Direction::Outgoing)
            .filter(|e| e.weight().slot == slot_name)
            .map(|e| {
                let child = NodeId::from(e.target());
                (e.weight().position, self.created_of(child), child)
            })
            .collect();
        found.sort();
        found.into_iter().map(|(_, _, child)| child).collect()
    }

    /// First child in `slot_name`, for value slots.
    pub fn child(&self, id: NodeId, slot_name: &str) -> Option<NodeId> {
        self.children(id, slot_name).into_iter().next()
    }

    /// Distinct slot names in use under `id`, sorted.
    pub fn slot_names(&self, id: NodeId) -> Vec<String> {
        let mut names: Vec<String> = self
            .graph
            .edges_directed(id.into(), Direction::Outgoing)
            .map(|e| e.weight().slot.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// `id` and every block below it, parents before children.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if !self.contains(next) || out.contains(&next) {
                continue;
            }
            out.push(next);
            let mut kids: Vec<NodeId> = self
                .graph
                .edges_directed(next.into(), Direction::Outgoing)
                .map(|e| NodeId::from(e.target()))
                .collect();
            kids.sort_by_key(|k| std::cmp::Reverse(self.created_of(*k)));
            stack.extend(kids);
        }
        out
    }

    /// The procedure definition enclosing `id`, if any.
    pub fn enclosing_procedure(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            if self
                .node(current)
                .is_some_and(|n| n.kind == BlockKind::ProcedureDef)
            {
                return Some(current);
            }
            current = self.parent(current)?.0;
        }
    }

    /// Procedure definition blocks in creation order.
    pub fn procedure_definitions(&self) -> Vec<NodeId> {
        self.ids_of_category(NodeCategory::ProcedureDef)
    }

    /// Procedure call blocks in creation order.
    pub fn procedure_calls(&self) -> Vec<NodeId> {
        self.ids_of_category(NodeCategory::ProcedureCall)
    }

    fn ids_of_category(&self, category: NodeCategory) -> Vec<NodeId> {
        self.node_ids()
            .into_iter()
            .filter(|id| self.node(*id).is_some_and(|n| n.kind.category() == category))
            .collect()
    }

    fn created_of(&self, id: NodeId) -> u64 {
        self.node(id).map(|n| n.created).unwrap_or(u64::MAX)
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Adds a detached block, stamping its creation sequence.
    pub fn add_node(&mut self, mut node: ProgramNode) -> NodeId {
        node.created = self.next_created;
        self.next_created += 1;
        NodeId::from(self.graph.add_node(node))
    }

    /// Appends `child` at the end of `slot_name` under `parent`.
    pub fn attach(&mut self, parent: NodeId, slot_name: &str, child: NodeId) -> Result<(), CoreError> {
        let position = self
            .graph
            .edges_directed(parent.into(), Direction::Outgoing)
            .filter(|e| e.weight().slot == slot_name)
            .map(|e| e.weight().position + 1)
            .max()
            .unwrap_or(0);
        self.attach_at(parent, slot_name, position, child)
    }

    /// Places `child` in `slot_name` under `parent` at `position`.
    ///
    /// Rejects attachments that would give the child two parents or make a
    /// block its own ancestor.
    pub fn attach_at(
        &mut self,
        parent: NodeId,
        slot_name: &str,
        position: u32,
        child: NodeId,
    ) -> Result<(), CoreError> {
        if !self.contains(parent) {
            return Err(CoreError::NodeNotFound { id: parent });
        }
        if !self.contains(child) {
            return Err(CoreError::NodeNotFound { id: child });
        }
        if self.parent(child).is_some() {
            return Err(CoreError::AlreadyAttached { child });
        }
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == child {
                return Err(CoreError::CycleDetected { parent, child });
            }
            cursor = self.parent(current).map(|(p, _)| p);
        }
        self.graph.add_edge(
            parent.into(),
            child.into(),
            SlotEdge {
                slot: slot_name.to_string(),
                position,
            },
        );
        Ok(())
    }

    /// Detaches `child` from its parent, making it a root.
    pub fn detach(&mut self, child: NodeId) -> Result<(), CoreError> {
        if !self.contains(child) {
            return Err(CoreError::NodeNotFound { id: child });
        }
        let incoming: Vec<_> = self
            .graph
            .edges_directed(child.into(), Direction::Incoming)
            .map(|e| e.id())
            .collect();
        for edge in incoming {
            self.graph.remove_edge(edge);
        }
        Ok(())
    }

    /// Removes `id` and every block below it. Returns the removed ids.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, CoreError> {
        if !self.contains(id) {
            return Err(CoreError::NodeNotFound { id });
        }
        let doomed = self.subtree(id);
        for node in &doomed {
            let idx: NodeIndex<u32> = (*node).into();
            self.graph.remove_node(idx);
        }
        Ok(doomed)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Reports blocks whose slots violate their kind's arity contract.
    ///
    /// Never fails: the compiler substitutes safe defaults for every problem
    /// listed here.
    pub fn validate(&self) -> Vec<GraphDiagnostic> {
        let mut out = Vec::new();
        for id in self.node_ids() {
            let Some(node) = self.node(id) else { continue };
            for required in node.kind.value_slots() {
                if self.child(id, required).is_none() {
                    out.push(GraphDiagnostic {
                        node: id,
                        message: format!("{} is missing value slot {}", node.label(), required),
                    });
                }
            }
            for name in self.slot_names(id) {
                let kids = self.children(id, &name);
                let holds_statements = node.kind.statement_slots().contains(&name.as_str())
                    || name == slot::ELSE
                    || (node.kind == BlockKind::If && name.starts_with("DO"));
                for kid in &kids {
                    let Some(kid_node) = self.node(*kid) else { continue };
                    if holds_statements == kid_node.kind.is_expression() {
                        out.push(GraphDiagnostic {
                            node: *kid,
                            message: format!(
                                "{} does not fit slot {} of {}",
                                kid_node.label(),
                                name,
                                node.label()
                            ),
                        });
                    }
                }
                if !holds_statements && kids.len() > 1 {
                    out.push(GraphDiagnostic {
                        node: id,
                        message: format!("{} holds {} values in slot {}", node.label(), kids.len(), name),
                    });
                }
            }
            if node.kind == BlockKind::ProcedureDef
                && node.procedure_name().map_or(true, |n| n.trim().is_empty())
            {
                out.push(GraphDiagnostic {
                    node: id,
                    message: format!("{} has no name", node.label()),
                });
            }
        }
        out
    }
}
