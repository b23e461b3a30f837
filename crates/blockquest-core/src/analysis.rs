//! Static complexity estimate of a block program.
//!
//! The estimate is structural: loop nesting depth across procedure calls,
//! with recursion detected on the call graph. A procedure that recurses
//! through more than one call site is treated as exponential; a single
//! recursive call site counts as one more loop level.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::graph::BlockGraph;
use crate::id::NodeId;
use crate::node::BlockKind;

/// Big-O class, ordered from cheapest to most expensive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComplexityClass {
    #[serde(rename = "O(1)")]
    Constant,
    #[serde(rename = "O(n)")]
    Linear,
    #[serde(rename = "O(n^2)")]
    Quadratic,
    #[serde(rename = "O(n^3)")]
    Cubic,
    #[serde(rename = "O(n^k)")]
    Polynomial,
    #[serde(rename = "O(2^n)")]
    Exponential,
}

impl ComplexityClass {
    /// Class for a given loop nesting depth.
    pub fn from_depth(depth: u32) -> Self {
        match depth {
            0 => ComplexityClass::Constant,
            1 => ComplexityClass::Linear,
            2 => ComplexityClass::Quadratic,
            3 => ComplexityClass::Cubic,
            _ => ComplexityClass::Polynomial,
        }
    }
}

impl fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ComplexityClass::Constant => "O(1)",
            ComplexityClass::Linear => "O(n)",
            ComplexityClass::Quadratic => "O(n^2)",
            ComplexityClass::Cubic => "O(n^3)",
            ComplexityClass::Polynomial => "O(n^k)",
            ComplexityClass::Exponential => "O(2^n)",
        };
        write!(f, "{text}")
    }
}

struct Estimator<'g> {
    graph: &'g BlockGraph,
    definitions: HashMap<String, NodeId>,
    /// Definition -> index of its strongly connected component.
    component: HashMap<NodeId, usize>,
    recursive: HashSet<NodeId>,
    memo: HashMap<NodeId, u32>,
    in_progress: HashSet<NodeId>,
    exponential: bool,
}

/// Estimates the complexity class of the whole program.
pub fn estimate_complexity(graph: &BlockGraph) -> ComplexityClass {
    let mut definitions = HashMap::new();
    for def in graph.procedure_definitions() {
        if let Some(name) = graph.node(def).and_then(|n| n.procedure_name()) {
            definitions.entry(name.to_string()).or_insert(def);
        }
    }

    let mut call_graph: DiGraph<NodeId, ()> = DiGraph::new();
    let mut index_of: HashMap<NodeId, NodeIndex> = HashMap::new();
    for def in definitions.values() {
        index_of.insert(*def, call_graph.add_node(*def));
    }
    let mut self_loops = HashSet::new();
    for call in graph.procedure_calls() {
        let (Some(caller), Some(target)) = (
            graph.enclosing_procedure(call),
            graph
                .node(call)
                .and_then(|n| n.procedure_name())
                .and_then(|name| definitions.get(name)),
        ) else {
            continue;
        };
        if caller == *target {
            self_loops.insert(caller);
        }
        if let (Some(&from), Some(&to)) = (index_of.get(&caller), index_of.get(target)) {
            call_graph.add_edge(from, to, ());
        }
    }

    let mut component = HashMap::new();
    let mut recursive = HashSet::new();
    for (i, scc) in tarjan_scc(&call_graph).into_iter().enumerate() {
        for idx in &scc {
            let def = call_graph[*idx];
            component.insert(def, i);
            if scc.len() > 1 || self_loops.contains(&def) {
                recursive.insert(def);
            }
        }
    }

    let mut estimator = Estimator {
        graph,
        definitions,
        component,
        recursive,
        memo: HashMap::new(),
        in_progress: HashSet::new(),
        exponential: false,
    };

    let depth = graph
        .roots()
        .into_iter()
        .map(|root| estimator.depth_of(root, None))
        .max()
        .unwrap_or(0);

    if estimator.exponential {
        ComplexityClass::Exponential
    } else {
        ComplexityClass::from_depth(depth)
    }
}

impl Estimator<'_> {
    fn procedure_depth(&mut self, def: NodeId) -> u32 {
        if let Some(depth) = self.memo.get(&def) {
            return *depth;
        }
        if !self.in_progress.insert(def) {
            return 0;
        }
        let body_depth = self.children_depth(def, Some(def));
        let depth = if self.recursive.contains(&def) {
            if self.recursive_call_sites(def) >= 2 {
                self.exponential = true;
            }
            body_depth + 1
        } else {
            body_depth
        };
        self.in_progress.remove(&def);
        self.memo.insert(def, depth);
        depth
    }

    fn recursive_call_sites(&self, def: NodeId) -> usize {
        let own = self.component.get(&def);
        self.graph
            .subtree(def)
            .into_iter()
            .filter(|id| {
                self.target_of(*id)
                    .is_some_and(|target| self.component.get(&target) == own)
            })
            .count()
    }

    fn target_of(&self, id: NodeId) -> Option<NodeId> {
        let node = self.graph.node(id)?;
        if node.kind != BlockKind::ProcedureCall {
            return None;
        }
        self.definitions.get(node.procedure_name()?).copied()
    }

    fn children_depth(&mut self, id: NodeId, within: Option<NodeId>) -> u32 {
        let mut deepest = 0;
        for slot_name in self.graph.slot_names(id) {
            for kid in self.graph.children(id, &slot_name) {
                deepest = deepest.max(self.depth_of(kid, within));
            }
        }
        deepest
    }

    fn depth_of(&mut self, id: NodeId, within: Option<NodeId>) -> u32 {
        let Some(node) = self.graph.node(id) else {
            return 0;
        };
        match node.kind {
            BlockKind::WhileUntil { .. }
            | BlockKind::Repeat
            | BlockKind::ForRange
            | BlockKind::ForEach => 1 + self.children_depth(id, within),
            BlockKind::ProcedureDef => self.procedure_depth(id),
            BlockKind::ProcedureCall => {
                let args = self.children_depth(id, within);
                let callee = match self.target_of(id) {
                    Some(target) if Some(target) != within => self.procedure_depth(target),
                    _ => 0,
                };
                args.max(callee)
            }
            _ => self.children_depth(id, within),
        }
    }
}
