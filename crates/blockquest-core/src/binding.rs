//! Procedure binding resolver.
//!
//! Call blocks reference definitions by name. After every structural edit the
//! editor runs [`resolve_bindings`], which repairs the graph in place so that
//! each call names exactly one live definition:
//!
//! 1. Definitions with a placeholder name are renamed to
//!    [`DEFAULT_PROCEDURE_NAME`] when no properly named definition exists,
//!    and disposed otherwise.
//! 2. Definitions sharing a name collapse onto one canonical definition: the
//!    one with the longest parameter list, oldest first on ties.
//! 3. Each call is matched by exact name, then case-insensitively, then by
//!    the single-definition rule. With no definitions at all it is pointed at
//!    the default name.
//! 4. A bound call receives a copy of its definition's parameter list.
//!
//! Resolution is synchronous and must finish before the next compile.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::graph::BlockGraph;
use crate::id::NodeId;
use crate::node::BlockKind;

/// Name given to a lone definition whose name is missing or a placeholder.
pub const DEFAULT_PROCEDURE_NAME: &str = "procedure";

const PLACEHOLDER_NAMES: &[&str] = &["unnamed", "undefined", "null", "do something"];

/// Returns `true` for names the editor produces before the user types one.
pub fn is_placeholder_name(name: Option<&str>) -> bool {
    let Some(name) = name else { return true };
    let trimmed = name.trim();
    trimmed.is_empty()
        || PLACEHOLDER_NAMES
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
}

/// The canonical definition a procedure name resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureBinding {
    pub name: String,
    /// Canonical parameter list, read from the definition's metadata.
    pub parameters: Vec<String>,
    pub definition: NodeId,
}

/// A call whose target name changed during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rebind {
    pub call: NodeId,
    pub from: String,
    pub to: String,
}

/// Everything [`resolve_bindings`] changed, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionReport {
    /// Placeholder definitions renamed to the default name.
    pub renamed: Vec<NodeId>,
    /// Duplicate or placeholder definitions removed with their bodies.
    pub disposed: Vec<NodeId>,
    pub rebound: Vec<Rebind>,
    /// Calls whose parameter list was replaced by their target's.
    pub params_copied: Vec<NodeId>,
    /// Calls left ambiguous between several definitions.
    pub unresolved: Vec<NodeId>,
}

impl ResolutionReport {
    /// Returns `true` if resolution left the graph untouched.
    pub fn is_noop(&self) -> bool {
        self.renamed.is_empty()
            && self.disposed.is_empty()
            && self.rebound.is_empty()
            && self.params_copied.is_empty()
            && self.unresolved.is_empty()
    }
}

impl BlockGraph {
    /// Bindings for every named definition, in creation order. When a name
    /// is defined twice (before resolution) the oldest definition wins.
    pub fn procedure_bindings(&self) -> Vec<ProcedureBinding> {
        let mut by_name: IndexMap<String, ProcedureBinding> = IndexMap::new();
        for def in self.procedure_definitions() {
            let Some(node) = self.node(def) else { continue };
            let Some(name) = node.procedure_name() else { continue };
            if is_placeholder_name(Some(name)) {
                continue;
            }
            by_name
                .entry(name.to_string())
                .or_insert_with(|| ProcedureBinding {
                    name: name.to_string(),
                    parameters: node.params.clone(),
                    definition: def,
                });
        }
        by_name.into_values().collect()
    }

    /// Looks up the binding for `name` (case-exact).
    pub fn binding(&self, name: &str) -> Option<ProcedureBinding> {
        self.procedure_bindings().into_iter().find(|b| b.name == name)
    }
}

/// Repairs procedure definitions and calls in place.
pub fn resolve_bindings(graph: &mut BlockGraph) -> ResolutionReport {
    let mut report = ResolutionReport::default();

    // -- placeholder definitions --
    let definitions = graph.procedure_definitions();
    let (placeholders, named): (Vec<NodeId>, Vec<NodeId>) = definitions
        .into_iter()
        .partition(|id| is_placeholder_name(graph.node(*id).and_then(|n| n.procedure_name())));

    if named.is_empty() {
        for def in placeholders {
            if let Some(node) = graph.node_mut(def) {
                node.set_procedure_name(DEFAULT_PROCEDURE_NAME);
                debug!(def = %def, "renamed placeholder procedure definition");
                report.renamed.push(def);
            }
        }
    } else {
        // A placeholder nested in another placeholder goes with its parent.
        for def in placeholders {
            if graph.contains(def) {
                dispose(graph, def, &mut report);
            }
        }
    }

    // -- duplicate definitions --
    let mut groups: IndexMap<String, Vec<NodeId>> = IndexMap::new();
    for def in graph.procedure_definitions() {
        if let Some(name) = graph.node(def).and_then(|n| n.procedure_name()) {
            groups.entry(name.to_string()).or_default().push(def);
        }
    }
    for (name, defs) in &groups {
        if defs.len() < 2 {
            continue;
        }
        let Some(canonical) = pick_canonical(graph, defs) else { continue };
        debug!(name = %name, canonical = %canonical, duplicates = defs.len() - 1, "collapsing duplicate definitions");
        for def in defs {
            if *def != canonical && graph.contains(*def) {
                dispose(graph, *def, &mut report);
            }
        }
    }

    // -- call sites --
    let bindings = graph.procedure_bindings();
    for call in graph.procedure_calls() {
        let current = graph
            .node(call)
            .and_then(|n| n.procedure_name())
            .unwrap_or_default()
            .to_string();

        let target = match_call(&bindings, &current);
        let new_name = match target {
            Some(binding) => binding.name.clone(),
            None if bindings.is_empty() => DEFAULT_PROCEDURE_NAME.to_string(),
            None => {
                debug!(call = %call, name = %current, "call matches none of several definitions");
                report.unresolved.push(call);
                continue;
            }
        };

        let Some(node) = graph.node_mut(call) else { continue };
        if new_name != current {
            node.set_procedure_name(&new_name);
            debug!(call = %call, from = %current, to = %new_name, "rebound procedure call");
            report.rebound.push(Rebind {
                call,
                from: current,
                to: new_name,
            });
        }
        if let Some(binding) = target {
            if node.params != binding.parameters {
                node.params = binding.parameters.clone();
                report.params_copied.push(call);
            }
        }
    }

    report
}

fn pick_canonical(graph: &BlockGraph, defs: &[NodeId]) -> Option<NodeId> {
    defs.iter()
        .filter_map(|id| graph.node(*id).map(|n| (*id, n.params.len(), n.created)))
        .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
        .map(|(id, _, _)| id)
}

fn match_call<'b>(bindings: &'b [ProcedureBinding], name: &str) -> Option<&'b ProcedureBinding> {
    if let Some(exact) = bindings.iter().find(|b| b.name == name) {
        return Some(exact);
    }
    let mut folded = bindings
        .iter()
        .filter(|b| b.name.eq_ignore_ascii_case(name.trim()));
    if let (Some(only), None) = (folded.next(), folded.next()) {
        return Some(only);
    }
    match bindings {
        [only] => Some(only),
        _ => None,
    }
}

fn dispose(graph: &mut BlockGraph, def: NodeId, report: &mut ResolutionReport) {
    debug_assert!(graph
        .node(def)
        .is_some_and(|n| n.kind == BlockKind::ProcedureDef));
    if let Ok(removed) = graph.remove_subtree(def) {
        debug!(def = %def, removed = removed.len(), "disposed procedure definition");
        report.disposed.push(def);
    }
}
