//! Program layout and the shared emitter state.
//!
//! A compiled program has three sections, always in this order:
//!
//! 1. global variable declarations (`let v = null;`, sorted by name),
//! 2. procedure definitions, in creation order of their canonical blocks,
//! 3. top-level statements, in creation order of their root blocks.
//!
//! Every iteration below runs over a sorted or creation-ordered sequence, so
//! the output is a pure function of the graph and the mode.

use std::collections::{BTreeSet, HashMap, HashSet};

use blockquest_core::node::{field, slot, BlockKind};
use blockquest_core::{BlockGraph, NodeCategory, NodeId, ProcedureBinding};
use tracing::debug;

use crate::helpers::{self, AlgorithmFamily};
use crate::ident::sanitize;
use crate::{
    fingerprint, CodegenError, CompileDiagnostic, CompileOptions, GenerationMode,
    ProcedureSignature, ProgramSource,
};

/// Compiles `graph` with default options. Never fails: problems are
/// repaired and listed in [`ProgramSource::diagnostics`].
pub fn compile(graph: &BlockGraph, mode: GenerationMode) -> ProgramSource {
    emit_program(graph, mode, &CompileOptions::default())
}

/// Compiles `graph` with explicit options.
///
/// Returns [`CodegenError::Rejected`] only when `deny_diagnostics` is set and
/// the graph needed repairs.
pub fn compile_with_options(
    graph: &BlockGraph,
    mode: GenerationMode,
    options: &CompileOptions,
) -> Result<ProgramSource, CodegenError> {
    let source = emit_program(graph, mode, options);
    if options.deny_diagnostics && !source.diagnostics.is_empty() {
        return Err(CodegenError::Rejected {
            count: source.diagnostics.len(),
            first: source.diagnostics[0].message.clone(),
            diagnostics: source.diagnostics,
        });
    }
    Ok(source)
}

/// Variable name stored on a block, with the editor's default.
pub(crate) fn var_name(graph: &BlockGraph, id: NodeId) -> String {
    graph
        .node(id)
        .and_then(|n| n.text(field::VAR))
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("item")
        .to_string()
}

// ---------------------------------------------------------------------------
// Emitter state
// ---------------------------------------------------------------------------

/// Mutable state of one traversal. Emission rules live in [`crate::emit`].
pub(crate) struct Emitter<'g> {
    pub(crate) graph: &'g BlockGraph,
    pub(crate) mode: GenerationMode,
    /// Authored procedure name -> emitted identifier.
    pub(crate) procedures: HashMap<String, String>,
    /// Authored global variable name -> emitted identifier.
    pub(crate) variables: HashMap<String, String>,
    pub(crate) bindings: HashMap<String, ProcedureBinding>,
    pub(crate) loop_depth: usize,
    pub(crate) repeat_depth: usize,
    pub(crate) in_procedure: bool,
    pub(crate) diagnostics: Vec<CompileDiagnostic>,
    indent_width: usize,
    depth: usize,
    out: String,
}

impl<'g> Emitter<'g> {
    fn new(graph: &'g BlockGraph, mode: GenerationMode, options: &CompileOptions) -> Self {
        Emitter {
            graph,
            mode,
            procedures: HashMap::new(),
            variables: HashMap::new(),
            bindings: HashMap::new(),
            loop_depth: 0,
            repeat_depth: 0,
            in_procedure: false,
            diagnostics: Vec::new(),
            indent_width: options.indent,
            depth: 0,
            out: String::new(),
        }
    }

    /// Writes one line at the current indentation.
    pub(crate) fn line(&mut self, text: &str) {
        for _ in 0..self.depth * self.indent_width {
            self.out.push(' ');
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    /// Writes `header {` and indents.
    pub(crate) fn open(&mut self, header: &str) {
        self.line(&format!("{header} {{"));
        self.depth += 1;
    }

    /// Dedents and writes `}`.
    pub(crate) fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.line("}");
    }

    /// Dedents, writes `} header {` and indents again.
    pub(crate) fn reopen(&mut self, header: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.line(&format!("}} {header} {{"));
        self.depth += 1;
    }

    pub(crate) fn diagnose(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        let message = message.into();
        debug!(node = ?node, %message, "compile diagnostic");
        self.diagnostics.push(CompileDiagnostic { node, message });
    }

    pub(crate) fn instrumented(&self) -> bool {
        self.mode == GenerationMode::Instrumented
    }

    /// Identifier of the variable block `id` reads or writes: the parameter
    /// of its procedure, or the global the name was assigned.
    pub(crate) fn var_ident(&self, id: NodeId) -> String {
        let name = var_name(self.graph, id);
        if is_param(self.graph, id, &name) {
            return sanitize(&name);
        }
        self.variables
            .get(&name)
            .cloned()
            .unwrap_or_else(|| sanitize(&name))
    }
}

fn is_param(graph: &BlockGraph, id: NodeId, name: &str) -> bool {
    graph
        .enclosing_procedure(id)
        .and_then(|def| graph.node(def))
        .is_some_and(|def| def.params.iter().any(|p| p == name))
}

// ---------------------------------------------------------------------------
// Program layout
// ---------------------------------------------------------------------------

fn emit_program(graph: &BlockGraph, mode: GenerationMode, options: &CompileOptions) -> ProgramSource {
    let mut em = Emitter::new(graph, mode, options);

    if options.include_validation {
        for diag in graph.validate() {
            em.diagnose(Some(diag.node), diag.message);
        }
    }

    let signatures = collect_procedures(&mut em);
    let globals = collect_globals(&mut em);

    if options.header_comment {
        let label = match mode {
            GenerationMode::Instrumented => "instrumented",
            GenerationMode::Pure => "pure",
        };
        em.line(&format!("// blockquest program ({label})"));
    }
    for name in &globals {
        em.line(&format!("let {name} = null;"));
    }

    for sig in &signatures {
        em.line("");
        emit_procedure(&mut em, sig);
    }

    let top_level: Vec<NodeId> = graph
        .roots()
        .into_iter()
        .filter(|id| {
            graph
                .node(*id)
                .is_some_and(|n| n.kind.category() != NodeCategory::ProcedureDef)
        })
        .collect();
    if !top_level.is_empty() {
        em.line("");
    }
    for root in top_level {
        if graph.node(root).is_some_and(|n| n.kind.is_expression()) {
            em.diagnose(Some(root), "detached expression block ignored");
            continue;
        }
        em.statement(root);
    }

    let text = em.out;
    debug!(
        mode = ?mode,
        procedures = signatures.len(),
        globals = globals.len(),
        diagnostics = em.diagnostics.len(),
        "compiled block graph"
    );
    ProgramSource {
        mode,
        fingerprint: fingerprint(&text),
        text,
        procedures: signatures,
        globals: globals.into_iter().collect(),
        diagnostics: em.diagnostics,
    }
}

/// Registers every canonical procedure and assigns collision-free
/// identifiers. Definitions that are not canonical (duplicates or
/// placeholders left by an unresolved graph) are reported and skipped.
fn collect_procedures(em: &mut Emitter<'_>) -> Vec<ProcedureSignature> {
    let graph = em.graph;
    let bindings = graph.procedure_bindings();
    let canonical: HashSet<NodeId> = bindings.iter().map(|b| b.definition).collect();
    for def in graph.procedure_definitions() {
        if !canonical.contains(&def) {
            em.diagnose(Some(def), "procedure definition is not canonical; skipped");
        }
    }

    let mut used = HashSet::new();
    let mut signatures = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let base = sanitize(&binding.name);
        let mut ident = base.clone();
        let mut n = 2;
        while !used.insert(ident.clone()) {
            ident = format!("{base}_{n}");
            n += 1;
        }
        let family = AlgorithmFamily::classify(
            &binding.name,
            graph.node(binding.definition).and_then(|d| d.text(field::FAMILY)),
        );
        em.procedures.insert(binding.name.clone(), ident.clone());
        signatures.push(ProcedureSignature {
            name: binding.name.clone(),
            ident,
            params: binding.parameters.iter().map(|p| sanitize(p)).collect(),
            family,
            definition: binding.definition,
        });
        em.bindings.insert(binding.name.clone(), binding);
    }
    signatures
}

/// Every variable name used outside a procedure's own parameter list,
/// mapped to a distinct identifier. Names that already are valid
/// identifiers keep them; other names that sanitize onto a taken identifier
/// get a `_2`, `_3`, ... suffix in name order.
fn collect_globals(em: &mut Emitter<'_>) -> BTreeSet<String> {
    let graph = em.graph;
    let mut names = BTreeSet::new();
    for id in graph.node_ids() {
        let Some(node) = graph.node(id) else { continue };
        let uses_var = matches!(
            node.kind,
            BlockKind::VariableGet
                | BlockKind::VariableSet
                | BlockKind::VariableChange
                | BlockKind::ForRange
                | BlockKind::ForEach
        );
        if !uses_var {
            continue;
        }
        let name = var_name(graph, id);
        if !is_param(graph, id, &name) {
            names.insert(name);
        }
    }

    let (exact, renamed): (Vec<String>, Vec<String>) =
        names.into_iter().partition(|name| sanitize(name) == *name);
    let mut globals = BTreeSet::new();
    for name in exact.into_iter().chain(renamed) {
        let base = sanitize(&name);
        let mut ident = base.clone();
        let mut n = 2;
        while !globals.insert(ident.clone()) {
            ident = format!("{base}_{n}");
            n += 1;
        }
        if ident != base {
            debug!(variable = %name, %ident, "renamed colliding variable");
        }
        em.variables.insert(name, ident);
    }
    globals
}

fn emit_procedure(em: &mut Emitter<'_>, sig: &ProcedureSignature) {
    let graph = em.graph;
    let def = sig.definition;
    let keyword = if em.instrumented() { "async function" } else { "function" };
    em.open(&format!("{keyword} {}({})", sig.ident, sig.params.join(", ")));
    em.in_procedure = true;

    if let Some(family) = sig.family {
        emit_helper_prologue(em, sig, family);
    }

    em.statements(def, slot::STACK);

    let has_return_slot = graph.child(def, slot::RETURN).is_some();
    if has_return_slot {
        let value = em.value(def, slot::RETURN);
        em.line(&format!("return {value};"));
    } else if em.mode == GenerationMode::Pure {
        if let Some(family) = sig.family {
            let returns_in_body = graph
                .subtree(def)
                .into_iter()
                .any(|id| graph.node(id).is_some_and(|n| n.kind == BlockKind::ProcedureReturn));
            if !returns_in_body {
                debug!(procedure = %sig.name, ?family, "falling back to family default return");
                em.line(&format!("return {};", family.fallback_return()));
            }
        }
    }

    em.in_procedure = false;
    em.close();
}

fn emit_helper_prologue(em: &mut Emitter<'_>, sig: &ProcedureSignature, family: AlgorithmFamily) {
    for expected in family.expected_params() {
        let bound = sig
            .params
            .iter()
            .find(|p| p.eq_ignore_ascii_case(expected.name));
        match bound {
            Some(ident) => {
                if let Some(guard) = helpers::guard(ident, *expected) {
                    em.line(&guard);
                }
            }
            None => {
                let ident = sanitize(expected.name);
                em.line(&format!("let {ident} = input(\"{}\");", expected.name));
            }
        }
    }
}
