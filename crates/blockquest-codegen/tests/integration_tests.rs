//! End-to-end compiler tests over documents and generated graphs.

use blockquest_codegen::{compile, GenerationMode};
use blockquest_core::node::{field, slot, ArithOp, BlockKind, FieldValue, ProgramNode};
use blockquest_core::{resolve_bindings, BlockDocument, BlockGraph, NodeId};
use proptest::prelude::*;

fn number(graph: &mut BlockGraph, n: f64) -> NodeId {
    graph.add_node(ProgramNode::new(BlockKind::Number).with_field(field::NUM, FieldValue::Number(n)))
}

fn table_fill_program() -> BlockGraph {
    let mut graph = BlockGraph::new();
    let lp = graph.add_node(ProgramNode::new(BlockKind::ForRange).with_text(field::VAR, "i"));
    let from = number(&mut graph, 0.0);
    let to = number(&mut graph, 2.0);
    let by = number(&mut graph, 1.0);
    graph.attach(lp, slot::FROM, from).unwrap();
    graph.attach(lp, slot::TO, to).unwrap();
    graph.attach(lp, slot::BY, by).unwrap();

    let update = graph.add_node(ProgramNode::new(BlockKind::TableUpdate));
    let row = number(&mut graph, 0.0);
    let col = graph.add_node(ProgramNode::new(BlockKind::VariableGet).with_text(field::VAR, "i"));
    let mul = graph.add_node(ProgramNode::new(BlockKind::Arithmetic { op: ArithOp::Multiply }));
    let a = graph.add_node(ProgramNode::new(BlockKind::VariableGet).with_text(field::VAR, "i"));
    let b = number(&mut graph, 2.0);
    graph.attach(mul, slot::A, a).unwrap();
    graph.attach(mul, slot::B, b).unwrap();
    graph.attach(update, slot::ROW, row).unwrap();
    graph.attach(update, slot::COL, col).unwrap();
    graph.attach(update, slot::VALUE, mul).unwrap();
    graph.attach(lp, slot::DO, update).unwrap();
    graph
}

#[test]
fn table_fill_instrumented_snapshot() {
    let source = compile(&table_fill_program(), GenerationMode::Instrumented);
    assert!(source.diagnostics.is_empty());
    insta::assert_snapshot!(source.text.trim_end(), @r"
// blockquest program (instrumented)
let i = null;

for (i = 0; rangeContinues(i, 2, 1); i = i + 1) {
  await viz.tableSet(0, i, (i * 2));
}
");
}

#[test]
fn table_fill_pure_drops_visualization() {
    let source = compile(&table_fill_program(), GenerationMode::Pure);
    insta::assert_snapshot!(source.text.trim_end(), @r"
// blockquest program (pure)
let i = null;

for (i = 0; rangeContinues(i, 2, 1); i = i + 1) {
}
");
}

#[test]
fn resolved_document_compiles_calls_with_canonical_arity() {
    let doc = BlockDocument::from_json_str(
        r#"{"blocks": [
            {"kind": "procedure_def", "fields": {"NAME": "DFS"}, "params": ["graph", "start"],
             "inputs": {"RETURN": {"kind": "boolean", "fields": {"BOOL": "TRUE"}}}},
            {"kind": "variable_set", "fields": {"VAR": "found"},
             "inputs": {"VALUE": {"kind": "procedure_call", "fields": {"NAME": "unnamed"},
                "inputs": {"ARG0": {"kind": "algorithm_input", "fields": {"KEY": "graph"}}}}}}
        ]}"#,
    )
    .unwrap();
    let mut graph = BlockGraph::from_document(&doc).unwrap();
    resolve_bindings(&mut graph);

    let source = compile(&graph, GenerationMode::Instrumented);
    assert!(source.text.contains("async function DFS(graph, start) {"));
    assert!(source.text.contains("found = (await DFS(input(\"graph\"), null));"));
    assert!(source.text.contains("return true;"));
    assert!(!source.text.contains("return false;"));

    let pure = compile(&graph, GenerationMode::Pure);
    assert!(pure.text.contains("found = DFS(input(\"graph\"), null);"));
}

#[test]
fn unresolved_graph_still_compiles() {
    let mut graph = BlockGraph::new();
    graph.add_node(ProgramNode::new(BlockKind::ProcedureDef).with_text(field::NAME, "a"));
    graph.add_node(ProgramNode::new(BlockKind::ProcedureDef).with_text(field::NAME, "b"));
    graph.add_node(ProgramNode::new(BlockKind::ProcedureCall).with_text(field::NAME, "c"));
    graph.add_node(ProgramNode::new(BlockKind::FlowControl { flow: Default::default() }));

    let source = compile(&graph, GenerationMode::Instrumented);
    assert!(source.text.contains("// unresolved call: c"));
    assert!(source.text.contains("// break outside loop"));
    assert_eq!(source.diagnostics.len(), 2);
}

const KINDS: &[BlockKind] = &[
    BlockKind::Number,
    BlockKind::Text,
    BlockKind::VariableGet,
    BlockKind::Arithmetic { op: ArithOp::Add },
    BlockKind::ListCreate,
    BlockKind::VariableSet,
    BlockKind::MoveTo,
    BlockKind::Collect,
    BlockKind::TableUpdate,
    BlockKind::If,
    BlockKind::Repeat,
    BlockKind::ForEach,
    BlockKind::ProcedureDef,
    BlockKind::ProcedureCall,
];

const SLOTS: &[&str] = &["A", "B", "VALUE", "DO", "IF0", "DO0", "ELSE", "STACK", "ITEM0", "ARG0"];

proptest! {
    #[test]
    fn compile_is_deterministic(
        blocks in prop::collection::vec((0..KINDS.len(), any::<Option<usize>>(), 0..SLOTS.len()), 1..24),
        instrumented in any::<bool>(),
    ) {
        let mut graph = BlockGraph::new();
        let mut ids = Vec::new();
        for (i, (kind, parent, slot_idx)) in blocks.iter().enumerate() {
            let node = ProgramNode::new(KINDS[*kind])
                .with_text(field::NAME, if i % 2 == 0 { "walk" } else { "search" })
                .with_text(field::VAR, if i % 3 == 0 { "x" } else { "best value" })
                .with_field(field::NUM, FieldValue::Number(i as f64));
            let id = graph.add_node(node);
            if let Some(p) = parent.filter(|_| !ids.is_empty()) {
                let parent_id = ids[p % ids.len()];
                let _ = graph.attach(parent_id, SLOTS[*slot_idx], id);
            }
            ids.push(id);
        }
        let mode = if instrumented { GenerationMode::Instrumented } else { GenerationMode::Pure };

        let first = compile(&graph, mode);
        let second = compile(&graph.clone(), mode);
        prop_assert_eq!(&first.text, &second.text);
        prop_assert_eq!(&first.fingerprint, &second.fingerprint);
        prop_assert!(first.verify_fingerprint());
        if !instrumented {
            prop_assert!(!first.text.contains("await"));
        }
    }
}
