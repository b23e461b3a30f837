//! Whatever shape a block graph is in, both compilations of it parse.

use blockquest_codegen::{compile, GenerationMode};
use blockquest_core::node::{
    field, ArithOp, BlockKind, CompareOp, FieldValue, FlowKind, LogicOp, LoopMode, MinMaxOp,
    ProgramNode, Sensor,
};
use blockquest_core::{resolve_bindings, BlockGraph};
use blockquest_runtime::parser::parse_program;
use proptest::prelude::*;

const KINDS: &[BlockKind] = &[
    BlockKind::Number,
    BlockKind::Text,
    BlockKind::Boolean,
    BlockKind::Null,
    BlockKind::VariableGet,
    BlockKind::Arithmetic { op: ArithOp::Modulo },
    BlockKind::Arithmetic { op: ArithOp::Power },
    BlockKind::Compare { op: CompareOp::Lte },
    BlockKind::Logic { op: LogicOp::Or },
    BlockKind::Negate,
    BlockKind::MinMax { op: MinMaxOp::Max },
    BlockKind::ListCreate,
    BlockKind::ListGet,
    BlockKind::ListLength,
    BlockKind::ListContains,
    BlockKind::AlgorithmInput,
    BlockKind::Sensor { sensor: Sensor::Neighbors },
    BlockKind::Sensor { sensor: Sensor::AtGoal },
    BlockKind::VariableSet,
    BlockKind::VariableChange,
    BlockKind::ListSet,
    BlockKind::ListPush,
    BlockKind::MoveTo,
    BlockKind::Collect,
    BlockKind::TableUpdate,
    BlockKind::FrontierPush,
    BlockKind::FrontierSelect,
    BlockKind::ProcedureReturn,
    BlockKind::If,
    BlockKind::WhileUntil { mode: LoopMode::Until },
    BlockKind::Repeat,
    BlockKind::ForRange,
    BlockKind::ForEach,
    BlockKind::FlowControl { flow: FlowKind::Break },
    BlockKind::FlowControl { flow: FlowKind::Continue },
    BlockKind::ProcedureDef,
    BlockKind::ProcedureDef,
    BlockKind::ProcedureCall,
    BlockKind::ProcedureCall,
];

const SLOTS: &[&str] = &[
    "A", "B", "BOOL", "VALUE", "DELTA", "LIST", "INDEX", "ITEM", "ITEM0", "ITEM2", "NODE", "ROW",
    "COL", "PRIORITY", "DO", "ELSE", "TIMES", "FROM", "TO", "BY", "STACK", "RETURN", "IF0", "DO0",
    "IF1", "DO1", "ARG0", "ARG1",
];

const NAMES: &[&str] = &[
    "walk", "Walk", "", "unnamed", "do something", "best path", "knapsack", "DFS", "input", "line\nbreak",
];
const VARS: &[&str] = &["x", "best value", "a b", "a_b", "2nd", "input", "item", ""];
const NUMBERS: &[f64] = &[0.0, 1.0, -2.0, 0.5, 1e20, -0.0, f64::NAN, 3.0];
const TEXTS: &[&str] = &["B", "say \"hi\"\n", "", "\u{1}tab\t"];

type BlockSpec = (usize, Option<usize>, usize, usize);

fn build(blocks: &[BlockSpec]) -> BlockGraph {
    let mut graph = BlockGraph::new();
    let mut ids = Vec::new();
    for (kind, parent, slot_idx, pick) in blocks {
        let node = ProgramNode::new(KINDS[*kind])
            .with_text(field::NAME, NAMES[pick % NAMES.len()])
            .with_text(field::VAR, VARS[pick % VARS.len()])
            .with_text(field::TEXT, TEXTS[pick % TEXTS.len()])
            .with_field(field::NUM, FieldValue::Number(NUMBERS[pick % NUMBERS.len()]))
            .with_params(VARS.iter().copied().take(pick % 3));
        let id = graph.add_node(node);
        if let Some(p) = parent.filter(|_| !ids.is_empty()) {
            let _ = graph.attach(ids[p % ids.len()], SLOTS[*slot_idx], id);
        }
        ids.push(id);
    }
    graph
}

fn assert_parses(graph: &BlockGraph) -> Result<(), TestCaseError> {
    for mode in [GenerationMode::Instrumented, GenerationMode::Pure] {
        let source = compile(graph, mode);
        let parsed = parse_program(&source.text);
        prop_assert!(parsed.is_ok(), "{:?}\n{}", parsed.err(), source.text);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn malformed_graphs_compile_to_parsable_source(
        blocks in prop::collection::vec(
            (0..KINDS.len(), any::<Option<usize>>(), 0..SLOTS.len(), any::<usize>()),
            1..32,
        ),
    ) {
        let mut graph = build(&blocks);
        assert_parses(&graph)?;
        resolve_bindings(&mut graph);
        assert_parses(&graph)?;
    }
}

#[test]
fn number_in_a_list_slot_still_parses() {
    let mut graph = BlockGraph::new();
    let push = graph.add_node(ProgramNode::new(BlockKind::ListPush));
    let zero = graph.add_node(ProgramNode::new(BlockKind::Number).with_field(field::NUM, FieldValue::Number(0.0)));
    graph.attach(push, "LIST", zero).unwrap();
    let set = graph.add_node(ProgramNode::new(BlockKind::VariableSet).with_text(field::VAR, "n"));
    let len = graph.add_node(ProgramNode::new(BlockKind::ListLength));
    let half = graph.add_node(ProgramNode::new(BlockKind::Number).with_field(field::NUM, FieldValue::Number(2.5)));
    graph.attach(len, "VALUE", half).unwrap();
    graph.attach(set, "VALUE", len).unwrap();

    let source = compile(&graph, GenerationMode::Pure);
    assert!(source.text.contains("(0).push(null);"));
    assert!(source.text.contains("n = (2.5).length;"));
    parse_program(&source.text).unwrap();
}
