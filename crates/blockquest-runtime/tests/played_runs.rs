//! Compiles saved programs and runs them against the simulated world.

use std::sync::Arc;
use std::time::Duration;

use blockquest_codegen::{compile, GenerationMode};
use blockquest_core::{resolve_bindings, BlockDocument, BlockGraph, LevelContext};
use blockquest_replay::{ReplayConfig, ReplayHub, StepTarget, VisualizationKind, WaitOptions};
use blockquest_runtime::{
    run_program, GameHost, HeadlessScene, InterpreterConfig, PureProgram, RunControl, RuntimeError,
};
use serde_json::json;

const COLLECT_AND_FILL: &str = r#"{"blocks": [
    {"kind": "move_to", "inputs": {"NODE": {"kind": "text", "fields": {"TEXT": "B"}}}},
    {"kind": "collect"},
    {"kind": "for_range", "fields": {"VAR": "i"},
     "inputs": {"FROM": {"kind": "number", "fields": {"NUM": 0}},
                "TO": {"kind": "number", "fields": {"NUM": 3}},
                "BY": {"kind": "number", "fields": {"NUM": 1}},
                "DO": [{"kind": "table_update",
                        "inputs": {"ROW": {"kind": "number", "fields": {"NUM": 0}},
                                   "COL": {"kind": "variable_get", "fields": {"VAR": "i"}},
                                   "VALUE": {"kind": "variable_get", "fields": {"VAR": "i"}}}}]}}
]}"#;

const LARGER: &str = r#"{"blocks": [
    {"kind": "procedure_def", "fields": {"NAME": "Larger"}, "params": ["a", "b"],
     "inputs": {"RETURN": {"kind": "min_max", "op": "MAX",
        "inputs": {"A": {"kind": "variable_get", "fields": {"VAR": "a"}},
                   "B": {"kind": "variable_get", "fields": {"VAR": "b"}}}}}}
]}"#;

fn graph(text: &str) -> BlockGraph {
    let doc = BlockDocument::from_json_str(text).unwrap();
    let mut graph = BlockGraph::from_document(&doc).unwrap();
    resolve_bindings(&mut graph);
    graph
}

fn level() -> LevelContext {
    serde_json::from_value(json!({
        "nodes": [{"id": "A"}, {"id": "B", "item": "gem"}],
        "edges": [{"from": "A", "to": "B"}],
        "start": "A",
        "goal": "B"
    }))
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn played_run_moves_collects_and_records_steps() {
    let source = compile(&graph(COLLECT_AND_FILL), GenerationMode::Instrumented);
    let hub = Arc::new(ReplayHub::new(ReplayConfig {
        default_speed_ms: 10,
        ..ReplayConfig::default()
    }));
    let scene = HeadlessScene::new(["agent"]);
    let host = GameHost::new(level(), scene.clone(), RunControl::new())
        .with_replay(Arc::clone(&hub))
        .with_effect_duration(Duration::from_millis(20));

    let (report, _host) = run_program(&source, host, InterpreterConfig::default())
        .await
        .unwrap();
    assert!(report.finished(), "{:?}", report.error);
    assert_eq!(report.world.agent_node.as_deref(), Some("B"));
    assert_eq!(report.world.collected, vec!["gem"]);
    assert_eq!(report.globals["i"], json!(4));

    let table = hub.find(VisualizationKind::DpTable).unwrap();
    let settled = hub.wait_for_all(WaitOptions::default()).await;
    assert_eq!(settled, vec![(table, true)]);

    let steps = hub.recorder(table).unwrap().snapshot();
    let cols: Vec<_> = steps
        .steps
        .iter()
        .map(|s| match s.target {
            StepTarget::TableCell { col, .. } => col,
            StepTarget::Frontier { .. } => -1,
        })
        .collect();
    assert_eq!(cols, vec![0, 1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn stopping_ends_the_run() {
    let source = compile(&graph(COLLECT_AND_FILL), GenerationMode::Instrumented);
    let control = RunControl::new();
    control.stop();
    let host = GameHost::new(level(), HeadlessScene::new(["agent"]), control);
    let (report, _host) = run_program(&source, host, InterpreterConfig::default())
        .await
        .unwrap();
    assert_eq!(report.error, Some(RuntimeError::Stopped));
    assert_eq!(report.world.agent_node.as_deref(), Some("A"));
}

#[test]
fn pure_procedures_are_callable() {
    let source = compile(&graph(LARGER), GenerationMode::Pure);
    let program = PureProgram::new(source, InterpreterConfig::default()).unwrap();
    assert_eq!(program.call("Larger", &[json!(3), json!(8)], None).unwrap(), json!(8));
    assert_eq!(program.call("Larger", &[json!(-1), json!(-4)], None).unwrap(), json!(-1));
    assert!(matches!(
        program.call("Smaller", &[], None),
        Err(RuntimeError::UndefinedFunction { .. })
    ));
}

#[test]
fn instrumented_source_is_not_pure() {
    let source = compile(&graph(LARGER), GenerationMode::Instrumented);
    assert!(PureProgram::new(source, InterpreterConfig::default()).is_err());
}
