//! One complete play of a level: compile, run, decide.

use std::sync::Arc;
use std::time::Duration;

use blockquest_codegen::{compile, GenerationMode};
use blockquest_core::{estimate_complexity, BlockGraph, LevelContext};
use blockquest_replay::{ReplayConfig, ReplayHub};
use blockquest_runtime::{run_program, GameHost, InterpreterConfig, PureProgram, RunControl, SceneHandle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::OutcomeConfig;
use crate::error::OutcomeError;
use crate::orchestrator::{OutcomeOrchestrator, OutcomeReport, RunFinish};

/// Per-play settings outside scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayOptions {
    pub interpreter: InterpreterConfig,
    pub replay: ReplayConfig,
    /// Duration of each move or collect effect, in milliseconds.
    pub effect_ms: u64,
    pub hint_usage: u32,
}

impl Default for PlayOptions {
    fn default() -> Self {
        PlayOptions {
            interpreter: InterpreterConfig::default(),
            replay: ReplayConfig::default(),
            effect_ms: 250,
            hint_usage: 0,
        }
    }
}

/// Compiles `graph` in both modes, runs the instrumented program on
/// `scene` and drives the outcome to a terminal state.
///
/// The replay buffers of the run are disposed before returning. Only a
/// program that does not parse is an error.
pub async fn play_level(
    graph: &BlockGraph,
    level: &LevelContext,
    scene: Arc<dyn SceneHandle>,
    control: RunControl,
    options: &PlayOptions,
    config: &OutcomeConfig,
) -> Result<OutcomeReport, OutcomeError> {
    let mut orchestrator = OutcomeOrchestrator::new(config.clone());
    info!(run = %orchestrator.run_id(), level = %level.name, "play started");

    let instrumented = compile(graph, GenerationMode::Instrumented);
    let pure = match PureProgram::new(compile(graph, GenerationMode::Pure), config.interpreter.clone()) {
        Ok(program) => Some(program),
        Err(err) => {
            warn!(%err, "pure compilation unusable, function tests will fail");
            None
        }
    };

    let hub = Arc::new(ReplayHub::new(options.replay.clone()));
    let host = GameHost::new(level.clone(), Arc::clone(&scene), control)
        .with_replay(Arc::clone(&hub))
        .with_effect_duration(Duration::from_millis(options.effect_ms));
    let (run, _host) = match run_program(&instrumented, host, options.interpreter.clone()).await {
        Ok(done) => done,
        Err(err) => {
            hub.dispose();
            return Err(err.into());
        }
    };

    let report = orchestrator
        .finish(RunFinish {
            level,
            run: &run,
            program: pure.as_ref(),
            replay: Some(&hub),
            scene: Some(scene.as_ref()),
            hint_usage: options.hint_usage,
            block_count: graph.node_count(),
            complexity: Some(estimate_complexity(graph)),
            target_complexity: None,
        })
        .await;
    hub.dispose();
    report
}
