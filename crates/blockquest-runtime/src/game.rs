//! Instrumented execution against the simulated world.
//!
//! [`GameHost`] is the host of a played run: domain calls move the agent
//! and play scene effects, visualization calls feed step recorders of a
//! [`ReplayHub`]. Every call ends with a yield to the scheduler, so the
//! recorder flush timers and playback cursors make progress while the
//! program runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use blockquest_codegen::ProgramSource;
use blockquest_core::LevelContext;
use blockquest_replay::{ReplayHub, StepRecorder, StepTarget, VisualizationKind};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::RuntimeError;
use crate::host::{HostCall, RuntimeHost};
use crate::interp::{Interpreter, InterpreterConfig};
use crate::parser::parse_program;
use crate::scene::{Effect, EffectKind, SceneHandle};
use crate::value::Value;
use crate::world::{MoveOutcome, World, WorldState};

/// Shared stop flag for a run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    stopped: Arc<AtomicBool>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Host for a played run.
pub struct GameHost {
    world: World,
    scene: Arc<dyn SceneHandle>,
    control: RunControl,
    replay: Option<Arc<ReplayHub>>,
    recorders: HashMap<VisualizationKind, StepRecorder>,
    frontier: Vec<String>,
    effect_duration: Duration,
}

impl GameHost {
    pub fn new(level: LevelContext, scene: Arc<dyn SceneHandle>, control: RunControl) -> Self {
        GameHost {
            world: World::new(level),
            scene,
            control,
            replay: None,
            recorders: HashMap::new(),
            frontier: Vec::new(),
            effect_duration: Duration::from_millis(250),
        }
    }

    /// Records visualization calls into buffers of `hub`.
    pub fn with_replay(mut self, hub: Arc<ReplayHub>) -> Self {
        self.replay = Some(hub);
        self
    }

    pub fn with_effect_duration(mut self, duration: Duration) -> Self {
        self.effect_duration = duration;
        self
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn control(&self) -> &RunControl {
        &self.control
    }

    pub fn scene(&self) -> &Arc<dyn SceneHandle> {
        &self.scene
    }

    /// Frontier contents as the program last left them.
    pub fn frontier(&self) -> &[String] {
        &self.frontier
    }

    pub fn into_world(self) -> World {
        self.world
    }

    async fn effect(&self, kind: EffectKind, target: Option<String>) {
        self.scene
            .play_effect(Effect {
                kind,
                target,
                duration: self.effect_duration,
            })
            .await;
    }

    fn recorder(&mut self, kind: VisualizationKind) -> Option<StepRecorder> {
        if let Some(recorder) = self.recorders.get(&kind) {
            return Some(recorder.clone());
        }
        let hub = self.replay.as_ref()?;
        let recorder = match hub.ensure(kind).and_then(|id| hub.recorder(id)) {
            Ok(recorder) => recorder,
            Err(err) => {
                warn!(?kind, %err, "visualization step dropped");
                return None;
            }
        };
        self.recorders.insert(kind, recorder.clone());
        Some(recorder)
    }

    fn record(
        &mut self,
        kind: VisualizationKind,
        target: StepTarget,
        value: serde_json::Value,
        meta: Option<serde_json::Value>,
    ) {
        if let Some(recorder) = self.recorder(kind) {
            recorder.push(target, value, meta);
        }
    }

    async fn move_to(&mut self, node: &Value) -> Result<Value, RuntimeError> {
        let node = node.as_key();
        match self.world.move_to(&node) {
            MoveOutcome::Moved => {
                self.effect(EffectKind::Move, Some(node)).await;
                Ok(Value::Bool(true))
            }
            MoveOutcome::Invalid => {
                warn!(%node, lives = self.world.state().lives, "invalid move");
                self.effect(EffectKind::Hurt, self.world.state().agent_node.clone()).await;
                Ok(Value::Bool(false))
            }
            MoveOutcome::Defeated => {
                warn!(%node, "invalid move took the last life");
                self.effect(EffectKind::Hurt, self.world.state().agent_node.clone()).await;
                Err(RuntimeError::AgentDefeated)
            }
        }
    }

    fn table_coord(value: &Value, axis: &str) -> i64 {
        match value.as_number() {
            Some(n) if n.is_finite() => n.trunc() as i64,
            _ => {
                warn!(axis, %value, "table coordinate is not a number, using 0");
                0
            }
        }
    }

    async fn dispatch(&mut self, call: HostCall) -> Result<Value, RuntimeError> {
        match call {
            HostCall::MoveTo { node } => self.move_to(&node).await,
            HostCall::Collect => match self.world.collect() {
                Some(item) => {
                    self.effect(EffectKind::Collect, self.world.state().agent_node.clone()).await;
                    Ok(Value::text(item))
                }
                None => {
                    debug!("nothing to collect here");
                    Ok(Value::Null)
                }
            },
            HostCall::Sense { sensor: Some(sensor), .. } => Ok(Value::from_json(&self.world.sense(sensor))),
            HostCall::Sense { sensor: None, raw } => {
                warn!(sensor = %raw, "unknown sensor");
                Ok(Value::Null)
            }
            HostCall::TableSet { row, col, value } => {
                let target = StepTarget::TableCell {
                    row: Self::table_coord(&row, "row"),
                    col: Self::table_coord(&col, "col"),
                };
                self.record(VisualizationKind::DpTable, target, value.to_json(), None);
                Ok(Value::Null)
            }
            HostCall::FrontierPush { node, priority } => {
                let index = self.frontier.len();
                self.frontier.push(node.as_key());
                self.record(
                    VisualizationKind::Frontier,
                    StepTarget::Frontier { index },
                    node.to_json(),
                    Some(json!({"op": "push", "priority": priority.to_json()})),
                );
                Ok(Value::Null)
            }
            HostCall::FrontierSelect { node } => {
                let key = node.as_key();
                let index = match self.frontier.iter().position(|n| *n == key) {
                    Some(index) => {
                        self.frontier.remove(index);
                        index
                    }
                    None => {
                        warn!(node = %key, "selected node was never pushed");
                        self.frontier.len()
                    }
                };
                self.record(
                    VisualizationKind::Frontier,
                    StepTarget::Frontier { index },
                    node.to_json(),
                    Some(json!({"op": "select"})),
                );
                Ok(Value::Null)
            }
        }
    }
}

impl RuntimeHost for GameHost {
    fn input(&self, key: &str) -> Value {
        self.world
            .level()
            .input(key)
            .map_or(Value::Null, |json| Value::from_json(&json))
    }

    async fn perform(&mut self, call: HostCall) -> Result<Value, RuntimeError> {
        let result = self.dispatch(call).await;
        tokio::task::yield_now().await;
        result
    }

    fn is_stopped(&self) -> bool {
        self.control.is_stopped() || !self.scene.is_alive()
    }
}

/// What is left after a played run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub world: WorldState,
    /// Top-level variables at the end of the run.
    pub globals: BTreeMap<String, serde_json::Value>,
    /// Why the run ended early, if it did.
    pub error: Option<RuntimeError>,
    pub steps: u64,
}

impl RunReport {
    pub fn finished(&self) -> bool {
        self.error.is_none()
    }
}

/// Runs an instrumented program to its end (or first structural error).
///
/// Only a source that fails to parse is an `Err`; everything that happens
/// after the program started is reported in the [`RunReport`].
pub async fn run_program(
    source: &ProgramSource,
    host: GameHost,
    config: InterpreterConfig,
) -> Result<(RunReport, GameHost), RuntimeError> {
    let program = parse_program(&source.text)?;
    let mut interp = Interpreter::new(&program, host, config);
    info!(fingerprint = %source.fingerprint, "run started");
    let error = interp.run().await.err();
    match &error {
        Some(RuntimeError::Stopped) => info!("run stopped"),
        Some(err) => warn!(%err, "run ended early"),
        None => info!(steps = interp.steps(), "run finished"),
    }
    let globals = interp
        .globals()
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect();
    let steps = interp.steps();
    let host = interp.into_host();
    let report = RunReport {
        world: host.world().state().clone(),
        globals,
        error,
        steps,
    };
    Ok((report, host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::HeadlessScene;

    fn level() -> LevelContext {
        serde_json::from_value(json!({
            "nodes": [{"id": "A"}, {"id": "B", "item": "key"}],
            "edges": [{"from": "A", "to": "B"}],
            "start": "A",
            "lives": 1,
            "payload": {"target": "B"}
        }))
        .unwrap()
    }

    fn fixture() -> (GameHost, Arc<HeadlessScene>) {
        let scene = HeadlessScene::new(["agent"]);
        let host = GameHost::new(level(), scene.clone(), RunControl::new())
            .with_effect_duration(Duration::from_millis(10));
        (host, scene)
    }

    #[tokio::test(start_paused = true)]
    async fn domain_calls_drive_the_world() {
        let (mut host, scene) = fixture();
        assert_eq!(host.input("target"), Value::text("B"));
        let moved = host.perform(HostCall::MoveTo { node: Value::text("B") }).await.unwrap();
        assert_eq!(moved, Value::Bool(true));
        let item = host.perform(HostCall::Collect).await.unwrap();
        assert_eq!(item, Value::text("key"));
        let kinds: Vec<_> = scene.played().into_iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EffectKind::Move, EffectKind::Collect]);
    }

    #[tokio::test(start_paused = true)]
    async fn last_life_defeats_the_agent() {
        let (mut host, _scene) = fixture();
        let err = host.perform(HostCall::MoveTo { node: Value::text("Z") }).await.unwrap_err();
        assert_eq!(err, RuntimeError::AgentDefeated);
        assert!(host.world().state().is_defeated());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_scene_or_stop_flag_stops() {
        let (host, scene) = fixture();
        assert!(!host.is_stopped());
        scene.close();
        assert!(host.is_stopped());

        let (host, _scene) = fixture();
        host.control().stop();
        assert!(host.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn frontier_select_tracks_positions() {
        let (mut host, _scene) = fixture();
        for node in ["A", "B", "C"] {
            host.perform(HostCall::FrontierPush {
                node: Value::text(node),
                priority: Value::Number(1.0),
            })
            .await
            .unwrap();
        }
        host.perform(HostCall::FrontierSelect { node: Value::text("B") }).await.unwrap();
        assert_eq!(host.frontier(), ["A", "C"]);
    }
}
