//! Outcome state machine for one run.
//!
//! ```text
//! Running -> EvaluatingVictory -> Success -> FinalizingVisualization -> ScoringDone -> Completed
//!                              \-> Failure -> GameOver
//! ```
//!
//! `Completed` and `GameOver` are terminal. Every step between them is
//! bounded: playback waits carry a timeout, effects are capped by the scene,
//! and errors while flushing or waiting are logged and skipped.

use std::fmt;

use blockquest_core::{ComplexityClass, LevelContext};
use blockquest_replay::ReplayHub;
use blockquest_runtime::{Effect, EffectKind, PureProgram, RunReport, RuntimeError, SceneHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::OutcomeConfig;
use crate::error::OutcomeError;
use crate::score::{calculate_score, FinalState, ScoreReport};
use crate::victory::{check_victory_conditions, effective_conditions, VictoryReport};

/// Identifies one run in logs and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeState {
    Running,
    EvaluatingVictory,
    Success,
    Failure,
    FinalizingVisualization,
    ScoringDone,
    Completed,
    GameOver,
}

impl OutcomeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, OutcomeState::Completed | OutcomeState::GameOver)
    }

    pub fn can_transition_to(self, next: OutcomeState) -> bool {
        use OutcomeState::*;
        matches!(
            (self, next),
            (Running, EvaluatingVictory)
                | (EvaluatingVictory, Success)
                | (EvaluatingVictory, Failure)
                | (Success, FinalizingVisualization)
                | (FinalizingVisualization, ScoringDone)
                | (ScoringDone, Completed)
                | (Failure, GameOver)
        )
    }
}

/// Why a run ended in `GameOver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The agent survived but the victory conditions were not met.
    ConditionsUnmet,
    /// The agent ran out of lives during the run.
    AgentDefeated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Completed {
        victory: VictoryReport,
        score: ScoreReport,
    },
    GameOver {
        reason: FailureReason,
        victory: VictoryReport,
        /// Always the zero baseline.
        score: ScoreReport,
    },
}

impl Outcome {
    pub fn victory(&self) -> &VictoryReport {
        match self {
            Outcome::Completed { victory, .. } | Outcome::GameOver { victory, .. } => victory,
        }
    }

    pub fn score(&self) -> &ScoreReport {
        match self {
            Outcome::Completed { score, .. } | Outcome::GameOver { score, .. } => score,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed { .. })
    }
}

/// Final report of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub run_id: RunId,
    pub outcome: Outcome,
    /// Every state visited, starting at `Running`.
    pub history: Vec<OutcomeState>,
}

/// Inputs to [`OutcomeOrchestrator::finish`].
pub struct RunFinish<'a> {
    pub level: &'a LevelContext,
    pub run: &'a RunReport,
    /// Pure compilation of the same program, for function tests.
    pub program: Option<&'a PureProgram>,
    /// Replay buffers to drain before scoring.
    pub replay: Option<&'a ReplayHub>,
    pub scene: Option<&'a dyn SceneHandle>,
    pub hint_usage: u32,
    pub block_count: usize,
    pub complexity: Option<ComplexityClass>,
    /// Overrides the level's complexity target.
    pub target_complexity: Option<ComplexityClass>,
}

/// Drives one run from the end of execution to a terminal state.
#[derive(Debug)]
pub struct OutcomeOrchestrator {
    run_id: RunId,
    state: OutcomeState,
    history: Vec<OutcomeState>,
    config: OutcomeConfig,
}

impl OutcomeOrchestrator {
    pub fn new(config: OutcomeConfig) -> Self {
        OutcomeOrchestrator {
            run_id: RunId::new(),
            state: OutcomeState::Running,
            history: vec![OutcomeState::Running],
            config,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn state(&self) -> OutcomeState {
        self.state
    }

    pub fn history(&self) -> &[OutcomeState] {
        &self.history
    }

    fn transition(&mut self, next: OutcomeState) -> Result<(), OutcomeError> {
        if !self.state.can_transition_to(next) {
            return Err(OutcomeError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(run = %self.run_id, from = ?self.state, to = ?next, "outcome transition");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn report(&self, outcome: Outcome) -> OutcomeReport {
        OutcomeReport {
            run_id: self.run_id,
            outcome,
            history: self.history.clone(),
        }
    }

    /// Evaluates the finished run and walks the machine to a terminal state.
    ///
    /// Fails only when called a second time.
    pub async fn finish(&mut self, input: RunFinish<'_>) -> Result<OutcomeReport, OutcomeError> {
        if self.state != OutcomeState::Running {
            return Err(OutcomeError::AlreadyFinished { state: self.state });
        }
        self.transition(OutcomeState::EvaluatingVictory)?;

        let conditions = effective_conditions(input.level);
        let victory = check_victory_conditions(&conditions, input.level, input.run, input.program, &self.config);
        let defeated =
            input.run.world.is_defeated() || input.run.error == Some(RuntimeError::AgentDefeated);

        if defeated || !victory.completed {
            self.transition(OutcomeState::Failure)?;
            let reason = if defeated {
                FailureReason::AgentDefeated
            } else {
                FailureReason::ConditionsUnmet
            };
            self.transition(OutcomeState::GameOver)?;
            info!(run = %self.run_id, ?reason, hint = %victory.message, "game over");
            return Ok(self.report(Outcome::GameOver {
                reason,
                victory,
                score: ScoreReport::game_over(),
            }));
        }

        self.transition(OutcomeState::Success)?;
        self.transition(OutcomeState::FinalizingVisualization)?;
        if let Some(hub) = input.replay {
            finalize_visualization(hub, &self.config).await;
        }
        if let Some(scene) = input.scene.filter(|s| s.is_alive()) {
            scene
                .play_effect(Effect {
                    kind: EffectKind::Celebrate,
                    target: input.run.world.agent_node.clone(),
                    duration: self.config.celebrate(),
                })
                .await;
        }

        let state = FinalState {
            world: input.run.world.clone(),
            block_count: input.block_count,
            complexity: input.complexity,
        };
        let test_bonus = victory.tests_passed as i64 * self.config.test_bonus_per_test;
        let score = calculate_score(
            &state,
            input.level,
            input.hint_usage,
            input.target_complexity,
            test_bonus,
            &self.config,
        );
        self.transition(OutcomeState::ScoringDone)?;
        self.transition(OutcomeState::Completed)?;
        info!(run = %self.run_id, score = score.total_score, stars = score.stars, "level completed");
        Ok(self.report(Outcome::Completed { victory, score }))
    }
}

/// Flushes and drains every replay buffer. Never fails; unfinished
/// buffers are logged.
async fn finalize_visualization(hub: &ReplayHub, config: &OutcomeConfig) {
    for (id, _) in hub.buffers() {
        if let Err(err) = hub.flush_steps_now(id) {
            warn!(buffer = %id, %err, "flush before finalizing failed");
        }
    }
    for (id, done) in hub.wait_for_all(config.wait).await {
        if !done {
            warn!(buffer = %id, "playback did not finish, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_listed_transitions_are_allowed() {
        use OutcomeState::*;
        assert!(Running.can_transition_to(EvaluatingVictory));
        assert!(!Running.can_transition_to(Completed));
        assert!(!Failure.can_transition_to(Completed));
        assert!(!Success.can_transition_to(GameOver));
        assert!(!Completed.can_transition_to(Running));
        assert!(!GameOver.can_transition_to(EvaluatingVictory));
        assert!(Completed.is_terminal() && GameOver.is_terminal());
        assert!(!ScoringDone.is_terminal());
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
        assert!(RunId::new().to_string().starts_with("run-"));
    }
}
