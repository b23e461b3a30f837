//! Score and star rating for a completed level.

use blockquest_core::{ComplexityClass, LevelContext, ObjectiveKind, SecondaryObjective};
use blockquest_runtime::WorldState;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OutcomeConfig;

/// Everything scoring looks at besides the level itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalState {
    pub world: WorldState,
    /// Blocks in the submitted program.
    pub block_count: usize,
    /// Static complexity estimate of the program, when one was computed.
    pub complexity: Option<ComplexityClass>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveResult {
    pub description: String,
    pub met: bool,
    /// Points awarded (zero when not met).
    pub awarded: i64,
}

/// Score breakdown, term by term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBonus {
    pub objectives: i64,
    pub complexity: i64,
    /// Subtracted from the total; always non-negative.
    pub hint_penalty: i64,
    pub tests: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub total_score: i64,
    /// 1 to 3.
    pub stars: u8,
    pub bonus: ScoreBonus,
    pub objectives: Vec<ObjectiveResult>,
    /// `None` when the level sets no complexity target.
    pub complexity_matched: Option<bool>,
}

impl ScoreReport {
    /// The zero-score report of a lost level.
    pub fn game_over() -> Self {
        ScoreReport {
            total_score: 0,
            stars: 0,
            ..ScoreReport::default()
        }
    }
}

fn describe(kind: &ObjectiveKind) -> String {
    match kind {
        ObjectiveKind::MaxMoves { limit } => format!("finish in at most {limit} moves"),
        ObjectiveKind::MaxBlocks { limit } => format!("use at most {limit} blocks"),
        ObjectiveKind::CollectItem { item } => format!("collect the {item}"),
    }
}

fn objective(objective: &SecondaryObjective, state: &FinalState) -> ObjectiveResult {
    let met = match &objective.kind {
        ObjectiveKind::MaxMoves { limit } => state.world.moves <= *limit,
        ObjectiveKind::MaxBlocks { limit } => state.block_count <= *limit,
        ObjectiveKind::CollectItem { item } => state.world.collected.iter().any(|c| c == item),
    };
    ObjectiveResult {
        description: describe(&objective.kind),
        met,
        awarded: if met { i64::from(objective.bonus) } else { 0 },
    }
}

/// Scores a won level.
///
/// `target_complexity` overrides the level's own target when given.
/// `test_bonus` is added as is.
pub fn calculate_score(
    state: &FinalState,
    level: &LevelContext,
    hint_usage: u32,
    target_complexity: Option<ComplexityClass>,
    test_bonus: i64,
    config: &OutcomeConfig,
) -> ScoreReport {
    let objectives: Vec<ObjectiveResult> = level
        .secondary_objectives
        .iter()
        .map(|o| objective(o, state))
        .collect();

    let complexity_matched = match (target_complexity.or(level.target_complexity), state.complexity) {
        (None, _) => None,
        (Some(target), Some(actual)) => Some(actual <= target),
        (Some(target), None) => {
            warn!(%target, "no complexity estimate, complexity bonus skipped");
            Some(false)
        }
    };

    let bonus = ScoreBonus {
        objectives: objectives.iter().map(|o| o.awarded).sum(),
        complexity: if complexity_matched == Some(true) {
            config.complexity_bonus
        } else {
            0
        },
        hint_penalty: config.hint_penalty_for(hint_usage),
        tests: test_bonus,
    };
    let total_score =
        (config.base_score + bonus.objectives + bonus.complexity + bonus.tests - bonus.hint_penalty).max(0);
    let stars = 1 + u8::from(complexity_matched != Some(false)) + u8::from(hint_usage == 0);
    debug!(total_score, stars, ?bonus, "level scored");

    ScoreReport {
        total_score,
        stars,
        bonus,
        objectives,
        complexity_matched,
    }
}
