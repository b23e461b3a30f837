//! Evaluation of a level's victory conditions against a finished run.
//!
//! Each condition is evaluated on its own. A condition that cannot be
//! evaluated (no goal, no program, a predicate that fails to parse) is
//! logged and counted as unmet; the remaining conditions are still checked.

use std::borrow::Cow;

use blockquest_core::{LevelContext, VictoryConditionSpec};
use blockquest_runtime::value::normalize_json;
use blockquest_runtime::{evaluate_predicate, PureProgram, RunReport};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::OutcomeConfig;
use crate::error::OutcomeError;

/// Result of checking every condition of a level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VictoryReport {
    pub completed: bool,
    /// Player-facing summary: a success line or a hint naming what failed.
    pub message: String,
    /// Descriptions of the conditions that were not met.
    pub failed_conditions: Vec<String>,
    pub tests_passed: usize,
    pub tests_total: usize,
}

#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    total: usize,
}

/// Conditions to check: the level's own, or a default when it has none.
///
/// A level without conditions is won by reaching its goal, or by collecting
/// every item when it has no goal either.
pub fn effective_conditions(level: &LevelContext) -> Cow<'_, [VictoryConditionSpec]> {
    if !level.victory_conditions.is_empty() {
        return Cow::Borrowed(&level.victory_conditions);
    }
    let fallback = if level.goal.is_some() {
        VictoryConditionSpec::ReachGoalNode { node: None }
    } else {
        VictoryConditionSpec::AllItemsCollected
    };
    Cow::Owned(vec![fallback])
}

/// Checks `specs` against the final state of `run`.
///
/// `program` is the Pure compilation of the same graph; function tests
/// fail without it.
pub fn check_victory_conditions(
    specs: &[VictoryConditionSpec],
    level: &LevelContext,
    run: &RunReport,
    program: Option<&PureProgram>,
    config: &OutcomeConfig,
) -> VictoryReport {
    let mut tally = Tally::default();
    let mut failed = Vec::new();
    for spec in specs {
        let met = match evaluate(spec, level, run, program, config, &mut tally) {
            Ok(met) => met,
            Err(err) => {
                warn!(condition = %spec.describe(), %err, "condition could not be evaluated");
                false
            }
        };
        debug!(condition = %spec.describe(), met, "victory condition");
        if !met {
            failed.push(spec.describe());
        }
    }

    let completed = failed.is_empty();
    let message = if completed {
        "Level complete!".to_string()
    } else {
        format!("Not yet: {}.", failed.join("; "))
    };
    VictoryReport {
        completed,
        message,
        failed_conditions: failed,
        tests_passed: tally.passed,
        tests_total: tally.total,
    }
}

fn evaluate(
    spec: &VictoryConditionSpec,
    level: &LevelContext,
    run: &RunReport,
    program: Option<&PureProgram>,
    config: &OutcomeConfig,
    tally: &mut Tally,
) -> Result<bool, OutcomeError> {
    match spec {
        VictoryConditionSpec::AllItemsCollected => Ok(run.world.remaining_items.is_empty()),
        VictoryConditionSpec::ReachGoalNode { node } => {
            let goal = node.as_deref().or(level.goal.as_deref()).ok_or(OutcomeError::NoGoal)?;
            Ok(run.world.agent_node.as_deref() == Some(goal))
        }
        VictoryConditionSpec::FunctionReturnMatchesTests { procedure, tests } => {
            tally.total += tests.len();
            let program = program.ok_or_else(|| OutcomeError::NoProgram {
                procedure: procedure.clone(),
            })?;
            let mut passed = 0;
            for (index, test) in tests.iter().enumerate() {
                match program.call(procedure, &test.args, Some(level)) {
                    Ok(actual) if normalize_json(&actual) == normalize_json(&test.expected) => passed += 1,
                    Ok(actual) => {
                        debug!(procedure = %procedure, index, %actual, expected = %test.expected, "function test failed");
                    }
                    Err(err) => {
                        warn!(procedure = %procedure, index, %err, "function test errored");
                    }
                }
            }
            tally.passed += passed;
            Ok(!tests.is_empty() && passed == tests.len())
        }
        VictoryConditionSpec::CustomPredicate { expression, .. } => Ok(evaluate_predicate(
            expression,
            &run.globals,
            Some(level),
            &config.interpreter,
        )?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockquest_runtime::WorldState;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn level(conditions: serde_json::Value) -> LevelContext {
        serde_json::from_value(json!({
            "nodes": [{"id": "A"}, {"id": "B", "item": "gem"}],
            "edges": [{"from": "A", "to": "B"}],
            "start": "A",
            "goal": "B",
            "victory_conditions": conditions
        }))
        .unwrap()
    }

    fn run(agent: &str, remaining: &[(&str, &str)], globals: serde_json::Value) -> RunReport {
        let globals: BTreeMap<String, serde_json::Value> = serde_json::from_value(globals).unwrap();
        RunReport {
            world: WorldState {
                agent_node: Some(agent.to_string()),
                lives: 3,
                remaining_items: remaining
                    .iter()
                    .map(|(n, i)| (n.to_string(), i.to_string()))
                    .collect(),
                ..WorldState::default()
            },
            globals,
            error: None,
            steps: 10,
        }
    }

    #[test]
    fn reaching_goal_with_items_collected_wins() {
        let level = level(json!([{"type": "all_items_collected"}, {"type": "reach_goal_node"}]));
        let report = check_victory_conditions(
            &level.victory_conditions,
            &level,
            &run("B", &[], json!({})),
            None,
            &OutcomeConfig::default(),
        );
        assert!(report.completed);
        assert!(report.failed_conditions.is_empty());
    }

    #[test]
    fn failures_are_listed_in_the_hint() {
        let level = level(json!([{"type": "all_items_collected"}, {"type": "reach_goal_node", "node": "A"}]));
        let report = check_victory_conditions(
            &level.victory_conditions,
            &level,
            &run("B", &[("B", "gem")], json!({})),
            None,
            &OutcomeConfig::default(),
        );
        assert!(!report.completed);
        assert_eq!(report.failed_conditions, vec!["collect every item", "reach node A"]);
        assert_eq!(report.message, "Not yet: collect every item; reach node A.");
    }

    #[test]
    fn broken_conditions_count_as_unmet_without_stopping_the_rest() {
        let level = level(json!([
            {"type": "custom_predicate", "expression": "best >", "description": "find the best"},
            {"type": "function_return_matches_tests", "procedure": "knapsack",
             "tests": [{"args": [5], "expected": 9}]},
            {"type": "custom_predicate", "expression": "best == 9"}
        ]));
        let report = check_victory_conditions(
            &level.victory_conditions,
            &level,
            &run("A", &[], json!({"best": 9})),
            None,
            &OutcomeConfig::default(),
        );
        assert!(!report.completed);
        assert_eq!(
            report.failed_conditions,
            vec!["find the best", "make knapsack return the expected values"]
        );
        assert_eq!((report.tests_passed, report.tests_total), (0, 1));
    }

    #[test]
    fn levels_without_conditions_fall_back_to_goal_or_items() {
        let with_goal = level(json!([]));
        assert_eq!(
            effective_conditions(&with_goal).as_ref(),
            &[VictoryConditionSpec::ReachGoalNode { node: None }]
        );
        let mut no_goal = with_goal.clone();
        no_goal.goal = None;
        assert_eq!(
            effective_conditions(&no_goal).as_ref(),
            &[VictoryConditionSpec::AllItemsCollected]
        );
    }
}
