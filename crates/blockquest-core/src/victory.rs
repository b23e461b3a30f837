//! Victory conditions and secondary objectives attached to a level.
//!
//! These are plain data; evaluation lives in `blockquest-outcome`.

use serde::{Deserialize, Serialize};

/// One condition the final world/algorithm state must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VictoryConditionSpec {
    /// Every item placed on the level has been collected.
    AllItemsCollected,
    /// The agent ends on `node` (the level goal when omitted).
    ReachGoalNode {
        #[serde(default)]
        node: Option<String>,
    },
    /// Calling `procedure` with each test's arguments returns its expected
    /// value when evaluated in Pure mode.
    FunctionReturnMatchesTests {
        procedure: String,
        #[serde(default)]
        tests: Vec<FunctionTestCase>,
    },
    /// A script expression over the program's final global variables.
    CustomPredicate {
        expression: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl VictoryConditionSpec {
    /// Short text used in hint messages when the condition fails.
    pub fn describe(&self) -> String {
        match self {
            VictoryConditionSpec::AllItemsCollected => "collect every item".to_string(),
            VictoryConditionSpec::ReachGoalNode { node: Some(node) } => format!("reach node {node}"),
            VictoryConditionSpec::ReachGoalNode { node: None } => "reach the goal".to_string(),
            VictoryConditionSpec::FunctionReturnMatchesTests { procedure, .. } => {
                format!("make {procedure} return the expected values")
            }
            VictoryConditionSpec::CustomPredicate {
                description: Some(text),
                ..
            } => text.clone(),
            VictoryConditionSpec::CustomPredicate { expression, .. } => {
                format!("satisfy {expression}")
            }
        }
    }
}

/// Arguments and expected return value for one function test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTestCase {
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    pub expected: serde_json::Value,
}

fn default_bonus() -> u32 {
    100
}

/// An optional objective that earns bonus points on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryObjective {
    #[serde(flatten)]
    pub kind: ObjectiveKind,
    #[serde(default = "default_bonus")]
    pub bonus: u32,
}

/// What a secondary objective asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectiveKind {
    /// Finish with at most `limit` moves.
    MaxMoves { limit: u32 },
    /// Solve with at most `limit` blocks.
    MaxBlocks { limit: usize },
    /// Collect a specific item.
    CollectItem { item: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conditions_deserialize_from_tagged_json() {
        let specs: Vec<VictoryConditionSpec> = serde_json::from_str(
            r#"[{"type": "all_items_collected"},
                {"type": "reach_goal_node"},
                {"type": "function_return_matches_tests", "procedure": "knapsack",
                 "tests": [{"args": [5], "expected": 9}]}]"#,
        )
        .unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[1], VictoryConditionSpec::ReachGoalNode { node: None });
        assert_eq!(specs[2].describe(), "make knapsack return the expected values");
    }

    #[test]
    fn objective_bonus_defaults() {
        let obj: SecondaryObjective =
            serde_json::from_str(r#"{"type": "max_moves", "limit": 4}"#).unwrap();
        assert_eq!(obj.kind, ObjectiveKind::MaxMoves { limit: 4 });
        assert_eq!(obj.bonus, 100);
    }
}
