//! Scoring constants and orchestrator bounds.

use std::time::Duration;

use blockquest_replay::WaitOptions;
use blockquest_runtime::InterpreterConfig;
use serde::{Deserialize, Serialize};

/// Configuration for victory checks, scoring and finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeConfig {
    pub base_score: i64,
    /// Added when the program's estimated complexity is at or below the
    /// level's target.
    pub complexity_bonus: i64,
    pub hint_penalty: i64,
    pub hint_penalty_cap: i64,
    /// Awarded for each passing function test.
    pub test_bonus_per_test: i64,
    /// Bounds for the playback wait before scoring.
    pub wait: WaitOptions,
    /// Length of the closing celebration effect, in milliseconds.
    pub celebrate_ms: u64,
    /// Budget for Pure evaluation of function tests and predicates.
    pub interpreter: InterpreterConfig,
}

impl Default for OutcomeConfig {
    fn default() -> Self {
        OutcomeConfig {
            base_score: 1000,
            complexity_bonus: 200,
            hint_penalty: 50,
            hint_penalty_cap: 300,
            test_bonus_per_test: 25,
            wait: WaitOptions::default(),
            celebrate_ms: 1500,
            interpreter: InterpreterConfig {
                max_steps: 200_000,
                ..InterpreterConfig::default()
            },
        }
    }
}

impl OutcomeConfig {
    pub fn celebrate(&self) -> Duration {
        Duration::from_millis(self.celebrate_ms)
    }

    /// Penalty for `hints` used hints, capped.
    pub fn hint_penalty_for(&self, hints: u32) -> i64 {
        (i64::from(hints) * self.hint_penalty).min(self.hint_penalty_cap)
    }
}
