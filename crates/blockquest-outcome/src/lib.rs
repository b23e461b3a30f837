//! Victory checks, scoring and the outcome state machine.
//!
//! When a run ends the [`OutcomeOrchestrator`] checks the level's victory
//! conditions against the final world, waits for any algorithm replay to
//! finish, plays a closing effect and scores the result. A lost level ends
//! in `GameOver` with a zero score and a hint naming what failed.
//!
//! # Modules
//!
//! - [`victory`] -- Victory condition evaluation
//! - [`score`] -- Score terms and star rating
//! - [`orchestrator`] -- Outcome state machine
//! - [`session`] -- Compile, run and decide in one call
//! - [`config`] -- Scoring constants and wait bounds
//! - [`error`] -- Error type

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod score;
pub mod session;
pub mod victory;

pub use config::OutcomeConfig;
pub use error::OutcomeError;
pub use orchestrator::{
    FailureReason, Outcome, OutcomeOrchestrator, OutcomeReport, OutcomeState, RunFinish, RunId,
};
pub use score::{calculate_score, FinalState, ObjectiveResult, ScoreBonus, ScoreReport};
pub use session::{play_level, PlayOptions};
pub use victory::{check_victory_conditions, effective_conditions, VictoryReport};
