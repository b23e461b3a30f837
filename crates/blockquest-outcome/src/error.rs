//! Error types for outcome evaluation.

use blockquest_runtime::RuntimeError;
use thiserror::Error;

use crate::orchestrator::OutcomeState;

/// Errors raised by victory checks and the orchestrator.
///
/// Victory checks never surface these to the player: a condition whose
/// evaluation fails is reported as unmet.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OutcomeError {
    #[error("illegal outcome transition {from:?} -> {to:?}")]
    InvalidTransition { from: OutcomeState, to: OutcomeState },

    #[error("outcome already decided ({state:?})")]
    AlreadyFinished { state: OutcomeState },

    #[error("no goal node to reach")]
    NoGoal,

    #[error("no pure program to test {procedure:?} against")]
    NoProgram { procedure: String },

    #[error("evaluation failed: {0}")]
    Runtime(#[from] RuntimeError),
}
