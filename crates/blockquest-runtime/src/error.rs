//! Runtime error types for the script interpreter.
//!
//! Only structural failures are errors. Domain problems (bad operands, an
//! index past the end of a list, an invalid move) are recovered inside the
//! interpreter or host with a neutral value and a `warn!`, so one bad block
//! does not end the run.

use serde::{Deserialize, Serialize};

/// Errors that abort a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum RuntimeError {
    #[error("parse error at {line}:{col}: {message}")]
    Parse {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("call to undefined function {name:?}")]
    UndefinedFunction { name: String },

    #[error("value is not callable: {description}")]
    NotCallable { description: String },

    #[error("unknown host call {receiver}.{method}")]
    UnknownHostCall { receiver: String, method: String },

    #[error("step budget ({limit}) exhausted")]
    StepLimitExceeded { limit: u64 },

    #[error("call depth limit ({limit}) exceeded in {function}")]
    CallDepthExceeded { function: String, limit: usize },

    /// A host call reached a host that cannot perform it, such as a domain
    /// operation during Pure evaluation.
    #[error("host call {call} not available: {reason}")]
    HostUnavailable { call: String, reason: String },

    /// Pure evaluation tried to suspend.
    #[error("pure evaluation suspended")]
    Suspended,

    /// The agent ran out of lives.
    #[error("agent defeated")]
    AgentDefeated,

    /// The run was stopped from outside or its scene went away.
    #[error("run stopped")]
    Stopped,
}
