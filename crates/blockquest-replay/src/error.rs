//! Replay error types.

use crate::record::BufferId;

/// Errors from the replay hub.
///
/// None of these is fatal to a run: the outcome layer logs them and
/// proceeds as if the wait had finished.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// No buffer with this id exists in the hub.
    #[error("unknown step buffer: {id}")]
    UnknownBuffer { id: BufferId },

    /// The hub was disposed; its buffers and cursors are gone.
    #[error("replay hub disposed")]
    Disposed,

    /// A cursor task needs a tokio runtime and none is running.
    #[error("no tokio runtime available to drive playback")]
    NoRuntime,
}
