//! Step buffering, playback and completion gating for algorithm replays.
//!
//! A running program pushes [`StepRecord`]s much faster than anything can
//! animate them. This crate sits between the two: a [`StepRecorder`]
//! batches pushes into a bounded buffer, a [`PlaybackCursor`] task drains
//! the buffer at its own pace, and the [`CompletionGate`] lets the outcome
//! layer wait, with a timeout, until the cursor has caught up.
//!
//! # Modules
//!
//! - [`config`] -- Buffer capacity, timer intervals and wait bounds
//! - [`record`] -- Step records, targets and buffer snapshots
//! - [`recorder`] -- Staged pushes with coalesced flushes
//! - [`playback`] -- Cursor state and the cursor task
//! - [`gate`] -- Bounded wait with adaptive speed-up
//! - [`hub`] -- Per-run registry of buffers and cursors
//! - [`error`] -- Error type

pub mod config;
pub mod error;
pub mod gate;
pub mod hub;
pub mod playback;
pub mod record;
pub mod recorder;

pub use config::{ReplayConfig, WaitOptions};
pub use error::ReplayError;
pub use gate::{adjusted_speed_ms, CompletionGate};
pub use hub::ReplayHub;
pub use playback::{NullSink, PlaybackControl, PlaybackCursor, PlaybackState, StepSink};
pub use record::{BufferId, BufferSnapshot, StepRecord, StepTarget, VisualizationKind};
pub use recorder::StepRecorder;
