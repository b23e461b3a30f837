//! Playback Cursor: a rate-limited consumer of one step buffer.
//!
//! [`PlaybackState`] is the plain data: a snapshot of the buffer plus a
//! cursor that always satisfies `0 <= cursor <= len`. [`PlaybackCursor`]
//! owns a tokio task that holds the only mutable copy of that state. The
//! task advances the cursor one record per `speed_ms` while playing, hands
//! each record to a [`StepSink`], and publishes a copy of the state after
//! every change.
//!
//! Nobody else moves the cursor. The Completion Gate may only *request*
//! play or a faster speed through [`PlaybackControl`].

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::record::{BufferId, BufferSnapshot, StepRecord};

/// Receives each record as the cursor passes it. The renderer stands
/// behind this in a full deployment.
pub trait StepSink: Send + Sync + 'static {
    fn on_step(&self, buffer: BufferId, record: &StepRecord);

    /// Called when the buffer was reset under the cursor.
    fn on_reset(&self, _buffer: BufferId) {}
}

/// A sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StepSink for NullSink {
    fn on_step(&self, _buffer: BufferId, _record: &StepRecord) {}
}

/// Requests addressed to a cursor task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackControl {
    pub requested_is_playing: bool,
    /// Configured per-step delay.
    pub speed_ms: u64,
    /// Faster delay requested by the Completion Gate, if any.
    pub requested_speed_ms: Option<u64>,
    /// Whether `requested_speed_ms` may override `speed_ms`.
    pub speed_adjustable: bool,
}

impl PlaybackControl {
    /// Delay the cursor actually waits between records.
    pub fn effective_speed_ms(&self) -> u64 {
        let speed = match self.requested_speed_ms {
            Some(requested) if self.speed_adjustable => requested.min(self.speed_ms),
            _ => self.speed_ms,
        };
        speed.max(1)
    }
}

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// Read position into a buffer snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    steps: Arc<Vec<StepRecord>>,
    reset_id: u64,
    evicted: u64,
    cursor: usize,
    pub control: PlaybackControl,
}

impl PlaybackState {
    pub fn new(control: PlaybackControl) -> Self {
        PlaybackState {
            steps: Arc::new(Vec::new()),
            reset_id: 0,
            evicted: 0,
            cursor: 0,
            control,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &Arc<Vec<StepRecord>> {
        &self.steps
    }

    pub fn reset_id(&self) -> u64 {
        self.reset_id
    }

    /// `cursor >= len`.
    pub fn is_done(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    pub fn remaining(&self) -> usize {
        self.steps.len() - self.cursor
    }

    /// Records consumed since the last reset, counting evicted ones the
    /// cursor never saw.
    pub fn consumed_total(&self) -> u64 {
        self.evicted + self.cursor as u64
    }

    /// Adopts a newer snapshot of the same buffer.
    ///
    /// A different `reset_id` restarts from zero. Otherwise the cursor is
    /// shifted back by the number of records evicted since the last
    /// snapshot, then clamped to the new length.
    pub fn apply_snapshot(&mut self, snapshot: &BufferSnapshot) -> bool {
        let was_reset = snapshot.reset_id != self.reset_id;
        if was_reset {
            self.cursor = 0;
        } else {
            let newly_evicted = snapshot.evicted.saturating_sub(self.evicted) as usize;
            self.cursor = self.cursor.saturating_sub(newly_evicted);
        }
        self.reset_id = snapshot.reset_id;
        self.evicted = snapshot.evicted;
        self.steps = Arc::clone(&snapshot.steps);
        self.cursor = self.cursor.min(self.steps.len());
        was_reset
    }

    /// Moves past the next record and returns it.
    pub fn advance(&mut self) -> Option<StepRecord> {
        let record = self.steps.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(record)
    }

    fn wants_to_advance(&self) -> bool {
        self.control.requested_is_playing && !self.is_done()
    }
}

// ---------------------------------------------------------------------------
// Cursor task
// ---------------------------------------------------------------------------

/// Handle to a running cursor task. Dropping it stops the task.
pub struct PlaybackCursor {
    buffer: BufferId,
    control: watch::Sender<PlaybackControl>,
    state: watch::Receiver<PlaybackState>,
    task: JoinHandle<()>,
}

impl PlaybackCursor {
    /// Spawns a cursor over `snapshots` on the current tokio runtime.
    pub fn spawn(
        handle: &tokio::runtime::Handle,
        buffer: BufferId,
        snapshots: watch::Receiver<BufferSnapshot>,
        control: PlaybackControl,
        sink: Arc<dyn StepSink>,
    ) -> Self {
        let initial = PlaybackState::new(control.clone());
        let (control_tx, control_rx) = watch::channel(control);
        let (state_tx, state_rx) = watch::channel(initial);
        let task = handle.spawn(drive(buffer, snapshots, control_rx, state_tx, sink));
        PlaybackCursor {
            buffer,
            control: control_tx,
            state: state_rx,
            task,
        }
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Latest published state.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// Subscribes to published states.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.clone()
    }

    pub fn control(&self) -> PlaybackControl {
        self.control.borrow().clone()
    }

    pub fn play(&self) {
        self.request(|c| {
            c.requested_is_playing = true;
            true
        });
    }

    pub fn pause(&self) {
        self.request(|c| {
            c.requested_is_playing = false;
            true
        });
    }

    /// Changes the configured per-step delay.
    pub fn set_speed(&self, speed_ms: u64) {
        self.request(|c| {
            c.speed_ms = speed_ms.max(1);
            true
        });
    }

    /// Applies `change` to the control block. The cursor task is only woken
    /// when `change` returns `true`.
    pub fn request(&self, change: impl FnOnce(&mut PlaybackControl) -> bool) {
        self.control.send_if_modified(change);
    }

    /// Returns `true` while the task is alive.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

impl Drop for PlaybackCursor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn drive(
    buffer: BufferId,
    mut snapshots: watch::Receiver<BufferSnapshot>,
    mut control: watch::Receiver<PlaybackControl>,
    state_tx: watch::Sender<PlaybackState>,
    sink: Arc<dyn StepSink>,
) {
    let mut state = PlaybackState::new(control.borrow_and_update().clone());
    state.apply_snapshot(&snapshots.borrow_and_update());
    let mut next_step: Option<Instant> = None;
    debug!(%buffer, "playback cursor started");

    loop {
        state_tx.send_replace(state.clone());

        if !state.wants_to_advance() {
            next_step = None;
            tokio::select! {
                changed = control.changed() => {
                    if changed.is_err() { break; }
                    state.control = control.borrow_and_update().clone();
                }
                changed = snapshots.changed() => {
                    if changed.is_err() { break; }
                    if state.apply_snapshot(&snapshots.borrow_and_update()) {
                        sink.on_reset(buffer);
                    }
                }
            }
            continue;
        }

        let delay = Duration::from_millis(state.control.effective_speed_ms());
        let due = *next_step.get_or_insert_with(|| Instant::now() + delay);

        tokio::select! {
            _ = tokio::time::sleep_until(due) => {
                next_step = None;
                if let Some(record) = state.advance() {
                    trace!(%buffer, seq = record.seq, cursor = state.cursor(), "playback step");
                    sink.on_step(buffer, &record);
                }
            }
            changed = control.changed() => {
                if changed.is_err() { break; }
                state.control = control.borrow_and_update().clone();
                let sooner = Instant::now()
                    + Duration::from_millis(state.control.effective_speed_ms());
                next_step = next_step.map(|due| due.min(sooner));
            }
            changed = snapshots.changed() => {
                if changed.is_err() { break; }
                if state.apply_snapshot(&snapshots.borrow_and_update()) {
                    next_step = None;
                    sink.on_reset(buffer);
                }
            }
        }
    }
    state_tx.send_replace(state);
    debug!(%buffer, "playback cursor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StepTarget;
    use proptest::prelude::*;

    fn control(playing: bool) -> PlaybackControl {
        PlaybackControl {
            requested_is_playing: playing,
            speed_ms: 250,
            requested_speed_ms: None,
            speed_adjustable: true,
        }
    }

    fn snapshot(len: usize, evicted: u64, reset_id: u64) -> BufferSnapshot {
        let steps = (0..len)
            .map(|i| StepRecord {
                seq: evicted + i as u64,
                target: StepTarget::Frontier { index: i },
                value: serde_json::Value::Null,
                meta: None,
                timestamp_ms: 0,
            })
            .collect();
        BufferSnapshot {
            steps: Arc::new(steps),
            reset_id,
            evicted,
        }
    }

    #[test]
    fn effective_speed_respects_adjustable_flag() {
        let mut ctl = control(true);
        ctl.requested_speed_ms = Some(18);
        assert_eq!(ctl.effective_speed_ms(), 18);
        ctl.speed_adjustable = false;
        assert_eq!(ctl.effective_speed_ms(), 250);
        ctl.speed_adjustable = true;
        ctl.requested_speed_ms = Some(900);
        assert_eq!(ctl.effective_speed_ms(), 250);
    }

    #[test]
    fn eviction_rebases_cursor() {
        let mut state = PlaybackState::new(control(true));
        state.apply_snapshot(&snapshot(10, 0, 0));
        for _ in 0..4 {
            state.advance();
        }
        state.apply_snapshot(&snapshot(10, 3, 0));
        assert_eq!(state.cursor(), 1);
        assert_eq!(state.advance().unwrap().seq, 4);
        assert_eq!(state.consumed_total(), 5);
    }

    #[test]
    fn reset_restarts_cursor() {
        let mut state = PlaybackState::new(control(true));
        state.apply_snapshot(&snapshot(5, 0, 0));
        state.advance();
        assert!(state.apply_snapshot(&snapshot(2, 0, 1)));
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.reset_id(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Advance,
        Snapshot { len: usize, evict: u64 },
        Reset { len: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Advance),
            2 => (0usize..20, 0u64..5).prop_map(|(len, evict)| Op::Snapshot { len, evict }),
            1 => (0usize..20).prop_map(|len| Op::Reset { len }),
        ]
    }

    proptest! {
        #[test]
        fn cursor_never_leaves_bounds(ops in prop::collection::vec(op(), 0..64)) {
            let mut state = PlaybackState::new(control(true));
            let mut evicted = 0u64;
            let mut reset_id = 0u64;
            for op in ops {
                match op {
                    Op::Advance => { state.advance(); }
                    Op::Snapshot { len, evict } => {
                        evicted += evict;
                        state.apply_snapshot(&snapshot(len, evicted, reset_id));
                    }
                    Op::Reset { len } => {
                        reset_id += 1;
                        evicted = 0;
                        state.apply_snapshot(&snapshot(len, 0, reset_id));
                    }
                }
                prop_assert!(state.cursor() <= state.len());
                prop_assert_eq!(state.is_done(), state.remaining() == 0);
            }
        }
    }
}
