//! Step Recorder: staged pushes, coalesced flushes, bounded buffer.
//!
//! The producer (a running program) calls [`StepRecorder::push`] as fast as
//! it likes. Pushes land in a staging vector under a short `std` mutex and
//! never touch the published buffer. The first push after a flush arms a
//! one-shot timer; when it fires, everything staged is appended to the
//! buffer in one batch and the front is truncated to `max_steps`. Readers
//! observe the buffer through a `tokio::sync::watch` channel, so each flush
//! is a single snapshot replacement.
//!
//! [`StepRecorder::flush_now`] flushes synchronously and is called before
//! any completion check. [`StepRecorder::reset`] clears staged and flushed
//! records and bumps `reset_id`, which tells cursors their position is
//! stale.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::config::ReplayConfig;
use crate::record::{BufferId, BufferSnapshot, StepRecord, StepTarget};

/// Handle to one step buffer. Cheap to clone; clones share the buffer.
#[derive(Clone)]
pub struct StepRecorder {
    inner: Arc<RecorderInner>,
}

struct RecorderInner {
    id: BufferId,
    max_steps: usize,
    flush_interval: std::time::Duration,
    epoch: Instant,
    state: Mutex<Staging>,
    snapshot: watch::Sender<BufferSnapshot>,
}

#[derive(Default)]
struct Staging {
    staged: Vec<StepRecord>,
    next_seq: u64,
    timer: Option<JoinHandle<()>>,
    disposed: bool,
}

impl StepRecorder {
    /// Creates an empty buffer.
    pub fn new(id: BufferId, config: &ReplayConfig) -> Self {
        let (snapshot, _) = watch::channel(BufferSnapshot::default());
        StepRecorder {
            inner: Arc::new(RecorderInner {
                id,
                max_steps: config.max_steps.max(1),
                flush_interval: config.flush_interval(),
                epoch: Instant::now(),
                state: Mutex::new(Staging::default()),
                snapshot,
            }),
        }
    }

    pub fn id(&self) -> BufferId {
        self.inner.id
    }

    /// Stages a record and returns its sequence number.
    ///
    /// Outside a tokio runtime there is no timer to coalesce with, so the
    /// record is flushed immediately.
    pub fn push(
        &self,
        target: StepTarget,
        value: serde_json::Value,
        meta: Option<serde_json::Value>,
    ) -> Option<u64> {
        let mut state = self.inner.lock();
        if state.disposed {
            trace!(buffer = %self.inner.id, "push after dispose dropped");
            return None;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.staged.push(StepRecord {
            seq,
            target,
            value,
            meta,
            timestamp_ms: self.inner.epoch.elapsed().as_millis() as u64,
        });

        if state.timer.is_none() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let weak: Weak<RecorderInner> = Arc::downgrade(&self.inner);
                    let delay = self.inner.flush_interval;
                    state.timer = Some(handle.spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Some(inner) = weak.upgrade() {
                            inner.flush(false);
                        }
                    }));
                }
                Err(_) => {
                    drop(state);
                    self.inner.flush(false);
                }
            }
        }
        Some(seq)
    }

    /// Merges every staged record into the buffer now.
    pub fn flush_now(&self) {
        self.inner.flush(true);
    }

    /// Clears staged and flushed records and increments `reset_id`.
    pub fn reset(&self) {
        let mut state = self.inner.lock();
        state.staged.clear();
        state.next_seq = 0;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        // Held until the empty snapshot is out, like `flush`, so a push
        // numbered after the reset cannot be published and then wiped.
        self.inner.snapshot.send_modify(|snap| {
            snap.steps = Arc::new(Vec::new());
            snap.evicted = 0;
            snap.reset_id += 1;
        });
        drop(state);
        debug!(buffer = %self.inner.id, reset_id = self.reset_id(), "step buffer reset");
    }

    /// Stops accepting pushes and cancels any pending flush.
    pub fn dispose(&self) {
        let mut state = self.inner.lock();
        state.disposed = true;
        state.staged.clear();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    /// The currently flushed contents.
    pub fn snapshot(&self) -> BufferSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Subscribes to flushed snapshots.
    pub fn subscribe(&self) -> watch::Receiver<BufferSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn reset_id(&self) -> u64 {
        self.inner.snapshot.borrow().reset_id
    }

    /// Records staged but not yet flushed.
    pub fn pending(&self) -> usize {
        self.inner.lock().staged.len()
    }
}

impl RecorderInner {
    fn lock(&self) -> MutexGuard<'_, Staging> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, cancel_timer: bool) {
        let mut state = self.lock();
        if let Some(timer) = state.timer.take() {
            if cancel_timer {
                timer.abort();
            }
        }
        if state.staged.is_empty() {
            return;
        }
        let staged = std::mem::take(&mut state.staged);
        // Publish while still holding the staging lock so two flushes
        // cannot interleave their batches.
        let max = self.max_steps;
        let mut dropped = 0usize;
        self.snapshot.send_modify(|snap| {
            let steps = Arc::make_mut(&mut snap.steps);
            steps.extend(staged);
            if steps.len() > max {
                dropped = steps.len() - max;
                steps.drain(..dropped);
                snap.evicted += dropped as u64;
            }
        });
        drop(state);
        trace!(buffer = %self.id, evicted = dropped, "flushed staged steps");
    }
}

impl Drop for RecorderInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn cell(n: i64) -> StepTarget {
        StepTarget::TableCell { row: 0, col: n }
    }

    #[tokio::test(start_paused = true)]
    async fn pushes_stay_staged_until_timer_fires() {
        let recorder = StepRecorder::new(BufferId(0), &ReplayConfig::default());
        recorder.push(cell(0), json!(1), None);
        recorder.push(cell(1), json!(2), None);

        assert!(recorder.snapshot().is_empty());
        assert_eq!(recorder.pending(), 2);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let snap = recorder.snapshot();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap.steps[0].seq, 0);
        assert_eq!(snap.steps[1].value, json!(2));
        assert_eq!(recorder.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_now_is_synchronous() {
        let recorder = StepRecorder::new(BufferId(0), &ReplayConfig::default());
        recorder.push(cell(0), json!(1), Some(json!({"cmp": [1, 2]})));
        recorder.flush_now();
        assert_eq!(recorder.snapshot().len(), 1);
        assert_eq!(recorder.snapshot().steps[0].meta, Some(json!({"cmp": [1, 2]})));
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_keeps_most_recent_in_order() {
        let recorder = StepRecorder::new(BufferId(0), &ReplayConfig::default());
        for n in 1..=5001 {
            recorder.push(cell(n), json!(n), None);
            if n % 700 == 0 {
                recorder.flush_now();
            }
        }
        recorder.flush_now();

        let snap = recorder.snapshot();
        assert_eq!(snap.len(), 5000);
        assert_eq!(snap.evicted, 1);
        assert_eq!(snap.steps[0].value, json!(2));
        assert_eq!(snap.steps[4999].value, json!(5001));
        assert!(snap.steps.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_clears_and_bumps_reset_id() {
        let recorder = StepRecorder::new(BufferId(0), &ReplayConfig::default());
        recorder.push(cell(0), json!(1), None);
        recorder.flush_now();
        recorder.push(cell(1), json!(2), None);

        recorder.reset();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let snap = recorder.snapshot();
        assert!(snap.is_empty());
        assert_eq!(snap.reset_id, 1);
        assert_eq!(recorder.push(cell(2), json!(3), None), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_pending_flush() {
        let recorder = StepRecorder::new(BufferId(0), &ReplayConfig::default());
        recorder.push(cell(0), json!(1), None);
        recorder.dispose();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(recorder.snapshot().is_empty());
        assert_eq!(recorder.push(cell(1), json!(2), None), None);
    }

    #[test]
    fn resets_racing_pushes_leave_contiguous_sequence_numbers() {
        let recorder = StepRecorder::new(BufferId(1), &ReplayConfig::default());
        let resetter = recorder.clone();
        let handle = std::thread::spawn(move || {
            for _ in 0..500 {
                resetter.reset();
            }
        });
        for n in 0..2000 {
            recorder.push(cell(n), json!(n), None);
            recorder.flush_now();
        }
        handle.join().unwrap();
        recorder.push(cell(-1), json!(-1), None);
        recorder.flush_now();

        let seqs: Vec<u64> = recorder.snapshot().steps.iter().map(|s| s.seq).collect();
        assert!(!seqs.is_empty());
        assert_eq!(seqs, (0..seqs.len() as u64).collect::<Vec<_>>());
    }

    #[test]
    fn without_runtime_pushes_flush_immediately() {
        let recorder = StepRecorder::new(BufferId(3), &ReplayConfig::default());
        recorder.push(cell(0), json!(1), None);
        assert_eq!(recorder.snapshot().len(), 1);
    }
}
