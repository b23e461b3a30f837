//! Completion Gate: bounded wait for a cursor to drain its buffer.
//!
//! The gate never moves a cursor. It flushes the recorder, then polls the
//! cursor's published state until everything flushed since the last reset
//! has been consumed. While waiting it asks the cursor to play and, when
//! the remaining playback would overrun the target ceiling, to shorten its
//! per-step delay. Every wait ends: on completion (`true`), on timeout,
//! when the cursor task is gone, or when the owning hub is disposed
//! (`false`).

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::WaitOptions;
use crate::playback::PlaybackCursor;
use crate::recorder::StepRecorder;

/// Per-step delay that finishes `remaining` steps within `ceiling`, or
/// `None` when `speed_ms` already does.
///
/// With 10 000 steps at 250 ms against a 180 s ceiling this yields 18 ms.
pub fn adjusted_speed_ms(remaining: u64, speed_ms: u64, ceiling: Duration) -> Option<u64> {
    let ceiling_ms = ceiling.as_millis() as u64;
    if remaining == 0 || remaining.saturating_mul(speed_ms) <= ceiling_ms {
        return None;
    }
    Some((ceiling_ms / remaining).max(1))
}

/// Waits on one cursor at a time. Clones share the dispose signal.
#[derive(Debug, Clone)]
pub struct CompletionGate {
    ceiling: Duration,
    disposed: watch::Receiver<bool>,
}

impl CompletionGate {
    pub fn new(ceiling: Duration, disposed: watch::Receiver<bool>) -> Self {
        CompletionGate { ceiling, disposed }
    }

    pub fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Resolves `true` once `cursor` has consumed every record flushed into
    /// `recorder`, `false` on timeout or cancellation.
    pub async fn wait(
        &self,
        recorder: &StepRecorder,
        cursor: &PlaybackCursor,
        options: WaitOptions,
    ) -> bool {
        let mut disposed = self.disposed.clone();
        if *disposed.borrow_and_update() {
            return false;
        }

        recorder.flush_now();
        if recorder.snapshot().is_empty() {
            return true;
        }

        let buffer = recorder.id();
        let deadline = Instant::now() + options.timeout();
        loop {
            recorder.flush_now();
            let snapshot = recorder.snapshot();
            let view = cursor.state();

            let remaining = if view.reset_id() == snapshot.reset_id {
                snapshot.total().saturating_sub(view.consumed_total())
            } else {
                snapshot.len() as u64
            };
            if remaining == 0 {
                debug!(%buffer, total = snapshot.total(), "playback drained");
                return true;
            }
            if !cursor.is_running() {
                warn!(%buffer, remaining, "playback cursor stopped before draining");
                return false;
            }

            let ceiling = self.ceiling;
            cursor.request(|control| {
                let mut changed = false;
                if !control.requested_is_playing {
                    control.requested_is_playing = true;
                    changed = true;
                }
                if control.speed_adjustable {
                    if let Some(speed) = adjusted_speed_ms(remaining, control.speed_ms, ceiling) {
                        if control.requested_speed_ms.map_or(true, |current| speed < current) {
                            debug!(%buffer, remaining, speed_ms = speed, "requesting faster playback");
                            control.requested_speed_ms = Some(speed);
                            changed = true;
                        }
                    }
                }
                changed
            });

            let now = Instant::now();
            if now >= deadline {
                warn!(%buffer, remaining, timeout_ms = options.timeout_ms, "playback wait timed out");
                return false;
            }
            let pause = options.poll().min(deadline - now);
            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = disposed.changed() => {
                    if changed.is_err() || *disposed.borrow_and_update() {
                        debug!(%buffer, "playback wait cancelled");
                        return false;
                    }
                }
            }
        }
    }
}
