//! Per-run registry of step buffers and their playback cursors.
//!
//! One [`ReplayHub`] is created per run and disposed when the run ends.
//! Each buffer pairs a [`StepRecorder`] (written by the runtime host) with
//! a [`PlaybackCursor`] task (draining it into the [`StepSink`]). The
//! Completion Gate operations are exposed here by buffer id.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::{ReplayConfig, WaitOptions};
use crate::error::ReplayError;
use crate::gate::CompletionGate;
use crate::playback::{NullSink, PlaybackControl, PlaybackCursor, PlaybackState, StepSink};
use crate::record::{BufferId, VisualizationKind};
use crate::recorder::StepRecorder;

struct BufferEntry {
    kind: VisualizationKind,
    recorder: StepRecorder,
    cursor: Arc<PlaybackCursor>,
}

/// Step buffers of one run, keyed by [`BufferId`].
pub struct ReplayHub {
    config: ReplayConfig,
    buffers: DashMap<BufferId, BufferEntry>,
    next_id: AtomicU32,
    disposed: watch::Sender<bool>,
    sink: Arc<dyn StepSink>,
}

impl ReplayHub {
    /// A hub whose cursors discard what they consume.
    pub fn new(config: ReplayConfig) -> Self {
        Self::with_sink(config, Arc::new(NullSink))
    }

    pub fn with_sink(config: ReplayConfig, sink: Arc<dyn StepSink>) -> Self {
        let (disposed, _) = watch::channel(false);
        ReplayHub {
            config,
            buffers: DashMap::new(),
            next_id: AtomicU32::new(0),
            disposed,
            sink,
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn is_disposed(&self) -> bool {
        *self.disposed.borrow()
    }

    fn initial_control(&self) -> PlaybackControl {
        PlaybackControl {
            requested_is_playing: self.config.autoplay,
            speed_ms: self.config.default_speed_ms.max(1),
            requested_speed_ms: None,
            speed_adjustable: self.config.speed_adjustable,
        }
    }

    /// Creates a buffer for `kind` and spawns its cursor task.
    pub fn create(&self, kind: VisualizationKind) -> Result<BufferId, ReplayError> {
        if self.is_disposed() {
            return Err(ReplayError::Disposed);
        }
        let handle = tokio::runtime::Handle::try_current().map_err(|_| ReplayError::NoRuntime)?;
        let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let recorder = StepRecorder::new(id, &self.config);
        let cursor = PlaybackCursor::spawn(
            &handle,
            id,
            recorder.subscribe(),
            self.initial_control(),
            Arc::clone(&self.sink),
        );
        self.buffers.insert(
            id,
            BufferEntry {
                kind,
                recorder,
                cursor: Arc::new(cursor),
            },
        );
        info!(buffer = %id, ?kind, "step buffer created");
        Ok(id)
    }

    /// The first buffer of `kind`, created if none exists yet.
    pub fn ensure(&self, kind: VisualizationKind) -> Result<BufferId, ReplayError> {
        match self.find(kind) {
            Some(id) => Ok(id),
            None => self.create(kind),
        }
    }

    /// The lowest-numbered buffer of `kind`.
    pub fn find(&self, kind: VisualizationKind) -> Option<BufferId> {
        self.buffers
            .iter()
            .filter(|entry| entry.kind == kind)
            .map(|entry| *entry.key())
            .min()
    }

    /// All buffers, ordered by id.
    pub fn buffers(&self) -> Vec<(BufferId, VisualizationKind)> {
        let mut all: Vec<_> = self
            .buffers
            .iter()
            .map(|entry| (*entry.key(), entry.kind))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    pub fn recorder(&self, id: BufferId) -> Result<StepRecorder, ReplayError> {
        self.entry(id, |entry| entry.recorder.clone())
    }

    pub fn cursor(&self, id: BufferId) -> Result<Arc<PlaybackCursor>, ReplayError> {
        self.entry(id, |entry| Arc::clone(&entry.cursor))
    }

    pub fn playback_state(&self, id: BufferId) -> Result<PlaybackState, ReplayError> {
        self.entry(id, |entry| entry.cursor.state())
    }

    fn entry<T>(&self, id: BufferId, f: impl FnOnce(&BufferEntry) -> T) -> Result<T, ReplayError> {
        if self.is_disposed() {
            return Err(ReplayError::Disposed);
        }
        self.buffers
            .get(&id)
            .map(|entry| f(&entry))
            .ok_or(ReplayError::UnknownBuffer { id })
    }

    fn gate(&self) -> CompletionGate {
        CompletionGate::new(self.config.target_ceiling(), self.disposed.subscribe())
    }

    // -----------------------------------------------------------------------
    // Completion Gate
    // -----------------------------------------------------------------------

    /// Merges staged records of `id` into its buffer now.
    pub fn flush_steps_now(&self, id: BufferId) -> Result<(), ReplayError> {
        self.entry(id, |entry| entry.recorder.flush_now())
    }

    /// Waits for the cursor of `id` to drain its buffer.
    pub async fn wait_for_playback_done(
        &self,
        id: BufferId,
        options: WaitOptions,
    ) -> Result<bool, ReplayError> {
        let (recorder, cursor) = self.entry(id, |entry| {
            (entry.recorder.clone(), Arc::clone(&entry.cursor))
        })?;
        Ok(self.gate().wait(&recorder, &cursor, options).await)
    }

    /// Waits on every buffer independently and reports each result. One
    /// buffer timing out does not cut short the others.
    pub async fn wait_for_all(&self, options: WaitOptions) -> Vec<(BufferId, bool)> {
        if self.is_disposed() {
            return Vec::new();
        }
        let targets: Vec<_> = self
            .buffers
            .iter()
            .map(|entry| (*entry.key(), entry.recorder.clone(), Arc::clone(&entry.cursor)))
            .collect();

        let mut results: BTreeMap<BufferId, bool> = BTreeMap::new();
        let mut waits = JoinSet::new();
        for (id, recorder, cursor) in targets {
            results.insert(id, false);
            let gate = self.gate();
            waits.spawn(async move { (id, gate.wait(&recorder, &cursor, options).await) });
        }

        while let Some(joined) = waits.join_next().await {
            match joined {
                Ok((id, done)) => {
                    results.insert(id, done);
                }
                Err(err) => warn!(error = %err, "playback wait task failed"),
            }
        }
        debug!(?results, "all playback waits settled");
        results.into_iter().collect()
    }

    /// Clears every buffer for a new execution attempt and drops any
    /// speed-up requested during the previous one.
    pub fn reset_all(&self) {
        let control = self.initial_control();
        for entry in self.buffers.iter() {
            entry.recorder.reset();
            entry.cursor.request(|c| {
                c.requested_is_playing = control.requested_is_playing;
                c.requested_speed_ms = None;
                true
            });
        }
        debug!(buffers = self.buffers.len(), "step buffers reset");
    }

    /// Cancels pending flushes, stops every cursor and resolves
    /// outstanding waits to `false`.
    pub fn dispose(&self) {
        if self.disposed.send_replace(true) {
            return;
        }
        for entry in self.buffers.iter() {
            entry.recorder.dispose();
            entry.cursor.abort();
        }
        self.buffers.clear();
        info!("replay hub disposed");
    }
}

impl Drop for ReplayHub {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StepTarget;
    use serde_json::json;

    #[test]
    fn create_needs_runtime() {
        let hub = ReplayHub::new(ReplayConfig::default());
        assert!(matches!(
            hub.create(VisualizationKind::DpTable),
            Err(ReplayError::NoRuntime)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_reuses_buffer_per_kind() {
        let hub = ReplayHub::new(ReplayConfig::default());
        let table = hub.ensure(VisualizationKind::DpTable).unwrap();
        let frontier = hub.ensure(VisualizationKind::Frontier).unwrap();
        assert_eq!(hub.ensure(VisualizationKind::DpTable).unwrap(), table);
        assert_ne!(table, frontier);
        assert_eq!(hub.buffers().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_buffer_is_an_error() {
        let hub = ReplayHub::new(ReplayConfig::default());
        let err = hub.flush_steps_now(BufferId(9)).unwrap_err();
        assert!(matches!(err, ReplayError::UnknownBuffer { id: BufferId(9) }));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_all_clears_requested_speed() {
        let hub = ReplayHub::new(ReplayConfig::default());
        let id = hub.create(VisualizationKind::DpTable).unwrap();
        let recorder = hub.recorder(id).unwrap();
        recorder.push(StepTarget::TableCell { row: 0, col: 0 }, json!(1), None);
        hub.cursor(id).unwrap().request(|c| {
            c.requested_speed_ms = Some(5);
            true
        });

        hub.reset_all();
        assert!(recorder.snapshot().is_empty());
        assert_eq!(recorder.reset_id(), 1);
        assert_eq!(hub.cursor(id).unwrap().control().requested_speed_ms, None);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_forgets_buffers() {
        let hub = ReplayHub::new(ReplayConfig::default());
        let id = hub.create(VisualizationKind::Frontier).unwrap();
        let recorder = hub.recorder(id).unwrap();
        hub.dispose();

        assert!(recorder.is_disposed());
        assert!(matches!(hub.recorder(id), Err(ReplayError::Disposed)));
        assert!(matches!(
            hub.create(VisualizationKind::Frontier),
            Err(ReplayError::Disposed)
        ));
        assert!(hub.wait_for_all(WaitOptions::default()).await.is_empty());
    }
}
