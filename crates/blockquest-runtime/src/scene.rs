//! Renderer contract.
//!
//! The renderer itself lives outside this workspace. A run only needs an
//! active scene it can query for entities, ask to play bounded effects,
//! read and write an overlay on, and check for liveness. [`HeadlessScene`]
//! implements the contract with timers alone.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::trace;

/// Upper bound on any single effect.
pub const MAX_EFFECT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    Move,
    Collect,
    Hurt,
    Celebrate,
}

/// A bounded visual effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub target: Option<String>,
    pub duration: Duration,
}

pub type EffectFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// The active scene of the renderer.
pub trait SceneHandle: Send + Sync {
    /// Whether an entity with this identifier exists in the scene.
    fn has_entity(&self, id: &str) -> bool;

    /// Plays `effect` and resolves when it has finished, or at once if the
    /// scene is gone.
    fn play_effect(&self, effect: Effect) -> EffectFuture<'_>;

    fn overlay(&self) -> Option<String>;

    fn set_overlay(&self, overlay: Option<String>);

    /// `false` once the scene has been torn down.
    fn is_alive(&self) -> bool;
}

/// A scene without a renderer: effects are sleeps, entities are names.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    entities: HashSet<String>,
    overlay: Mutex<Option<String>>,
    played: Mutex<Vec<Effect>>,
    closed: AtomicBool,
    closing: Notify,
}

impl HeadlessScene {
    pub fn new<I, S>(entities: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(HeadlessScene {
            entities: entities.into_iter().map(Into::into).collect(),
            ..HeadlessScene::default()
        })
    }

    /// Tears the scene down. Effects in progress resolve immediately.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.closing.notify_waiters();
    }

    /// Effects played so far, in order.
    pub fn played(&self) -> Vec<Effect> {
        self.played.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SceneHandle for HeadlessScene {
    fn has_entity(&self, id: &str) -> bool {
        self.entities.contains(id)
    }

    fn play_effect(&self, effect: Effect) -> EffectFuture<'_> {
        Box::pin(async move {
            if !self.is_alive() {
                return;
            }
            let duration = effect.duration.min(MAX_EFFECT);
            trace!(kind = ?effect.kind, target = ?effect.target, ?duration, "effect");
            self.played
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(effect);
            let closing = self.closing.notified();
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = closing => {}
            }
        })
    }

    fn overlay(&self) -> Option<String> {
        self.overlay.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_overlay(&self, overlay: Option<String>) {
        *self.overlay.lock().unwrap_or_else(PoisonError::into_inner) = overlay;
    }

    fn is_alive(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn effect(ms: u64) -> Effect {
        Effect {
            kind: EffectKind::Move,
            target: Some("B".into()),
            duration: Duration::from_millis(ms),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn effects_are_bounded() {
        let scene = HeadlessScene::new(["agent"]);
        let start = Instant::now();
        scene.play_effect(effect(60_000)).await;
        assert_eq!(start.elapsed(), MAX_EFFECT);
        assert!(scene.has_entity("agent"));
        assert_eq!(scene.played().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closing_releases_running_effects() {
        let scene = HeadlessScene::new(Vec::<String>::new());
        let waiting = {
            let scene = Arc::clone(&scene);
            tokio::spawn(async move { scene.play_effect(effect(4_000)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        let start = Instant::now();
        scene.close();
        waiting.await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(100));
        assert!(!scene.is_alive());
    }

    #[test]
    fn overlay_round_trips() {
        let scene = HeadlessScene::new(["agent"]);
        scene.set_overlay(Some("night".into()));
        assert_eq!(scene.overlay().as_deref(), Some("night"));
    }
}
