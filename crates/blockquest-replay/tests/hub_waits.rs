//! Integration tests for buffer playback through the replay hub.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;

use blockquest_replay::{
    BufferId, ReplayConfig, ReplayHub, StepRecord, StepSink, StepTarget, VisualizationKind,
    WaitOptions,
};

#[derive(Default)]
struct CollectingSink {
    seen: Mutex<Vec<(BufferId, u64)>>,
}

impl StepSink for CollectingSink {
    fn on_step(&self, buffer: BufferId, record: &StepRecord) {
        self.seen.lock().unwrap().push((buffer, record.seq));
    }
}

fn push_cells(hub: &ReplayHub, id: BufferId, count: i64) {
    let recorder = hub.recorder(id).unwrap();
    for col in 0..count {
        recorder.push(StepTarget::TableCell { row: 0, col }, json!(col), None);
    }
}

#[tokio::test(start_paused = true)]
async fn sink_sees_records_in_push_order() {
    let sink = Arc::new(CollectingSink::default());
    let hub = ReplayHub::with_sink(
        ReplayConfig {
            default_speed_ms: 10,
            ..ReplayConfig::default()
        },
        sink.clone(),
    );
    let id = hub.create(VisualizationKind::DpTable).unwrap();
    push_cells(&hub, id, 5);

    let done = hub.wait_for_playback_done(id, WaitOptions::default()).await.unwrap();
    assert!(done);
    let seen = sink.seen.lock().unwrap().clone();
    assert_eq!(seen, (0..5).map(|seq| (id, seq)).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn wait_for_all_settles_every_buffer() {
    let hub = ReplayHub::new(ReplayConfig {
        default_speed_ms: 50,
        ..ReplayConfig::default()
    });
    let fast = hub.create(VisualizationKind::DpTable).unwrap();
    let slow = hub.create(VisualizationKind::Frontier).unwrap();
    push_cells(&hub, fast, 4);
    push_cells(&hub, slow, 400);
    hub.cursor(slow).unwrap().request(|c| {
        c.speed_adjustable = false;
        true
    });

    let options = WaitOptions {
        timeout_ms: 1_000,
        poll_ms: 20,
    };
    let results = hub.wait_for_all(options).await;
    assert_eq!(results, vec![(fast, true), (slow, false)]);
}

#[tokio::test(start_paused = true)]
async fn dispose_resolves_outstanding_waits() {
    let hub = Arc::new(ReplayHub::new(ReplayConfig {
        default_speed_ms: 60_000,
        speed_adjustable: false,
        ..ReplayConfig::default()
    }));
    let id = hub.create(VisualizationKind::Frontier).unwrap();
    push_cells(&hub, id, 3);

    let waiter = {
        let hub = Arc::clone(&hub);
        tokio::spawn(async move { hub.wait_for_all(WaitOptions::default()).await })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    hub.dispose();

    let results = waiter.await.unwrap();
    assert_eq!(results, vec![(id, false)]);
}

#[tokio::test(start_paused = true)]
async fn reset_between_attempts_restarts_playback() {
    let hub = ReplayHub::new(ReplayConfig {
        default_speed_ms: 10,
        ..ReplayConfig::default()
    });
    let id = hub.create(VisualizationKind::DpTable).unwrap();
    push_cells(&hub, id, 3);
    assert!(hub.wait_for_playback_done(id, WaitOptions::default()).await.unwrap());

    hub.reset_all();
    push_cells(&hub, id, 2);
    assert!(hub.wait_for_playback_done(id, WaitOptions::default()).await.unwrap());

    let state = hub.playback_state(id).unwrap();
    assert_eq!(state.reset_id(), 1);
    assert_eq!(state.cursor(), 2);
}
