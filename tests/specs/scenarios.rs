//! End-to-end scenarios: engine events in, dashboard status out

use crate::prelude::*;
use similar_asserts::assert_eq;
use ts_core::RunStatus;
use ts_storage::RunStore;

#[test]
fn happy_path_run_ends_completed() {
    let h = Harness::engine_down();
    h.start();

    h.publish(
        "tickstock:processing:started",
        json!({"type": "started", "run_id": "r1", "total_symbols": 10}),
    );
    h.publish(
        "tickstock:processing:progress",
        json!({"type": "progress", "run_id": "r1", "progress": 50, "symbols_completed": 5}),
    );
    h.publish(
        "tickstock:processing:completed",
        json!({"type": "completed", "run_id": "r1", "symbols_processed": 10, "symbols_failed": 0}),
    );
    h.wait_applied(3);

    let status = h.status();
    assert_eq!(
        pick(
            &status,
            &["is_running", "run_id", "phase", "progress", "symbols_completed", "symbols_failed"]
        ),
        json!({
            "is_running": false,
            "run_id": "r1",
            "phase": "completed",
            "progress": 100.0,
            "symbols_completed": 10,
            "symbols_failed": 0,
        })
    );
    assert_eq!(status["source"], "live");

    let row = h.store.get_run("r1").unwrap().unwrap();
    assert_eq!(row.status, RunStatus::Success);
    assert!(row.completed_at.is_some());
    assert!(row.duration_seconds.unwrap() >= 0.0);
}

#[test]
fn engine_error_fails_the_run() {
    let h = Harness::engine_down();
    h.start();

    h.publish(
        "tickstock:processing:started",
        json!({"type": "started", "run_id": "r2"}),
    );
    h.publish(
        "tickstock:processing:error",
        json!({"type": "error", "run_id": "r2", "error_message": "boom"}),
    );
    h.wait_applied(2);

    let status = h.status();
    assert_eq!(status["phase"], "error");
    assert_eq!(status["is_running"], false);

    let row = h.store.get_run("r2").unwrap().unwrap();
    assert_eq!(row.status, RunStatus::Failed);
    assert_eq!(row.error_message.as_deref(), Some("boom"));

    let history = h.orchestrator.facade().history(7, 10);
    assert_eq!(history.runs[0]["status"], "failed");
}

#[test]
fn malformed_message_is_skipped_without_restart() {
    let h = Harness::engine_down();
    h.start();

    h.publish_raw("tickstock:processing:progress", "this is not json");
    h.publish(
        "tickstock:processing:started",
        json!({"type": "started", "run_id": "r3"}),
    );
    h.wait_applied(1);

    let stats = h.orchestrator.ingestor().stats();
    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.reconnects, 0);
    assert_eq!(h.pubsub.listen_calls(), 1);
    assert_eq!(h.status()["run_id"], "r3");
}

#[test]
fn replayed_progress_changes_nothing() {
    let h = Harness::engine_down();
    h.start();
    let progress = json!({"type": "progress", "run_id": "r4", "progress": 40, "symbols_completed": 4});

    h.publish(
        "tickstock:processing:started",
        json!({"type": "started", "run_id": "r4", "total_symbols": 10}),
    );
    h.publish("tickstock:processing:progress", progress.clone());
    h.wait_applied(2);
    let once = h.orchestrator.ingestor().reader().snapshot();

    h.publish("tickstock.processing.progress", progress);
    h.wait_applied(3);
    let twice = h.orchestrator.ingestor().reader().snapshot();

    // Only the event timestamp may move
    assert_eq!(
        ts_core::LiveState {
            last_event_at: None,
            ..once
        },
        ts_core::LiveState {
            last_event_at: None,
            ..twice
        }
    );
}
