//! Ingestor resilience

use std::time::{Duration, Instant};

use crate::prelude::*;
use similar_asserts::assert_eq;
use ts_core::RunStatus;
use ts_storage::RunStore;

#[test]
fn reconnects_and_resubscribes_after_disconnect() {
    let h = Harness::engine_down();
    h.start();

    h.pubsub.disconnect();
    wait_for("resubscription", || h.pubsub.listen_calls() == 2 && h.pubsub.listener_count() == 1);

    assert_eq!(h.pubsub.subscribed_channels().len(), 20);
    h.publish(
        "tickstock.processing.started",
        json!({"type": "started", "run_id": "r1"}),
    );
    h.wait_applied(1);
    assert_eq!(h.orchestrator.ingestor().stats().reconnects, 1);
}

#[test]
fn stop_returns_within_the_timeout() {
    let h = Harness::engine_down();
    h.start();

    let began = Instant::now();
    h.orchestrator.stop(Duration::from_secs(2)).unwrap();

    assert!(began.elapsed() < Duration::from_secs(2));
    assert!(!h.orchestrator.ingestor().is_running());
    assert_eq!(h.pubsub.listener_count(), 0);
}

#[test]
fn finished_runs_never_regress() {
    let h = Harness::engine_down();
    h.start();

    h.publish(
        "tickstock:processing:started",
        json!({"type": "started", "run_id": "r1", "total_symbols": 4}),
    );
    h.publish(
        "tickstock:processing:completed",
        json!({"type": "completed", "run_id": "r1", "symbols_processed": 4}),
    );
    h.wait_applied(2);
    // A straggler from the engine after the run finished
    h.publish(
        "tickstock:processing:progress",
        json!({"type": "progress", "run_id": "r1", "progress": 20, "symbols_completed": 1}),
    );
    wait_for("straggler", || h.orchestrator.ingestor().stats().received >= 3);

    let row = h.store.get_run("r1").unwrap().unwrap();
    assert_eq!(row.status, RunStatus::Success);
    assert_eq!(row.counters.symbols_processed, 4);

    let live = h.orchestrator.ingestor().reader().snapshot();
    assert!(!live.is_running);
    assert_eq!(live.progress, 100.0);
}
