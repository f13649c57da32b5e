// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::dispatcher::{Transport, TriggerRequest};
use crate::facade::StatusSource;
use std::time::Instant;
use ts_adapters::{FakeEngineApi, FakePubSub};
use ts_core::{FakeClock, SequentialIdGen};
use ts_storage::SqliteRunStore;

fn build(
    api: FakeEngineApi,
    pubsub: FakePubSub,
    db: &std::path::Path,
) -> Orchestrator<FakeEngineApi, FakePubSub, FakeClock, SequentialIdGen> {
    let clock = FakeClock::new();
    let store = Arc::new(SqliteRunStore::with_clock(db, clock.clone()).unwrap());
    Orchestrator::new(
        OrchestratorDeps {
            api,
            pubsub,
            store: store.clone(),
            schedules: store,
            clock,
            id_gen: SequentialIdGen::new("run"),
        },
        OrchestratorConfig {
            source: "dashboard".to_string(),
            ingestor: IngestorConfig {
                poll_interval: Duration::from_millis(10),
                ..IngestorConfig::default()
            },
            ..OrchestratorConfig::default()
        },
    )
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not met in time");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn trigger_shows_pending_run_before_engine_events() {
    let dir = tempfile::tempdir().unwrap();
    let api = FakeEngineApi::unreachable();
    let pubsub = FakePubSub::new();
    pubsub.add_subscriber("tickstock:processing:trigger");
    let orchestrator = build(api, pubsub.clone(), &dir.path().join("runs.db"));
    orchestrator.start().unwrap();

    let result = orchestrator.dispatcher().trigger(&TriggerRequest::default());
    assert!(result.success);
    assert_eq!(result.transport, Some(Transport::PubSub));

    wait_for(|| orchestrator.ingestor().reader().snapshot().is_running);
    let status = orchestrator.facade().current_status();
    assert_eq!(status.source, StatusSource::Live);
    assert_eq!(status.run_id(), result.run_id.as_deref());
    assert!(status.is_running());

    let command: ts_core::Command =
        serde_json::from_str(&pubsub.published()[0].payload).unwrap();
    assert_eq!(command.source, "dashboard");

    orchestrator.stop(Duration::from_secs(2)).unwrap();
}

#[test]
fn engine_events_reach_sqlite_history() {
    let dir = tempfile::tempdir().unwrap();
    let api = FakeEngineApi::unreachable();
    let pubsub = FakePubSub::new();
    let orchestrator = build(api, pubsub.clone(), &dir.path().join("runs.db"));
    orchestrator.start().unwrap();
    wait_for(|| pubsub.listener_count() == 1);

    pubsub
        .publish("tickstock:processing:started", r#"{"run_id":"r1","total_symbols":3}"#)
        .unwrap();
    pubsub
        .publish("tickstock.processing.completed", r#"{"run_id":"r1"}"#)
        .unwrap();
    wait_for(|| orchestrator.ingestor().stats().applied == 2);
    orchestrator.stop(Duration::from_secs(2)).unwrap();

    let history = orchestrator.facade().history(7, 10);
    assert_eq!(history.source, StatusSource::Store);
    assert_eq!(history.runs.len(), 1);
    assert_eq!(history.runs[0]["status"], "success");
    assert_eq!(history.runs[0]["symbols_total"], 3);
}
