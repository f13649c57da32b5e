// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::{TimeZone, Utc};
use ts_core::{FakeClock, ProcessingPhase, RunStatus};
use ts_storage::MemoryRunStore;

fn setup() -> (RunTracker<FakeClock>, MemoryRunStore<FakeClock>, FakeClock) {
    let clock = FakeClock::at(Utc.with_ymd_and_hms(2026, 3, 2, 21, 0, 0).unwrap());
    let store = MemoryRunStore::with_clock(clock.clone());
    let tracker = RunTracker::new(
        Arc::new(store.clone()),
        ChannelNames::default(),
        clock.clone(),
    );
    (tracker, store, clock)
}

fn message(channel: &str, payload: &str) -> Message {
    Message {
        channel: channel.to_string(),
        payload: payload.to_string(),
    }
}

#[test]
fn started_progress_completed_updates_state_and_store() {
    let (tracker, store, clock) = setup();

    tracker.handle_message(&message(
        "tickstock:processing:started",
        r#"{"type":"processing_started","run_id":"r1","total_symbols":100}"#,
    ));
    clock.advance_secs(30);
    tracker.handle_message(&message(
        "tickstock.processing.progress",
        r#"{"run_id":"r1","progress":50,"symbols_processed":50,"current_symbol":"AAPL"}"#,
    ));

    let live = tracker.reader().snapshot();
    assert!(live.is_running);
    assert_eq!(live.progress, 50.0);
    assert_eq!(live.current_symbol.as_deref(), Some("AAPL"));
    assert_eq!(store.get_run("r1").unwrap().unwrap().counters.symbols_processed, 50);

    clock.advance_secs(30);
    tracker.handle_message(&message(
        "tickstock:processing:completed",
        r#"{"run_id":"r1","duration_seconds":60.0}"#,
    ));

    let live = tracker.reader().snapshot();
    assert!(!live.is_running);
    assert_eq!(live.phase, ProcessingPhase::Completed);
    let row = store.get_run("r1").unwrap().unwrap();
    assert_eq!(row.status, RunStatus::Success);
    assert_eq!(row.duration_seconds, Some(60.0));

    let stats = tracker.stats();
    assert_eq!(stats.received, 3);
    assert_eq!(stats.applied, 3);
    assert_eq!(stats.persist_failures, 0);
}

#[test]
fn malformed_message_is_counted_and_dropped() {
    let (tracker, store, _) = setup();

    tracker.handle_message(&message("tickstock:processing:progress", "{not json"));
    tracker.handle_message(&message("tickstock:processing:status", r#"{"run_id":"r1"}"#));

    let stats = tracker.stats();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.applied, 0);
    assert_eq!(tracker.reader().snapshot(), LiveState::idle());
    assert!(store.latest_run().unwrap().is_none());
}

#[test]
fn payload_with_replaced_bytes_counts_as_malformed() {
    let (tracker, _, _) = setup();

    tracker.handle_message(&message("tickstock:processing:progress", "\u{FFFD}\u{FFFD}{"));

    assert_eq!(tracker.stats().malformed, 1);
    assert_eq!(tracker.reader().snapshot(), LiveState::idle());
}

#[test]
fn unknown_event_type_is_ignored() {
    let (tracker, _, _) = setup();

    tracker.handle_message(&message(
        "tickstock:processing:status",
        r#"{"type":"heartbeat","run_id":"r1"}"#,
    ));

    let stats = tracker.stats();
    assert_eq!(stats.unknown, 1);
    assert_eq!(stats.applied, 0);
    assert!(!tracker.reader().snapshot().has_run());
}

#[test]
fn store_failure_keeps_live_state_current() {
    let (tracker, store, _) = setup();
    store.set_fail_writes(true);

    tracker.handle_message(&message(
        "tickstock:processing:started",
        r#"{"run_id":"r1","total_symbols":10}"#,
    ));
    tracker.handle_message(&message(
        "tickstock:processing:progress",
        r#"{"run_id":"r1","progress":20}"#,
    ));

    let live = tracker.reader().snapshot();
    assert_eq!(live.run_id.as_deref(), Some("r1"));
    assert_eq!(live.progress, 20.0);
    assert_eq!(tracker.stats().persist_failures, 2);

    store.set_fail_writes(false);
    assert!(store.get_run("r1").unwrap().is_none());
}

#[test]
fn late_event_for_finished_run_is_rejected_by_store() {
    let (tracker, store, _) = setup();

    tracker.handle_message(&message("tickstock:processing:started", r#"{"run_id":"r1"}"#));
    tracker.handle_message(&message(
        "tickstock:processing:error",
        r#"{"run_id":"r1","error":"disk full"}"#,
    ));
    tracker.handle_message(&message(
        "tickstock:processing:progress",
        r#"{"run_id":"r1","progress":90}"#,
    ));

    let row = store.get_run("r1").unwrap().unwrap();
    assert_eq!(row.status, RunStatus::Failed);
    assert_eq!(row.error_message.as_deref(), Some("disk full"));
    assert_eq!(tracker.stats().persist_failures, 1);
    assert_eq!(tracker.reader().snapshot().phase, ProcessingPhase::Error);
}

#[test]
fn reader_sees_updates_from_tracker() {
    let (tracker, _, _) = setup();
    let reader = tracker.reader();

    tracker.apply(&EngineEvent::ScheduleUpdated {
        next_run: Some("2026-03-03T21:10:00Z".to_string()),
    });

    assert_eq!(
        reader.snapshot().next_scheduled_run.as_deref(),
        Some("2026-03-03T21:10:00Z")
    );
}

#[test]
fn replayed_started_leaves_finished_run_finished() {
    let (tracker, store, _) = setup();

    tracker.handle_message(&message("tickstock:processing:started", r#"{"run_id":"r1"}"#));
    tracker.handle_message(&message("tickstock:processing:completed", r#"{"run_id":"r1"}"#));
    tracker.handle_message(&message("tickstock:processing:started", r#"{"run_id":"r1"}"#));

    let live = tracker.reader().snapshot();
    assert!(!live.is_running);
    assert_eq!(live.status, Some(RunStatus::Success));
    assert_eq!(live.phase, ProcessingPhase::Completed);
    assert_eq!(store.get_run("r1").unwrap().unwrap().status, RunStatus::Success);
    assert_eq!(tracker.stats().persist_failures, 1);
}
