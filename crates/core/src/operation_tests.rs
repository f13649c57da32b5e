// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::run::CounterUpdate;
use crate::ProcessingPhase;
use chrono::{DateTime, Duration, Utc};

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-02T21:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn progress_for_unseen_run_synthesizes_running_row() {
    let op = Operation::Progress(ProgressRecord {
        run_id: "late".to_string(),
        phase: Some(ProcessingPhase::IndicatorProcessing),
        counters: CounterUpdate {
            symbols_processed: Some(7),
            ..CounterUpdate::default()
        },
        metadata: None,
        updated_at: t0(),
    });

    let row = op.apply(None).unwrap();
    assert_eq!(row.run_id, "late");
    assert_eq!(row.status, RunStatus::Running);
    assert_eq!(row.phase, ProcessingPhase::IndicatorProcessing);
    assert_eq!(row.counters.symbols_processed, 7);
}

#[test]
fn completion_for_unseen_run_backdates_start() {
    let op = Operation::Complete(Completion {
        run_id: "late".to_string(),
        success: true,
        phase: ProcessingPhase::Completed,
        completed_at: t0(),
        duration_seconds: Some(120.0),
        counters: CounterUpdate::default(),
        error_message: None,
    });

    let row = op.apply(None).unwrap();
    assert_eq!(row.status, RunStatus::Success);
    assert_eq!(row.started_at, t0() - Duration::seconds(120));
    assert_eq!(row.duration_seconds, Some(120.0));
}

#[test]
fn completion_with_unrepresentable_duration_starts_at_completion() {
    let op = Operation::Complete(Completion {
        run_id: "ghost".to_string(),
        success: true,
        phase: ProcessingPhase::Completed,
        completed_at: t0(),
        duration_seconds: Some(1e13),
        counters: CounterUpdate::default(),
        error_message: None,
    });

    let row = op.apply(None).unwrap();
    assert_eq!(row.status, RunStatus::Success);
    assert_eq!(row.started_at, t0());
}

#[test]
fn upsert_on_terminal_row_is_rejected() {
    let mut row = ProcessingRun::new(
        "r1",
        TriggerType::Automatic,
        RunStatus::Success,
        ProcessingPhase::Completed,
        t0(),
    );
    row.completed_at = Some(t0());

    let op = Operation::UpsertRun(ProcessingRun::new(
        "r1",
        TriggerType::Automatic,
        RunStatus::Running,
        ProcessingPhase::Scheduled,
        t0(),
    ));
    assert!(matches!(op.apply(Some(row)), Err(RunError::Terminal { .. })));
}

#[test]
fn traced_fields_name_the_run() {
    let op = Operation::Complete(Completion {
        run_id: "r2".to_string(),
        success: false,
        phase: ProcessingPhase::Error,
        completed_at: t0(),
        duration_seconds: None,
        counters: CounterUpdate::default(),
        error_message: Some("boom".to_string()),
    });

    assert_eq!(op.name(), "run_complete");
    let fields = op.fields();
    assert!(fields.contains(&("run_id", "r2".to_string())));
    assert!(fields.contains(&("error", "boom".to_string())));
}
