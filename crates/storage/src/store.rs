// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store traits and errors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use ts_core::{Completion, Operation, ProcessingRun, ProgressRecord, RunError, RunStatus, Schedule};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// A write was refused because the run already finished
    pub fn is_terminal_run(&self) -> bool {
        matches!(self, StoreError::Run(RunError::Terminal { .. }))
    }
}

/// Aggregate statistics over a window of days
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub days: u32,
    pub total_runs: u64,
    pub successful: u64,
    pub failed: u64,
    /// Pending or running
    pub running: u64,
    pub average_duration_seconds: Option<f64>,
}

impl RunSummary {
    pub fn from_runs<'a>(days: u32, runs: impl IntoIterator<Item = &'a ProcessingRun>) -> Self {
        let mut summary = RunSummary {
            days,
            ..RunSummary::default()
        };
        let mut durations = Vec::new();
        for run in runs {
            summary.total_runs += 1;
            match run.status {
                RunStatus::Success => summary.successful += 1,
                RunStatus::Failed => summary.failed += 1,
                RunStatus::Pending | RunStatus::Running => summary.running += 1,
            }
            if let Some(duration) = run.duration_seconds {
                durations.push(duration);
            }
        }
        if !durations.is_empty() {
            summary.average_duration_seconds =
                Some(durations.iter().sum::<f64>() / durations.len() as f64);
        }
        summary
    }
}

/// Durable table of processing runs keyed by run id.
///
/// Status never moves backwards and a terminal run rejects further writes
/// with [`RunError::Terminal`].
pub trait RunStore: Send + Sync {
    /// Apply a run operation and return the stored row
    fn apply(&self, op: &Operation) -> Result<ProcessingRun, StoreError>;

    fn insert_or_update_run(&self, run: &ProcessingRun) -> Result<ProcessingRun, StoreError> {
        self.apply(&Operation::UpsertRun(run.clone()))
    }

    fn update_progress(&self, progress: &ProgressRecord) -> Result<ProcessingRun, StoreError> {
        self.apply(&Operation::Progress(progress.clone()))
    }

    fn complete_run(&self, completion: &Completion) -> Result<ProcessingRun, StoreError> {
        self.apply(&Operation::Complete(completion.clone()))
    }

    /// Runs started within the last `days`, newest first
    fn list_recent(&self, days: u32, limit: u32) -> Result<Vec<ProcessingRun>, StoreError>;

    fn get_run(&self, run_id: &str) -> Result<Option<ProcessingRun>, StoreError>;

    /// The most recently started run
    fn latest_run(&self) -> Result<Option<ProcessingRun>, StoreError>;

    fn summary(&self, days: u32) -> Result<RunSummary, StoreError>;

    /// Check the store can be reached
    fn check(&self) -> Result<(), StoreError>;
}

/// Local copy of the engine's schedule
pub trait ScheduleStore: Send + Sync {
    fn save_schedule(&self, schedule: &Schedule) -> Result<(), StoreError>;

    fn load_schedule(&self) -> Result<Option<Schedule>, StoreError>;
}

/// Start of the window covering the last `days`.
///
/// A window reaching past the representable range covers all history.
pub(crate) fn window_start(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    chrono::TimeDelta::try_days(i64::from(days))
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
