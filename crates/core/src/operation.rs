// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations persisted to the run store

use crate::run::{Completion, ProcessingRun, ProgressRecord, RunError, RunStatus, TriggerType};
use crate::traced::Traced;
use serde::{Deserialize, Serialize};

/// Writes produced by run transitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Insert a run, or re-run the upsert for an existing one
    UpsertRun(ProcessingRun),
    /// Update counters, phase and metadata of a live run
    Progress(ProgressRecord),
    /// Finalize a run as success or failure
    Complete(Completion),
}

impl Operation {
    pub fn run_id(&self) -> &str {
        match self {
            Operation::UpsertRun(run) => &run.run_id,
            Operation::Progress(progress) => &progress.run_id,
            Operation::Complete(completion) => &completion.run_id,
        }
    }

    /// Apply this operation to the stored row, if any, and return the new row.
    ///
    /// Rows that do not exist yet are synthesized so that a run first seen
    /// mid-flight (e.g. after a restart) is still recorded.
    pub fn apply(&self, existing: Option<ProcessingRun>) -> Result<ProcessingRun, RunError> {
        match (self, existing) {
            (Operation::UpsertRun(run), None) => Ok(run.clone()),
            (Operation::UpsertRun(run), Some(mut row)) => {
                row.upsert(run)?;
                Ok(row)
            }
            (Operation::Progress(progress), existing) => {
                let mut row = existing.unwrap_or_else(|| {
                    ProcessingRun::new(
                        progress.run_id.clone(),
                        TriggerType::Automatic,
                        RunStatus::Running,
                        progress.phase.unwrap_or(crate::ProcessingPhase::Scheduled),
                        progress.updated_at,
                    )
                });
                row.apply_progress(progress)?;
                Ok(row)
            }
            (Operation::Complete(completion), existing) => {
                let mut row = existing.unwrap_or_else(|| {
                    let started_at = completion
                        .duration_seconds
                        .and_then(|secs| {
                            chrono::TimeDelta::try_milliseconds((secs.max(0.0) * 1000.0) as i64)
                        })
                        .and_then(|elapsed| completion.completed_at.checked_sub_signed(elapsed))
                        .unwrap_or(completion.completed_at);
                    ProcessingRun::new(
                        completion.run_id.clone(),
                        TriggerType::Automatic,
                        RunStatus::Running,
                        completion.phase,
                        started_at,
                    )
                });
                row.complete(completion)?;
                Ok(row)
            }
        }
    }
}

impl Traced for Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::UpsertRun(_) => "run_upsert",
            Operation::Progress(_) => "run_progress",
            Operation::Complete(_) => "run_complete",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("run_id", self.run_id().to_string())];
        match self {
            Operation::UpsertRun(run) => {
                fields.push(("status", run.status.to_string()));
                fields.push(("phase", run.phase.to_string()));
            }
            Operation::Progress(progress) => {
                if let Some(phase) = progress.phase {
                    fields.push(("phase", phase.to_string()));
                }
            }
            Operation::Complete(completion) => {
                fields.push(("success", completion.success.to_string()));
                if let Some(error) = &completion.error_message {
                    fields.push(("error", error.clone()));
                }
            }
        }
        fields
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
