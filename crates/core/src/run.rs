// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processing run records and their lifecycle rules
//!
//! A `ProcessingRun` is the persisted view of one execution of the engine's
//! pipeline. Status only moves forward (pending → running → success|failed)
//! and a terminal run refuses further writes.

use crate::phase::ProcessingPhase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Outcome status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Success | RunStatus::Failed)
    }

    /// Position in the forward-only lifecycle
    fn rank(&self) -> u8 {
        match self {
            RunStatus::Pending => 0,
            RunStatus::Running => 1,
            RunStatus::Success | RunStatus::Failed => 2,
        }
    }

    /// The later of two statuses; never moves a run backwards
    pub fn advance(self, next: RunStatus) -> RunStatus {
        if next.rank() >= self.rank() {
            next
        } else {
            self
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "running" => Ok(RunStatus::Running),
            "success" | "completed" => Ok(RunStatus::Success),
            "failed" | "error" => Ok(RunStatus::Failed),
            other => Err(RunError::InvalidField {
                field: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// How a run was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Manual,
    #[default]
    Automatic,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Manual => "manual",
            TriggerType::Automatic => "automatic",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerType {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(TriggerType::Manual),
            "automatic" | "scheduled" => Ok(TriggerType::Automatic),
            other => Err(RunError::InvalidField {
                field: "trigger_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Errors from run lifecycle rules
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunError {
    #[error("run {run_id} is already {status}; refusing further writes")]
    Terminal { run_id: String, status: RunStatus },
    #[error("operation for run {actual} applied to run {expected}")]
    Mismatch { expected: String, actual: String },
    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Symbol and indicator counters of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunCounters {
    pub symbols_total: u64,
    pub symbols_processed: u64,
    pub symbols_failed: u64,
    pub indicators_total: u64,
    pub indicators_processed: u64,
    pub indicators_failed: u64,
}

impl RunCounters {
    /// Overwrite the counters the update carries; leave the rest alone
    pub fn merge(&mut self, update: &CounterUpdate) {
        let fields = [
            (&mut self.symbols_total, update.symbols_total),
            (&mut self.symbols_processed, update.symbols_processed),
            (&mut self.symbols_failed, update.symbols_failed),
            (&mut self.indicators_total, update.indicators_total),
            (&mut self.indicators_processed, update.indicators_processed),
            (&mut self.indicators_failed, update.indicators_failed),
        ];
        for (slot, value) in fields {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}

/// Partial counter values reported by a single event (absolute, not deltas)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterUpdate {
    pub symbols_total: Option<u64>,
    pub symbols_processed: Option<u64>,
    pub symbols_failed: Option<u64>,
    pub indicators_total: Option<u64>,
    pub indicators_processed: Option<u64>,
    pub indicators_failed: Option<u64>,
}

impl CounterUpdate {
    pub fn is_empty(&self) -> bool {
        *self == CounterUpdate::default()
    }
}

/// Persisted metadata of one processing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingRun {
    pub run_id: String,
    pub trigger_type: TriggerType,
    pub status: RunStatus,
    pub phase: ProcessingPhase,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    #[serde(flatten)]
    pub counters: RunCounters,
    pub error_message: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingRun {
    /// Create a new run record
    pub fn new(
        run_id: impl Into<String>,
        trigger_type: TriggerType,
        status: RunStatus,
        phase: ProcessingPhase,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            trigger_type,
            status,
            phase,
            started_at,
            completed_at: None,
            duration_seconds: None,
            counters: RunCounters::default(),
            error_message: None,
            metadata: serde_json::Value::Null,
            created_at: started_at,
            updated_at: started_at,
        }
    }

    pub fn with_counters(mut self, counters: RunCounters) -> Self {
        self.counters = counters;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_writable(&self) -> Result<(), RunError> {
        if self.is_terminal() {
            return Err(RunError::Terminal {
                run_id: self.run_id.clone(),
                status: self.status,
            });
        }
        Ok(())
    }

    fn ensure_same(&self, run_id: &str) -> Result<(), RunError> {
        if self.run_id != run_id {
            return Err(RunError::Mismatch {
                expected: self.run_id.clone(),
                actual: run_id.to_string(),
            });
        }
        Ok(())
    }

    /// Merge a full insert-or-update into this record.
    ///
    /// Re-running the upsert for the same run resets `started_at`. The status
    /// never regresses and a manual trigger is never downgraded.
    pub fn upsert(&mut self, incoming: &ProcessingRun) -> Result<(), RunError> {
        self.ensure_same(&incoming.run_id)?;
        self.ensure_writable()?;

        self.status = self.status.advance(incoming.status);
        if incoming.trigger_type == TriggerType::Manual {
            self.trigger_type = TriggerType::Manual;
        }
        self.phase = incoming.phase;
        self.started_at = incoming.started_at;
        self.counters = incoming.counters;
        self.error_message = incoming.error_message.clone();
        merge_metadata(&mut self.metadata, &incoming.metadata);
        self.updated_at = incoming.updated_at;
        Ok(())
    }

    /// Apply a progress update
    pub fn apply_progress(&mut self, progress: &ProgressRecord) -> Result<(), RunError> {
        self.ensure_same(&progress.run_id)?;
        self.ensure_writable()?;

        self.status = self.status.advance(RunStatus::Running);
        if let Some(phase) = progress.phase {
            self.phase = phase;
        }
        self.counters.merge(&progress.counters);
        if let Some(metadata) = &progress.metadata {
            merge_metadata(&mut self.metadata, metadata);
        }
        self.updated_at = progress.updated_at;
        Ok(())
    }

    /// Finalize the run. `completed_at` is written exactly once.
    pub fn complete(&mut self, completion: &Completion) -> Result<(), RunError> {
        self.ensure_same(&completion.run_id)?;
        self.ensure_writable()?;

        self.status = if completion.success {
            RunStatus::Success
        } else {
            RunStatus::Failed
        };
        self.phase = completion.phase;
        self.completed_at = Some(completion.completed_at);
        let elapsed = (completion.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0;
        self.duration_seconds = Some(completion.duration_seconds.unwrap_or(elapsed).max(0.0));
        self.counters.merge(&completion.counters);
        if completion.error_message.is_some() {
            self.error_message = completion.error_message.clone();
        }
        self.updated_at = completion.completed_at;
        Ok(())
    }
}

/// Progress update for an existing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub run_id: String,
    pub phase: Option<ProcessingPhase>,
    pub counters: CounterUpdate,
    pub metadata: Option<serde_json::Value>,
    pub updated_at: DateTime<Utc>,
}

/// Terminal outcome of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub run_id: String,
    pub success: bool,
    pub phase: ProcessingPhase,
    pub completed_at: DateTime<Utc>,
    /// Engine-reported duration; computed from `started_at` when absent
    pub duration_seconds: Option<f64>,
    pub counters: CounterUpdate,
    pub error_message: Option<String>,
}

/// Shallow-merge JSON objects; anything else is replaced unless `incoming` is null
pub fn merge_metadata(target: &mut serde_json::Value, incoming: &serde_json::Value) {
    match (target.as_object_mut(), incoming.as_object()) {
        (Some(existing), Some(update)) => {
            for (key, value) in update {
                existing.insert(key.clone(), value.clone());
            }
        }
        _ if !incoming.is_null() => *target = incoming.clone(),
        _ => {}
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
