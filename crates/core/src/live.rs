// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live state machine for the current processing run
//!
//! `LiveState` mirrors the most recent run together with transient fields
//! the run store never sees (current symbol, ETA, per-stage detail). Each
//! engine event yields a new state and, when the event belongs to a run, the
//! operation that persists it.

use crate::event::{EngineEvent, ProgressReport, StageEventKind};
use crate::operation::Operation;
use crate::phase::{ProcessingPhase, Stage};
use crate::run::{
    Completion, CounterUpdate, ProcessingRun, ProgressRecord, RunCounters, RunStatus, TriggerType,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// In-memory view of the current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveState {
    pub is_running: bool,
    pub run_id: Option<String>,
    pub status: Option<RunStatus>,
    pub phase: ProcessingPhase,
    /// Percent complete, 0..=100, never decreasing within a run
    pub progress: f64,
    pub current_symbol: Option<String>,
    pub eta_seconds: Option<u64>,
    #[serde(flatten)]
    pub counters: RunCounters,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    /// Detail objects keyed by stage name
    pub phase_details: BTreeMap<String, Value>,
    pub last_event_at: Option<DateTime<Utc>>,
    pub trigger_type: Option<TriggerType>,
    pub next_scheduled_run: Option<String>,
}

impl Default for LiveState {
    fn default() -> Self {
        Self::idle()
    }
}

impl LiveState {
    pub fn idle() -> Self {
        Self {
            is_running: false,
            run_id: None,
            status: None,
            phase: ProcessingPhase::Idle,
            progress: 0.0,
            current_symbol: None,
            eta_seconds: None,
            counters: RunCounters::default(),
            started_at: None,
            completed_at: None,
            duration_seconds: None,
            error_message: None,
            phase_details: BTreeMap::new(),
            last_event_at: None,
            trigger_type: None,
            next_scheduled_run: None,
        }
    }

    /// True once any run has been observed
    pub fn has_run(&self) -> bool {
        self.run_id.is_some()
    }

    /// Fresh state for a new run. The schedule hint survives the reset.
    fn begin(&self, run_id: Option<String>, now: DateTime<Utc>) -> LiveState {
        LiveState {
            run_id,
            started_at: Some(now),
            next_scheduled_run: self.next_scheduled_run.clone(),
            ..LiveState::idle()
        }
    }

    fn is_current(&self, run_id: Option<&str>) -> bool {
        match run_id {
            Some(id) => self.run_id.as_deref() == Some(id),
            None => true,
        }
    }

    /// Another run is in flight and the event is for a different one
    fn belongs_elsewhere(&self, run_id: Option<&str>) -> bool {
        self.is_running && !self.is_current(run_id)
    }

    /// Run the event applies to: its own id, else the current run
    fn target(&self, run_id: Option<&str>) -> Option<String> {
        run_id.map(str::to_string).or_else(|| self.run_id.clone())
    }

    fn elapsed_since_start(&self, now: DateTime<Utc>) -> Option<f64> {
        self.started_at
            .map(|start| ((now - start).num_milliseconds() as f64 / 1000.0).max(0.0))
    }

    /// Apply an engine event.
    ///
    /// Returns the next state and the persistence operation, if any. Events
    /// for a run other than the one in flight are persisted but leave the
    /// state untouched.
    pub fn transition(
        &self,
        event: &EngineEvent,
        now: DateTime<Utc>,
    ) -> (LiveState, Option<Operation>) {
        match event {
            EngineEvent::RunRequested {
                run_id,
                trigger_type,
                parameters,
            } => {
                // The engine's own events may already have moved this run on
                if self.is_current(Some(run_id)) && self.status != Some(RunStatus::Pending) {
                    return (self.clone(), None);
                }
                let state = LiveState {
                    is_running: true,
                    status: Some(RunStatus::Pending),
                    phase: ProcessingPhase::Scheduled,
                    trigger_type: Some(*trigger_type),
                    last_event_at: Some(now),
                    ..self.begin(Some(run_id.clone()), now)
                };
                let mut run = ProcessingRun::new(
                    run_id.clone(),
                    *trigger_type,
                    RunStatus::Pending,
                    ProcessingPhase::Scheduled,
                    now,
                );
                if !parameters.is_null() {
                    run = run.with_metadata(json!({ "parameters": parameters }));
                }
                (state, Some(Operation::UpsertRun(run)))
            }

            EngineEvent::ProcessingStarted {
                run_id,
                trigger_type,
                started_at,
                report,
            } => {
                let replays_finished = run_id.is_some()
                    && self.is_current(run_id.as_deref())
                    && self.status.is_some_and(|status| status.is_terminal());
                let run_id = self.target(run_id.as_deref());
                let carried_trigger = if self.is_current(run_id.as_deref()) {
                    self.trigger_type
                } else {
                    None
                };
                let trigger = trigger_type
                    .or(carried_trigger)
                    .unwrap_or(TriggerType::Automatic);
                let started_at = started_at.unwrap_or(now);

                let mut counters = RunCounters::default();
                counters.merge(&report.counters);
                let op = run_id.clone().map(|id| {
                    Operation::UpsertRun(
                        ProcessingRun::new(
                            id,
                            trigger,
                            RunStatus::Running,
                            ProcessingPhase::Scheduled,
                            started_at,
                        )
                        .with_counters(counters),
                    )
                });
                // A finished run stays finished; the store decides on the upsert
                if replays_finished {
                    let state = LiveState {
                        last_event_at: Some(now),
                        ..self.clone()
                    };
                    return (state, op);
                }
                let state = LiveState {
                    is_running: true,
                    status: Some(RunStatus::Running),
                    phase: ProcessingPhase::Scheduled,
                    counters,
                    current_symbol: report.current_symbol.clone(),
                    eta_seconds: report.eta_seconds,
                    started_at: Some(started_at),
                    trigger_type: Some(trigger),
                    last_event_at: Some(now),
                    ..self.begin(run_id.clone(), now)
                };
                (state, op)
            }

            EngineEvent::ProcessingProgress(report) => {
                if self.target(report.run_id.as_deref()).is_none() {
                    return (self.clone(), None);
                }
                let op = self.progress_op(report, None, None, now);
                if self.belongs_elsewhere(report.run_id.as_deref()) {
                    return (self.clone(), op);
                }
                let mut state = self.adopt(report.run_id.as_deref(), now);
                if state.phase.is_terminal() {
                    return (self.clone(), op);
                }
                state.absorb(report);
                if let Some(progress) = report.progress {
                    state.progress = state.progress.max(progress.clamp(0.0, 100.0));
                }
                state.last_event_at = Some(now);
                (state, op)
            }

            EngineEvent::Stage {
                stage,
                kind,
                report,
            } => {
                if self.target(report.run_id.as_deref()).is_none() {
                    return (self.clone(), None);
                }
                let detail = stage_detail(*kind, report, now);
                let phase = (*kind == StageEventKind::Started).then(|| stage.phase());
                let metadata = json!({ "phase_details": { stage.as_str(): detail.clone() } });
                let op = self.progress_op(report, phase, Some(metadata), now);
                if self.belongs_elsewhere(report.run_id.as_deref()) {
                    return (self.clone(), op);
                }
                let mut state = self.adopt(report.run_id.as_deref(), now);
                if state.phase.is_terminal() {
                    return (self.clone(), op);
                }
                state.absorb(report);
                if let Some(phase) = phase {
                    state.phase = phase;
                }
                state.merge_detail(*stage, detail);
                state.last_event_at = Some(now);
                (state, op)
            }

            EngineEvent::ProcessingCompleted {
                run_id,
                duration_seconds,
                success,
                error_message,
                counters,
            } => {
                let success = *success != Some(false);
                let op = self.target(run_id.as_deref()).map(|id| {
                    Operation::Complete(Completion {
                        run_id: id,
                        success,
                        phase: ProcessingPhase::Completed,
                        completed_at: now,
                        duration_seconds: *duration_seconds,
                        counters: *counters,
                        error_message: error_message.clone(),
                    })
                });
                if self.belongs_elsewhere(run_id.as_deref()) {
                    return (self.clone(), op);
                }
                let mut state = self.adopt(run_id.as_deref(), now);
                state.counters.merge(counters);
                state.finish(
                    ProcessingPhase::Completed,
                    if success {
                        RunStatus::Success
                    } else {
                        RunStatus::Failed
                    },
                    *duration_seconds,
                    now,
                );
                state.progress = 100.0;
                if error_message.is_some() {
                    state.error_message = error_message.clone();
                }
                (state, op)
            }

            EngineEvent::ProcessingError {
                run_id,
                error_message,
                ..
            } => {
                let op = self.target(run_id.as_deref()).map(|id| {
                    Operation::Complete(Completion {
                        run_id: id,
                        success: false,
                        phase: ProcessingPhase::Error,
                        completed_at: now,
                        duration_seconds: None,
                        counters: CounterUpdate::default(),
                        error_message: Some(error_message.clone()),
                    })
                });
                if self.belongs_elsewhere(run_id.as_deref()) {
                    return (self.clone(), op);
                }
                let mut state = self.adopt(run_id.as_deref(), now);
                state.finish(ProcessingPhase::Error, RunStatus::Failed, None, now);
                state.error_message = Some(error_message.clone());
                (state, op)
            }

            EngineEvent::ScheduleUpdated { next_run } => {
                let state = LiveState {
                    next_scheduled_run: next_run.clone(),
                    ..self.clone()
                };
                (state, None)
            }

            EngineEvent::Unknown { .. } => (self.clone(), None),
        }
    }

    /// State for an event about `run_id` when no other run is in flight.
    ///
    /// A run first seen mid-flight replaces an idle or finished state.
    fn adopt(&self, run_id: Option<&str>, now: DateTime<Utc>) -> LiveState {
        if self.is_current(run_id) {
            return self.clone();
        }
        LiveState {
            is_running: true,
            status: Some(RunStatus::Running),
            phase: ProcessingPhase::Scheduled,
            ..self.begin(run_id.map(str::to_string), now)
        }
    }

    fn absorb(&mut self, report: &ProgressReport) {
        self.is_running = true;
        self.status = Some(self.status.unwrap_or(RunStatus::Running).advance(RunStatus::Running));
        self.counters.merge(&report.counters);
        if report.current_symbol.is_some() {
            self.current_symbol = report.current_symbol.clone();
        }
        if report.eta_seconds.is_some() {
            self.eta_seconds = report.eta_seconds;
        }
    }

    fn finish(
        &mut self,
        phase: ProcessingPhase,
        status: RunStatus,
        duration_seconds: Option<f64>,
        now: DateTime<Utc>,
    ) {
        self.is_running = false;
        self.phase = phase;
        self.status = Some(status);
        self.completed_at = Some(now);
        self.duration_seconds = duration_seconds.or_else(|| self.elapsed_since_start(now));
        self.current_symbol = None;
        self.eta_seconds = None;
        self.last_event_at = Some(now);
    }

    fn merge_detail(&mut self, stage: Stage, detail: Value) {
        let entry = self
            .phase_details
            .entry(stage.as_str().to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        crate::run::merge_metadata(entry, &detail);
    }

    fn progress_op(
        &self,
        report: &ProgressReport,
        phase: Option<ProcessingPhase>,
        metadata: Option<Value>,
        now: DateTime<Utc>,
    ) -> Option<Operation> {
        self.target(report.run_id.as_deref()).map(|id| {
            Operation::Progress(ProgressRecord {
                run_id: id,
                phase,
                counters: report.counters,
                metadata,
                updated_at: now,
            })
        })
    }
}

fn stage_detail(kind: StageEventKind, report: &ProgressReport, now: DateTime<Utc>) -> Value {
    let mut detail = report.detail.clone();
    match kind {
        StageEventKind::Started => {
            detail.insert("status".to_string(), json!("running"));
            detail.insert("started_at".to_string(), json!(now));
        }
        StageEventKind::Progress => {
            detail.insert("status".to_string(), json!("running"));
        }
        StageEventKind::Completed => {
            detail.insert("status".to_string(), json!("completed"));
            detail.insert("completed".to_string(), json!(true));
            detail.insert("completed_at".to_string(), json!(now));
        }
    }
    if let Some(progress) = report.progress {
        detail.insert("progress".to_string(), json!(progress.clamp(0.0, 100.0)));
    }
    Value::Object(detail)
}

#[cfg(test)]
#[path = "live_tests.rs"]
mod tests;
