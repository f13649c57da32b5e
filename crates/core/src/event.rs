// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine events and their wire decoding
//!
//! Messages are JSON objects. The event type comes from `type`, `event_type`
//! or `event`, falling back to the type implied by the channel. Fields are
//! read from the `data` object when present, otherwise from the message
//! itself. Field names vary between engine releases, so each value is looked
//! up under a short list of aliases.

use crate::channel::EventTopic;
use crate::phase::{ProcessingPhase, Stage};
use crate::run::{CounterUpdate, TriggerType};
use crate::traced::Traced;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors decoding an engine message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("malformed event: {0}")]
    Malformed(String),
    #[error("event payload is not a JSON object")]
    NotAnObject,
    #[error("event has no type and its channel does not imply one")]
    MissingType,
}

/// Sub-event of an engine stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEventKind {
    Started,
    Progress,
    Completed,
}

impl StageEventKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(StageEventKind::Started),
            "progress" => Some(StageEventKind::Progress),
            "completed" | "complete" => Some(StageEventKind::Completed),
            _ => None,
        }
    }
}

/// Progress values reported by an event; every field is optional and absolute
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressReport {
    pub run_id: Option<String>,
    /// Percent complete, 0..=100
    pub progress: Option<f64>,
    pub current_symbol: Option<String>,
    pub eta_seconds: Option<u64>,
    pub counters: CounterUpdate,
    /// Remaining payload fields, kept as phase detail
    pub detail: Map<String, Value>,
}

/// Events that drive the run lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A command accepted by a transport; raised locally, never on the wire
    RunRequested {
        run_id: String,
        trigger_type: TriggerType,
        parameters: Value,
    },
    ProcessingStarted {
        run_id: Option<String>,
        trigger_type: Option<TriggerType>,
        started_at: Option<DateTime<Utc>>,
        report: ProgressReport,
    },
    ProcessingProgress(ProgressReport),
    Stage {
        stage: Stage,
        kind: StageEventKind,
        report: ProgressReport,
    },
    ProcessingCompleted {
        run_id: Option<String>,
        duration_seconds: Option<f64>,
        /// Engine may report a completed run that failed overall
        success: Option<bool>,
        error_message: Option<String>,
        counters: CounterUpdate,
    },
    ProcessingError {
        run_id: Option<String>,
        error_message: String,
        phase: Option<ProcessingPhase>,
    },
    ScheduleUpdated {
        next_run: Option<String>,
    },
    Unknown {
        event_type: String,
        run_id: Option<String>,
    },
}

impl EngineEvent {
    /// Decode a message received on a channel of the given topic
    pub fn decode(topic: Option<EventTopic>, payload: &str) -> Result<EngineEvent, EventError> {
        let message: Value =
            serde_json::from_str(payload).map_err(|e| EventError::Malformed(e.to_string()))?;
        let Value::Object(message) = message else {
            return Err(EventError::NotAnObject);
        };

        let raw_type = ["type", "event_type", "event"]
            .iter()
            .find_map(|key| message.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| topic.and_then(|t| t.default_event_type()).map(str::to_string))
            .ok_or(EventError::MissingType)?;
        let event_type = normalize_type(&raw_type, topic);

        let mut fields = match message.get("data") {
            Some(Value::Object(data)) => data.clone(),
            _ => message.clone(),
        };
        if !fields.contains_key("run_id") {
            if let Some(run_id) = message.get("run_id") {
                fields.insert("run_id".to_string(), run_id.clone());
            }
        }

        Ok(Self::from_fields(&event_type, fields))
    }

    fn from_fields(event_type: &str, fields: Map<String, Value>) -> EngineEvent {
        match event_type {
            "processing_started" => EngineEvent::ProcessingStarted {
                run_id: get_string(&fields, &["run_id"]),
                trigger_type: get_string(&fields, &["trigger_type"]).and_then(|t| t.parse().ok()),
                started_at: get_string(&fields, &["started_at", "timestamp"])
                    .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                    .map(|t| t.with_timezone(&Utc)),
                report: ProgressReport::from_fields(fields),
            },
            "processing_progress" => EngineEvent::ProcessingProgress(ProgressReport::from_fields(fields)),
            "processing_completed" => EngineEvent::ProcessingCompleted {
                run_id: get_string(&fields, &["run_id"]),
                duration_seconds: get_duration(&fields, &["duration_seconds", "duration"]),
                success: fields.get("success").and_then(Value::as_bool),
                error_message: get_string(&fields, &["error_message", "error"]),
                counters: counters_from(&fields),
            },
            "processing_error" => EngineEvent::ProcessingError {
                run_id: get_string(&fields, &["run_id"]),
                error_message: get_string(&fields, &["error_message", "error", "message"])
                    .unwrap_or_else(|| "engine reported an error".to_string()),
                phase: get_string(&fields, &["phase"]).and_then(|p| p.parse().ok()),
            },
            "schedule_updated" => EngineEvent::ScheduleUpdated {
                next_run: get_string(&fields, &["next_run", "next_run_time"]),
            },
            other => match stage_event(other) {
                Some((stage, kind)) => EngineEvent::Stage {
                    stage,
                    kind,
                    report: ProgressReport::from_fields(fields),
                },
                None => EngineEvent::Unknown {
                    event_type: other.to_string(),
                    run_id: get_string(&fields, &["run_id"]),
                },
            },
        }
    }

    /// Run the event refers to, when it names one
    pub fn run_id(&self) -> Option<&str> {
        match self {
            EngineEvent::RunRequested { run_id, .. } => Some(run_id),
            EngineEvent::ProcessingStarted { run_id, .. }
            | EngineEvent::ProcessingCompleted { run_id, .. }
            | EngineEvent::ProcessingError { run_id, .. }
            | EngineEvent::Unknown { run_id, .. } => run_id.as_deref(),
            EngineEvent::ProcessingProgress(report) | EngineEvent::Stage { report, .. } => {
                report.run_id.as_deref()
            }
            EngineEvent::ScheduleUpdated { .. } => None,
        }
    }
}

impl Traced for EngineEvent {
    fn name(&self) -> &'static str {
        match self {
            EngineEvent::RunRequested { .. } => "run_requested",
            EngineEvent::ProcessingStarted { .. } => "processing_started",
            EngineEvent::ProcessingProgress(_) => "processing_progress",
            EngineEvent::Stage { kind, .. } => match kind {
                StageEventKind::Started => "stage_started",
                StageEventKind::Progress => "stage_progress",
                StageEventKind::Completed => "stage_completed",
            },
            EngineEvent::ProcessingCompleted { .. } => "processing_completed",
            EngineEvent::ProcessingError { .. } => "processing_error",
            EngineEvent::ScheduleUpdated { .. } => "schedule_updated",
            EngineEvent::Unknown { .. } => "unknown",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = Vec::new();
        if let Some(run_id) = self.run_id() {
            fields.push(("run_id", run_id.to_string()));
        }
        match self {
            EngineEvent::Stage { stage, .. } => fields.push(("stage", stage.to_string())),
            EngineEvent::Unknown { event_type, .. } => {
                fields.push(("event_type", event_type.clone()))
            }
            _ => {}
        }
        fields
    }
}

impl ProgressReport {
    fn from_fields(mut fields: Map<String, Value>) -> Self {
        let report = ProgressReport {
            run_id: get_string(&fields, &["run_id"]),
            progress: get_f64(&fields, &["progress", "percent", "progress_percent", "percentage"]),
            current_symbol: get_string(&fields, &["current_symbol", "symbol"]),
            eta_seconds: get_u64(&fields, &["eta_seconds", "estimated_time_remaining", "eta"]),
            counters: counters_from(&fields),
            detail: Map::new(),
        };
        for key in ["type", "event_type", "event", "run_id"] {
            fields.remove(key);
        }
        ProgressReport {
            detail: fields,
            ..report
        }
    }
}

fn normalize_type(raw: &str, topic: Option<EventTopic>) -> String {
    let lowered = raw.trim().to_ascii_lowercase().replace(['.', ':', '-'], "_");
    let subject = topic.map(|t| t.segments()[0]).unwrap_or("processing");
    match lowered.as_str() {
        "started" | "start" => format!("{subject}_started"),
        "progress" => format!("{subject}_progress"),
        "completed" | "complete" => format!("{subject}_completed"),
        "error" | "failed" => "processing_error".to_string(),
        "processing_failed" => "processing_error".to_string(),
        "processing_complete" => "processing_completed".to_string(),
        _ => lowered,
    }
}

fn stage_event(event_type: &str) -> Option<(Stage, StageEventKind)> {
    let (prefix, suffix) = event_type.rsplit_once('_')?;
    let stage = match prefix {
        "data_import" => Stage::Import,
        "cache_sync" => Stage::Cache,
        "indicator" => Stage::Indicators,
        "pattern" => Stage::Patterns,
        other => Stage::from_prefix(other)?,
    };
    Some((stage, StageEventKind::parse(suffix)?))
}

fn counters_from(fields: &Map<String, Value>) -> CounterUpdate {
    CounterUpdate {
        symbols_total: get_u64(fields, &["total_symbols", "symbols_total"]),
        symbols_processed: get_u64(
            fields,
            &["symbols_processed", "symbols_completed", "processed_symbols"],
        ),
        symbols_failed: get_u64(fields, &["symbols_failed", "failed_symbols"]),
        indicators_total: get_u64(fields, &["indicators_total", "total_indicators"]),
        indicators_processed: get_u64(fields, &["indicators_processed", "indicators_completed"]),
        indicators_failed: get_u64(fields, &["indicators_failed", "failed_indicators"]),
    }
}

fn lookup<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
}

fn get_string(fields: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match lookup(fields, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn get_f64(fields: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    let value = match lookup(fields, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

/// Longest run duration taken from the engine; anything beyond is dropped
const MAX_DURATION_SECONDS: f64 = 366.0 * 24.0 * 3600.0;

fn get_duration(fields: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    get_f64(fields, keys).filter(|v| (0.0..=MAX_DURATION_SECONDS).contains(v))
}

fn get_u64(fields: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    if let Some(n) = lookup(fields, keys)?.as_u64() {
        return Some(n);
    }
    get_f64(fields, keys)
        .filter(|v| *v >= 0.0)
        .map(|v| v as u64)
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
