// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status facade: the dashboard's read path
//!
//! Every query cascades engine HTTP → live state → run store and answers with
//! the first source that responds. Nothing here returns an error; total
//! unavailability is an explicit snapshot with `available = false`.

use crate::dispatcher::{CommandDispatcher, EngineHealth, ScheduleView};
use crate::tracker::{IngestorStats, LiveStateReader};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use ts_adapters::{EngineApi, PubSub};
use ts_core::{Clock, IdGen, LiveState, ProcessingRun};
use ts_storage::{RunStore, RunSummary};

/// Which source answered a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Engine,
    Live,
    Store,
    Unavailable,
}

/// Best-effort status of the current run.
///
/// `status` holds the fields of whichever source answered, flattened next to
/// the availability markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub available: bool,
    pub source: StatusSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub status: Map<String, Value>,
}

impl StatusSnapshot {
    fn new(source: StatusSource, status: Value, message: Option<String>) -> Self {
        let mut status = match status {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for reserved in ["available", "source", "message"] {
            status.remove(reserved);
        }
        Self {
            available: source != StatusSource::Unavailable,
            source,
            message,
            status,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.status.get(key)
    }

    pub fn is_running(&self) -> bool {
        self.get("is_running")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn run_id(&self) -> Option<&str> {
        self.get("run_id").and_then(Value::as_str)
    }

    pub fn phase(&self) -> Option<&str> {
        self.get("phase").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryView {
    pub available: bool,
    pub source: StatusSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub runs: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryView {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub summary: RunSummary,
}

/// Combined health of the engine, the ingestor and the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub engine: EngineHealth,
    pub ingestor: IngestorStats,
    pub store_ok: bool,
    pub store_error: Option<String>,
}

/// Merged read path over dispatcher, live state and run store
pub struct StatusFacade<A, P, C, I> {
    dispatcher: Arc<CommandDispatcher<A, P, C, I>>,
    live: LiveStateReader,
    store: Arc<dyn RunStore>,
}

impl<A, P, C, I> StatusFacade<A, P, C, I>
where
    A: EngineApi,
    P: PubSub,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<A, P, C, I>>,
        live: LiveStateReader,
        store: Arc<dyn RunStore>,
    ) -> Self {
        Self {
            dispatcher,
            live,
            store,
        }
    }

    /// Status of the current run from the first source that answers
    pub fn current_status(&self) -> StatusSnapshot {
        let engine_error = match self.dispatcher.fetch_status() {
            Ok(status) => return StatusSnapshot::new(StatusSource::Engine, status, None),
            Err(e) => e,
        };
        tracing::debug!(error = %engine_error, "engine status unavailable");

        let live = self.live.snapshot();
        if live.has_run() {
            return StatusSnapshot::new(
                StatusSource::Live,
                live_status(&live),
                Some(format!("engine status unavailable: {engine_error}")),
            );
        }

        // Nothing seen yet; ask the engine to re-broadcast for next time
        let requested = self.dispatcher.request_status();
        tracing::debug!(delivered = requested.success, "requested status broadcast");

        let store_error = match self.store.latest_run() {
            Ok(Some(run)) => {
                return StatusSnapshot::new(
                    StatusSource::Store,
                    run_status(&run),
                    Some(format!("engine status unavailable: {engine_error}")),
                )
            }
            Ok(None) => "no runs recorded".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "run store unavailable");
                e.to_string()
            }
        };

        StatusSnapshot::new(
            StatusSource::Unavailable,
            live_status(&live),
            Some(format!(
                "status unknown: engine unavailable ({engine_error}); store: {store_error}"
            )),
        )
    }

    /// Recent runs, newest first
    pub fn history(&self, days: u32, limit: u32) -> HistoryView {
        let engine_error = match self.dispatcher.fetch_history(days, limit) {
            Ok(runs) => {
                return HistoryView {
                    available: true,
                    source: StatusSource::Engine,
                    message: None,
                    runs,
                }
            }
            Err(e) => e,
        };
        tracing::debug!(error = %engine_error, "engine history unavailable");

        let live = self.live.snapshot();
        let live_run = live.has_run().then(|| live_status(&live));
        let message = Some(format!("engine history unavailable: {engine_error}"));

        match self.store.list_recent(days, limit) {
            Ok(rows) => {
                let mut runs: Vec<Value> = rows.iter().map(run_status).collect();
                if let Some(current) = live_run {
                    let stored = rows.iter().any(|row| Some(&row.run_id) == live.run_id.as_ref());
                    if !stored {
                        runs.insert(0, current);
                        runs.truncate(limit as usize);
                    }
                }
                HistoryView {
                    available: true,
                    source: StatusSource::Store,
                    message,
                    runs,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "run store unavailable");
                match live_run {
                    Some(current) => HistoryView {
                        available: true,
                        source: StatusSource::Live,
                        message: Some(format!(
                            "engine history unavailable: {engine_error}; store: {e}"
                        )),
                        runs: vec![current],
                    },
                    None => HistoryView {
                        available: false,
                        source: StatusSource::Unavailable,
                        message: Some(format!(
                            "history unknown: engine unavailable ({engine_error}); store: {e}"
                        )),
                        runs: Vec::new(),
                    },
                }
            }
        }
    }

    /// Run statistics over the last `days`
    pub fn summary(&self, days: u32) -> SummaryView {
        match self.store.summary(days) {
            Ok(summary) => SummaryView {
                available: true,
                message: None,
                summary,
            },
            Err(e) => {
                tracing::warn!(error = %e, "run store unavailable");
                SummaryView {
                    available: false,
                    message: Some(e.to_string()),
                    summary: RunSummary {
                        days,
                        ..RunSummary::default()
                    },
                }
            }
        }
    }

    pub fn schedule(&self) -> ScheduleView {
        self.dispatcher.fetch_schedule()
    }

    pub fn health(&self) -> HealthReport {
        let (store_ok, store_error) = match self.store.check() {
            Ok(()) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        };
        HealthReport {
            engine: self.dispatcher.health(),
            ingestor: self.live.stats(),
            store_ok,
            store_error,
        }
    }
}

/// Dashboard view of the live state
fn live_status(live: &LiveState) -> Value {
    let mut status = match serde_json::to_value(live) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    // Older dashboards read the processed count under this name
    status.insert(
        "symbols_completed".to_string(),
        json!(live.counters.symbols_processed),
    );
    Value::Object(status)
}

/// Dashboard view of a stored run
fn run_status(run: &ProcessingRun) -> Value {
    let mut status = match serde_json::to_value(run) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    status.insert("is_running".to_string(), json!(!run.status.is_terminal()));
    status.insert(
        "symbols_completed".to_string(),
        json!(run.counters.symbols_processed),
    );
    Value::Object(status)
}

#[cfg(test)]
#[path = "facade_tests.rs"]
mod tests;
