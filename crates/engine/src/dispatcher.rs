// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command dispatcher: operator intents to HTTP calls or pub-sub broadcasts
//!
//! HTTP is tried first. A network failure falls back to publishing the
//! command on every alias of its topic; an HTTP answer with an error status
//! is the engine refusing and is returned as is. Commands never return `Err`:
//! every outcome is a [`CommandResult`].

use crate::error::DispatchError;
use crate::ingestor::IngestorHandle;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;
use ts_adapters::{ApiError, ApiResponse, EngineApi, Endpoint, PubSub};
use ts_core::{
    ChannelNames, Clock, Command, CommandName, EngineEvent, IdGen, Schedule, Stage, Traced,
    TriggerType,
};
use ts_storage::ScheduleStore;

/// Source tag stamped on outgoing commands
pub const DEFAULT_SOURCE: &str = "tickstock-orchestrator";

/// Transport that carried a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    Http,
    PubSub,
    /// Kept locally because the engine could not be reached
    Local,
}

/// Normalized outcome of a command.
///
/// `success` means a transport accepted delivery, not that the engine acted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub run_id: Option<String>,
    pub message: String,
    pub transport: Option<Transport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DispatchError>,
}

impl CommandResult {
    fn accepted(transport: Transport, run_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            run_id,
            message: message.into(),
            transport: Some(transport),
            warning: None,
            error: None,
        }
    }

    fn failed(error: DispatchError, run_id: Option<String>) -> Self {
        Self {
            success: false,
            run_id,
            message: error.to_string(),
            transport: None,
            warning: None,
            error: Some(error),
        }
    }

    fn with_warning(mut self, warning: String) -> Self {
        self.warning = Some(warning);
        self
    }
}

/// Parameters of a full pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRequest {
    /// Stages to run; all of them when absent
    #[serde(default)]
    pub phases: Option<Vec<Stage>>,
    #[serde(default)]
    pub skip_market_check: bool,
    #[serde(default)]
    pub universe: Option<String>,
}

/// Where a schedule came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleSource {
    Engine,
    Local,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleView {
    pub schedule: Schedule,
    pub source: ScheduleSource,
    /// False when neither the engine nor a local copy answered
    pub available: bool,
    pub warning: Option<String>,
}

/// Result of probing the engine's health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineHealth {
    pub reachable: bool,
    pub status: Option<String>,
    pub latency_ms: u64,
    pub message: Option<String>,
}

/// Sends operator commands to the processing engine
pub struct CommandDispatcher<A, P, C, I> {
    api: A,
    pubsub: P,
    clock: C,
    ids: I,
    channels: ChannelNames,
    source: String,
    schedules: Arc<dyn ScheduleStore>,
    ingestor: Option<IngestorHandle>,
}

impl<A, P, C, I> CommandDispatcher<A, P, C, I>
where
    A: EngineApi,
    P: PubSub,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        api: A,
        pubsub: P,
        clock: C,
        ids: I,
        channels: ChannelNames,
        schedules: Arc<dyn ScheduleStore>,
    ) -> Self {
        Self {
            api,
            pubsub,
            clock,
            ids,
            channels,
            source: DEFAULT_SOURCE.to_string(),
            schedules,
            ingestor: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Report accepted runs to the ingestor so the live state shows them at once
    pub fn with_ingestor(mut self, handle: IngestorHandle) -> Self {
        self.ingestor = Some(handle);
        self
    }

    /// Start a full pipeline run
    pub fn trigger(&self, request: &TriggerRequest) -> CommandResult {
        let mut parameters = Map::new();
        if let Some(phases) = &request.phases {
            parameters.insert("phases".to_string(), json!(phases));
        }
        parameters.insert(
            "skip_market_check".to_string(),
            json!(request.skip_market_check),
        );
        if let Some(universe) = &request.universe {
            parameters.insert("universe".to_string(), json!(universe));
        }
        self.start_run(CommandName::TriggerProcessing, Value::Object(parameters))
    }

    /// Run only the import stage
    pub fn trigger_import(
        &self,
        symbols: Option<Vec<String>>,
        universe: Option<String>,
    ) -> CommandResult {
        let mut parameters = Map::new();
        parameters.insert("phase".to_string(), json!(Stage::Import));
        if let Some(symbols) = symbols {
            parameters.insert("symbols".to_string(), json!(symbols));
        }
        if let Some(universe) = universe {
            parameters.insert("universe".to_string(), json!(universe));
        }
        self.start_run(CommandName::TriggerImport, Value::Object(parameters))
    }

    /// Run only the indicator stage
    pub fn trigger_indicators(&self, symbols: Option<Vec<String>>) -> CommandResult {
        let mut parameters = Map::new();
        parameters.insert("phase".to_string(), json!(Stage::Indicators));
        if let Some(symbols) = symbols {
            parameters.insert("symbols".to_string(), json!(symbols));
        }
        self.start_run(CommandName::TriggerIndicators, Value::Object(parameters))
    }

    /// Ask the engine to stop a run; the current one when `run_id` is absent
    pub fn cancel(&self, run_id: Option<&str>) -> CommandResult {
        let command = self.command(
            CommandName::CancelProcessing,
            run_id.map(str::to_string),
            Value::Null,
        );
        self.send(&command)
    }

    /// Ask the engine to retry the failed symbols of a run
    pub fn retry_failed(&self, run_id: &str, symbols: Option<Vec<String>>) -> CommandResult {
        let parameters = match symbols {
            Some(symbols) => json!({ "symbols": symbols }),
            None => Value::Null,
        };
        let command = self.command(
            CommandName::RetryFailed,
            Some(run_id.to_string()),
            parameters,
        );
        self.send(&command)
    }

    /// Ask the engine to re-broadcast its state on the status channels
    pub fn request_status(&self) -> CommandResult {
        let command = self.command(CommandName::RequestStatus, None, Value::Null);
        let span = tracing::info_span!("dispatch", command = command.name());
        let _guard = span.enter();

        match self.broadcast(&command) {
            Ok(receivers) if receivers > 0 => CommandResult::accepted(
                Transport::PubSub,
                None,
                format!("status requested from {receivers} subscriber(s)"),
            ),
            Ok(_) => CommandResult::failed(
                DispatchError::Undelivered(command.command.topic().segments().join(":")),
                None,
            ),
            Err(reason) => CommandResult::failed(DispatchError::Undelivered(reason), None),
        }
    }

    /// Engine's own view of the current run
    pub fn fetch_status(&self) -> Result<Value, DispatchError> {
        let body = expect_success(self.api.status())?;
        match body {
            Value::Object(_) => Ok(body),
            other => Err(DispatchError::Malformed(format!(
                "status is not an object: {other}"
            ))),
        }
    }

    /// Engine's run history, newest first
    pub fn fetch_history(&self, days: u32, limit: u32) -> Result<Vec<Value>, DispatchError> {
        let body = expect_success(self.api.history(days, limit))?;
        let runs = match body {
            Value::Array(runs) => runs,
            Value::Object(mut object) => match ["runs", "history"]
                .iter()
                .find_map(|key| object.remove(*key))
            {
                Some(Value::Array(runs)) => runs,
                _ => {
                    return Err(DispatchError::Malformed(
                        "history has no runs array".to_string(),
                    ))
                }
            },
            other => {
                return Err(DispatchError::Malformed(format!(
                    "history is not a list: {other}"
                )))
            }
        };
        Ok(runs.into_iter().take(limit as usize).collect())
    }

    /// The engine's schedule, else the local copy, else the default
    pub fn fetch_schedule(&self) -> ScheduleView {
        let warning = match expect_success(self.api.schedule()) {
            Ok(body) => match Schedule::from_value(&body) {
                Ok(schedule) => {
                    if let Err(e) = self.schedules.save_schedule(&schedule) {
                        tracing::warn!(error = %e, "failed to cache engine schedule");
                    }
                    return ScheduleView {
                        schedule,
                        source: ScheduleSource::Engine,
                        available: true,
                        warning: None,
                    };
                }
                Err(e) => DispatchError::Malformed(e.to_string()).to_string(),
            },
            Err(e) => e.to_string(),
        };

        match self.schedules.load_schedule() {
            Ok(Some(schedule)) => ScheduleView {
                schedule,
                source: ScheduleSource::Local,
                available: true,
                warning: Some(format!("{warning}; showing local copy")),
            },
            Ok(None) => ScheduleView {
                schedule: Schedule::default(),
                source: ScheduleSource::Default,
                available: false,
                warning: Some(format!("{warning}; no local copy, showing defaults")),
            },
            Err(e) => {
                tracing::warn!(error = %e, "failed to load local schedule");
                ScheduleView {
                    schedule: Schedule::default(),
                    source: ScheduleSource::Default,
                    available: false,
                    warning: Some(format!("{warning}; local copy unreadable: {e}")),
                }
            }
        }
    }

    /// Send a new schedule to the engine, keeping it locally when the engine is away
    pub fn update_schedule(&self, schedule: &Schedule) -> CommandResult {
        let span = tracing::info_span!("dispatch", command = "update_schedule");
        let _guard = span.enter();

        if let Err(e) = schedule.validate() {
            return CommandResult::failed(DispatchError::Invalid(e.to_string()), None);
        }
        let body = match serde_json::to_value(schedule) {
            Ok(body) => body,
            Err(e) => return CommandResult::failed(DispatchError::Invalid(e.to_string()), None),
        };

        match self.api.update_schedule(&body) {
            Ok(response) if response.is_success() => {
                if let Err(e) = self.schedules.save_schedule(schedule) {
                    tracing::warn!(error = %e, "failed to cache engine schedule");
                }
                tracing::info!(run_time = %schedule.run_time, "schedule updated");
                CommandResult::accepted(
                    Transport::Http,
                    None,
                    response
                        .message()
                        .unwrap_or_else(|| "schedule updated".to_string()),
                )
            }
            Ok(response) => CommandResult::failed(refusal(&response), None),
            Err(http) => match self.schedules.save_schedule(schedule) {
                Ok(()) => {
                    tracing::warn!(error = %http, "engine unreachable; schedule saved locally");
                    CommandResult::accepted(Transport::Local, None, "schedule saved locally")
                        .with_warning(format!(
                            "engine unreachable ({http}); saved locally, the engine has not seen it"
                        ))
                }
                Err(e) => CommandResult::failed(
                    DispatchError::TransportUnavailable {
                        http: http.to_string(),
                        pubsub: None,
                    },
                    None,
                )
                .with_warning(format!("local save failed: {e}")),
            },
        }
    }

    /// Probe the engine health endpoint
    pub fn health(&self) -> EngineHealth {
        let start = Instant::now();
        let result = self.api.health();
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                let fallback = if response.is_success() { "ok" } else { "unhealthy" };
                let status = response
                    .body
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or(fallback)
                    .to_string();
                EngineHealth {
                    reachable: true,
                    status: Some(status),
                    latency_ms,
                    message: response.message(),
                }
            }
            Err(e) => EngineHealth {
                reachable: false,
                status: None,
                latency_ms,
                message: Some(e.to_string()),
            },
        }
    }

    fn command(&self, name: CommandName, run_id: Option<String>, parameters: Value) -> Command {
        Command::new(name, run_id, parameters, self.source.clone(), self.clock.now())
    }

    fn start_run(&self, name: CommandName, parameters: Value) -> CommandResult {
        let command = self.command(name, Some(self.ids.next()), parameters);
        let result = self.send(&command);

        if result.success {
            if let (Some(ingestor), Some(run_id)) = (&self.ingestor, &result.run_id) {
                ingestor.notify(EngineEvent::RunRequested {
                    run_id: run_id.clone(),
                    trigger_type: TriggerType::Manual,
                    parameters: command.parameters.clone(),
                });
            }
        }
        result
    }

    /// HTTP first, pub-sub when the engine cannot be reached
    fn send(&self, command: &Command) -> CommandResult {
        let span = tracing::info_span!("dispatch", command = command.name());
        let _guard = span.enter();

        let http_error = match self.api.call(endpoint_for(command.command), &[], Some(&http_body(command))) {
            Ok(response) if response.is_success() => {
                let run_id = response.run_id().or_else(|| command.run_id.clone());
                tracing::info!(run_id = run_id.as_deref().unwrap_or("-"), "engine accepted command");
                return CommandResult::accepted(
                    Transport::Http,
                    run_id,
                    response
                        .message()
                        .unwrap_or_else(|| format!("{} accepted", command.name())),
                );
            }
            Ok(response) => {
                let error = if response.status == 404
                    && matches!(
                        command.command,
                        CommandName::CancelProcessing | CommandName::RetryFailed
                    ) {
                    DispatchError::UnknownRun {
                        run_id: command.run_id.clone(),
                    }
                } else {
                    refusal(&response)
                };
                return CommandResult::failed(error, command.run_id.clone());
            }
            Err(e) => e,
        };

        tracing::info!(error = %http_error, "engine unreachable over HTTP; publishing");
        match self.broadcast(command) {
            Ok(receivers) if receivers > 0 => CommandResult::accepted(
                Transport::PubSub,
                command.run_id.clone(),
                format!("{} delivered to {receivers} subscriber(s)", command.name()),
            ),
            Ok(_) => CommandResult::failed(
                DispatchError::TransportUnavailable {
                    http: http_error.to_string(),
                    pubsub: Some("no subscribers on any channel alias".to_string()),
                },
                command.run_id.clone(),
            ),
            Err(reason) => CommandResult::failed(
                DispatchError::TransportUnavailable {
                    http: http_error.to_string(),
                    pubsub: Some(reason),
                },
                command.run_id.clone(),
            ),
        }
    }

    /// Publish on every alias of the command's topic; returns the total receivers.
    ///
    /// Fails only when no alias could be published to at all.
    fn broadcast(&self, command: &Command) -> Result<usize, String> {
        let payload = command.to_payload().map_err(|e| e.to_string())?;
        let mut receivers = 0;
        let mut published = false;
        let mut last_error = None;

        for channel in self.channels.command_aliases(command.command.topic()) {
            match self.pubsub.publish(&channel, &payload) {
                Ok(count) => {
                    published = true;
                    receivers += count;
                }
                Err(e) => {
                    tracing::debug!(channel = %channel, error = %e, "alias publish failed");
                    last_error = Some(e.to_string());
                }
            }
        }

        match (published, last_error) {
            (false, Some(error)) => Err(error),
            _ => {
                tracing::debug!(fields = ?command.fields(), receivers, "command published");
                Ok(receivers)
            }
        }
    }
}

fn endpoint_for(command: CommandName) -> Endpoint {
    match command {
        CommandName::TriggerProcessing => Endpoint::TriggerManual,
        CommandName::CancelProcessing => Endpoint::Cancel,
        CommandName::RetryFailed => Endpoint::RetryImports,
        CommandName::TriggerImport => Endpoint::TriggerImport,
        CommandName::TriggerIndicators => Endpoint::TriggerIndicators,
        CommandName::RequestStatus => Endpoint::Status,
    }
}

/// Request body for the engine: the parameters plus correlation fields
fn http_body(command: &Command) -> Value {
    let mut body = match &command.parameters {
        Value::Object(parameters) => parameters.clone(),
        _ => Map::new(),
    };
    if let Some(run_id) = &command.run_id {
        body.insert("run_id".to_string(), json!(run_id));
    }
    body.insert("source".to_string(), json!(command.source));
    Value::Object(body)
}

fn refusal(response: &ApiResponse) -> DispatchError {
    DispatchError::Refused {
        status: response.status,
        message: response
            .message()
            .unwrap_or_else(|| "no message".to_string()),
    }
}

fn expect_success(result: Result<ApiResponse, ApiError>) -> Result<Value, DispatchError> {
    match result {
        Ok(response) if response.is_success() => Ok(response.body),
        Ok(response) => Err(refusal(&response)),
        Err(e) => Err(DispatchError::TransportUnavailable {
            http: e.to_string(),
            pubsub: None,
        }),
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
