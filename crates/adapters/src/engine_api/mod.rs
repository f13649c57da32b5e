// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processing engine HTTP API adapters

mod http;

pub use http::HttpEngineApi;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ApiCall, FakeEngineApi};

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors reaching the engine. An HTTP error status is not an error here;
/// it arrives as an [`ApiResponse`] so callers can tell refusal from absence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("engine unreachable: {0}")]
    Unreachable(String),
    #[error("engine request timed out")]
    Timeout,
    #[error("failed to read engine response: {0}")]
    Decode(String),
}

/// Engine endpoints the orchestrator calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    TriggerManual,
    Status,
    History,
    Cancel,
    Schedule,
    UpdateSchedule,
    TriggerImport,
    TriggerIndicators,
    RetryImports,
    Health,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::TriggerManual => "/api/processing/trigger-manual",
            Endpoint::Status => "/api/processing/status",
            Endpoint::History => "/api/processing/history",
            Endpoint::Cancel => "/api/processing/cancel",
            Endpoint::Schedule | Endpoint::UpdateSchedule => "/api/processing/schedule",
            Endpoint::TriggerImport => "/api/processing/trigger-import",
            Endpoint::TriggerIndicators => "/api/processing/trigger-indicators",
            Endpoint::RetryImports => "/api/processing/retry-imports",
            Endpoint::Health => "/health",
        }
    }

    pub fn is_post(&self) -> bool {
        !matches!(
            self,
            Endpoint::Status | Endpoint::History | Endpoint::Schedule | Endpoint::Health
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::TriggerManual => "trigger_manual",
            Endpoint::Status => "status",
            Endpoint::History => "history",
            Endpoint::Cancel => "cancel",
            Endpoint::Schedule => "schedule",
            Endpoint::UpdateSchedule => "update_schedule",
            Endpoint::TriggerImport => "trigger_import",
            Endpoint::TriggerIndicators => "trigger_indicators",
            Endpoint::RetryImports => "retry_imports",
            Endpoint::Health => "health",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An HTTP answer from the engine, successful or not
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; a non-JSON body is kept as a string, an empty one as null
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Human-readable message the engine attached, if any
    pub fn message(&self) -> Option<String> {
        if let Value::String(text) = &self.body {
            return (!text.trim().is_empty()).then(|| text.clone());
        }
        ["message", "error", "detail"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
            .map(str::to_string)
    }

    pub fn run_id(&self) -> Option<String> {
        self.body
            .get("run_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Adapter for the processing engine's HTTP API.
///
/// Calls are blocking and bounded by the adapter's timeout.
pub trait EngineApi: Clone + Send + Sync + 'static {
    /// Issue one call. `query` is only sent on GET endpoints, `body` only on POST ones.
    fn call(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError>;

    fn trigger_manual(&self, request: &Value) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::TriggerManual, &[], Some(request))
    }

    fn status(&self) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::Status, &[], None)
    }

    fn history(&self, days: u32, limit: u32) -> Result<ApiResponse, ApiError> {
        self.call(
            Endpoint::History,
            &[("days", days.to_string()), ("limit", limit.to_string())],
            None,
        )
    }

    fn cancel(&self, request: &Value) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::Cancel, &[], Some(request))
    }

    fn schedule(&self) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::Schedule, &[], None)
    }

    fn update_schedule(&self, schedule: &Value) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::UpdateSchedule, &[], Some(schedule))
    }

    fn trigger_import(&self, request: &Value) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::TriggerImport, &[], Some(request))
    }

    fn trigger_indicators(&self, request: &Value) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::TriggerIndicators, &[], Some(request))
    }

    fn retry_imports(&self, request: &Value) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::RetryImports, &[], Some(request))
    }

    fn health(&self) -> Result<ApiResponse, ApiError> {
        self.call(Endpoint::Health, &[], None)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
