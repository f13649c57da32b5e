// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake engine API for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ApiError, ApiResponse, EngineApi, Endpoint};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Recorded engine API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub endpoint: Endpoint,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct FakeApiState {
    /// One-shot responses, consumed before the sticky ones
    queued: HashMap<Endpoint, VecDeque<Result<ApiResponse, ApiError>>>,
    sticky: HashMap<Endpoint, Result<ApiResponse, ApiError>>,
    unreachable: bool,
    calls: Vec<ApiCall>,
}

/// Fake engine API with scripted responses.
///
/// Unscripted endpoints answer `200 {"success": true}`.
#[derive(Clone, Default)]
pub struct FakeEngineApi {
    inner: Arc<Mutex<FakeApiState>>,
}

impl FakeEngineApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engine that refuses every connection
    pub fn unreachable() -> Self {
        let api = Self::new();
        api.set_unreachable(true);
        api
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).unreachable = unreachable;
    }

    /// Answer every call to `endpoint` with this status and body
    pub fn respond(&self, endpoint: Endpoint, status: u16, body: Value) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sticky
            .insert(endpoint, Ok(ApiResponse::new(status, body)));
    }

    /// Answer the next call to `endpoint` with this result
    pub fn respond_once(&self, endpoint: Endpoint, result: Result<ApiResponse, ApiError>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .queued
            .entry(endpoint)
            .or_default()
            .push_back(result);
    }

    /// Fail every call to `endpoint` with this error
    pub fn fail(&self, endpoint: Endpoint, error: ApiError) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sticky
            .insert(endpoint, Err(error));
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ApiCall> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).calls.clone()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.endpoint == endpoint)
            .collect()
    }
}

impl EngineApi for FakeEngineApi {
    fn call(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.calls.push(ApiCall {
            endpoint,
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            body: body.cloned(),
        });

        if state.unreachable {
            return Err(ApiError::Unreachable("connection refused".to_string()));
        }
        if let Some(result) = state.queued.get_mut(&endpoint).and_then(VecDeque::pop_front) {
            return result;
        }
        match state.sticky.get(&endpoint) {
            Some(result) => result.clone(),
            None => Ok(ApiResponse::new(200, json!({ "success": true }))),
        }
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
