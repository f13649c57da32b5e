// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ureq-backed engine API client

use super::{ApiError, ApiResponse, EngineApi, Endpoint};
use serde_json::Value;
use std::time::Duration;

/// Blocking HTTP client for the engine API
#[derive(Clone)]
pub struct HttpEngineApi {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpEngineApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl EngineApi for HttpEngineApi {
    fn call(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint.path());

        let result = if endpoint.is_post() {
            let body = body.cloned().unwrap_or_else(|| Value::Object(Default::default()));
            self.agent.post(&url).send_json(body)
        } else {
            let mut request = self.agent.get(&url);
            for (key, value) in query {
                request = request.query(*key, value);
            }
            request.call()
        };

        let mut response = result.map_err(|e| match e {
            ureq::Error::Timeout(_) => ApiError::Timeout,
            other => ApiError::Unreachable(other.to_string()),
        })?;

        let status = response.status().as_u16();
        let text = response
            .body_mut()
            .read_to_string()
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        Ok(ApiResponse::new(status, parse_body(text)))
    }
}

fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
