// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::engine_api::{ApiError, ApiResponse, EngineApi, Endpoint};
use crate::pubsub::{Flow, Message, PubSub, PubSubError};
use serde_json::Value;
use std::time::Duration;

/// Wrapper that adds tracing to any EngineApi
#[derive(Clone)]
pub struct TracedEngineApi<A> {
    inner: A,
}

impl<A> TracedEngineApi<A> {
    pub fn new(inner: A) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: EngineApi> EngineApi for TracedEngineApi<A> {
    fn call(
        &self,
        endpoint: Endpoint,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        let span = tracing::info_span!("engine_api.call", endpoint = endpoint.name());
        let _guard = span.enter();

        let start = std::time::Instant::now();
        let result = self.inner.call(endpoint, query, body);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) if response.is_success() => {
                tracing::debug!(status = response.status, elapsed_ms, "engine answered")
            }
            Ok(response) => tracing::warn!(
                status = response.status,
                elapsed_ms,
                message = %response.message().unwrap_or_default(),
                "engine refused"
            ),
            // Unreachable engine is an expected state; callers fall back
            Err(e) => tracing::info!(elapsed_ms, error = %e, "engine call failed"),
        }

        result
    }
}

/// Wrapper that adds tracing to any PubSub
#[derive(Clone)]
pub struct TracedPubSub<P> {
    inner: P,
}

impl<P> TracedPubSub<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: PubSub> PubSub for TracedPubSub<P> {
    fn publish(&self, channel: &str, payload: &str) -> Result<usize, PubSubError> {
        let span = tracing::info_span!("pubsub.publish", channel);
        let _guard = span.enter();

        let start = std::time::Instant::now();
        let result = self.inner.publish(channel, payload);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(receivers) => tracing::debug!(receivers, elapsed_ms, "published"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "publish failed"),
        }

        result
    }

    fn listen(
        &self,
        channels: &[String],
        poll: Duration,
        handler: &mut dyn FnMut(Option<Message>) -> Flow,
    ) -> Result<(), PubSubError> {
        tracing::info!(
            channel_count = channels.len(),
            poll_ms = poll.as_millis() as u64,
            "subscribing"
        );

        let start = std::time::Instant::now();
        let result = self.inner.listen(channels, poll, handler);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => tracing::info!(elapsed_ms, "unsubscribed"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "subscription ended"),
        }

        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
