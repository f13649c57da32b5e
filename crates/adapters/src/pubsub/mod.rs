// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub-sub broker adapters

mod redis;

pub use self::redis::RedisPubSub;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakePubSub, Published};

use std::time::Duration;
use thiserror::Error;

/// Errors from pub-sub operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PubSubError {
    #[error("broker connection failed: {0}")]
    Connection(String),
    #[error("subscribe failed: {0}")]
    Subscribe(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("broker disconnected: {0}")]
    Disconnected(String),
}

/// A message received on a subscribed channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub payload: String,
}

/// Whether a listener keeps receiving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Adapter for a pub-sub broker
pub trait PubSub: Clone + Send + Sync + 'static {
    /// Publish a payload; returns the number of subscribers that received it
    fn publish(&self, channel: &str, payload: &str) -> Result<usize, PubSubError>;

    /// Subscribe to `channels` and feed messages to `handler` until it
    /// returns [`Flow::Stop`].
    ///
    /// The handler is called with `None` whenever `poll` elapses without a
    /// message. Returns `Ok` after a requested stop (channels unsubscribed)
    /// and `Err` when the connection fails or drops.
    fn listen(
        &self,
        channels: &[String],
        poll: Duration,
        handler: &mut dyn FnMut(Option<Message>) -> Flow,
    ) -> Result<(), PubSubError>;
}
