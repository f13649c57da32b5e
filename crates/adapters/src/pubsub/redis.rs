// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis pub-sub adapter

use super::{Flow, Message, PubSub, PubSubError};
use std::borrow::Cow;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis-backed pub-sub.
///
/// Each publish opens a short-lived connection; each `listen` holds one
/// dedicated subscriber connection for its lifetime.
#[derive(Clone)]
pub struct RedisPubSub {
    client: redis::Client,
    connect_timeout: Duration,
}

impl RedisPubSub {
    pub fn open(url: &str) -> Result<Self, PubSubError> {
        let client = redis::Client::open(url).map_err(|e| PubSubError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            connect_timeout: CONNECT_TIMEOUT,
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn connect(&self) -> Result<redis::Connection, PubSubError> {
        self.client
            .get_connection_with_timeout(self.connect_timeout)
            .map_err(|e| PubSubError::Connection(e.to_string()))
    }
}

impl PubSub for RedisPubSub {
    fn publish(&self, channel: &str, payload: &str) -> Result<usize, PubSubError> {
        let mut con = self.connect()?;
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query::<usize>(&mut con)
            .map_err(|e| PubSubError::Publish(e.to_string()))
    }

    fn listen(
        &self,
        channels: &[String],
        poll: Duration,
        handler: &mut dyn FnMut(Option<Message>) -> Flow,
    ) -> Result<(), PubSubError> {
        let mut con = self.connect()?;
        let mut pubsub = con.as_pubsub();
        pubsub
            .set_read_timeout(Some(poll))
            .map_err(|e| PubSubError::Connection(e.to_string()))?;
        for channel in channels {
            pubsub
                .subscribe(channel)
                .map_err(|e| PubSubError::Subscribe(e.to_string()))?;
        }

        loop {
            let flow = match pubsub.get_message() {
                Ok(msg) => handler(Some(text_message(
                    msg.get_channel_name(),
                    msg.get_payload_bytes(),
                ))),
                Err(e) if e.is_timeout() => handler(None),
                Err(e) => return Err(PubSubError::Disconnected(e.to_string())),
            };
            if flow == Flow::Stop {
                break;
            }
        }

        for channel in channels {
            if let Err(e) = pubsub.unsubscribe(channel) {
                tracing::debug!(channel, error = %e, "unsubscribe failed");
                break;
            }
        }
        Ok(())
    }
}

/// Broker message as text; invalid UTF-8 is replaced, not dropped
fn text_message(channel: &str, payload: &[u8]) -> Message {
    let payload = match String::from_utf8_lossy(payload) {
        Cow::Borrowed(text) => text.to_string(),
        Cow::Owned(text) => {
            tracing::debug!(channel, "message payload is not valid UTF-8");
            text
        }
    };
    Message {
        channel: channel.to_string(),
        payload,
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
