// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process fake broker for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{Flow, Message, PubSub, PubSubError};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Recorded publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub channel: String,
    pub payload: String,
    pub receivers: usize,
}

struct Subscription {
    id: u64,
    channels: Vec<String>,
    inbox: VecDeque<Message>,
    dropped: bool,
}

#[derive(Default)]
struct Broker {
    next_id: u64,
    subscriptions: Vec<Subscription>,
    /// Subscribers outside this process, e.g. the engine on command channels
    external: HashMap<String, usize>,
    published: Vec<Published>,
    listen_calls: usize,
    /// Upcoming `listen` calls that fail to connect
    failing_connects: usize,
    publish_error: Option<String>,
}

/// Fake pub-sub broker.
///
/// Listeners in the same process receive published messages; external
/// subscribers are simulated with [`FakePubSub::add_subscriber`].
#[derive(Clone, Default)]
pub struct FakePubSub {
    inner: Arc<(Mutex<Broker>, Condvar)>,
}

impl FakePubSub {
    pub fn new() -> Self {
        Self::default()
    }

    fn broker(&self) -> std::sync::MutexGuard<'_, Broker> {
        self.inner.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pretend a process outside the test subscribes to `channel`
    pub fn add_subscriber(&self, channel: &str) {
        *self.broker().external.entry(channel.to_string()).or_default() += 1;
    }

    /// Number of subscribers (listeners and external) on `channel`
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let broker = self.broker();
        let listening = broker
            .subscriptions
            .iter()
            .filter(|s| !s.dropped && s.channels.iter().any(|c| c == channel))
            .count();
        listening + broker.external.get(channel).copied().unwrap_or(0)
    }

    /// Number of live `listen` calls
    pub fn listener_count(&self) -> usize {
        self.broker()
            .subscriptions
            .iter()
            .filter(|s| !s.dropped)
            .count()
    }

    /// Channels of the most recent live listener
    pub fn subscribed_channels(&self) -> Vec<String> {
        self.broker()
            .subscriptions
            .iter()
            .rev()
            .find(|s| !s.dropped)
            .map(|s| s.channels.clone())
            .unwrap_or_default()
    }

    pub fn listen_calls(&self) -> usize {
        self.broker().listen_calls
    }

    pub fn published(&self) -> Vec<Published> {
        self.broker().published.clone()
    }

    /// Drop every live listener's connection
    pub fn disconnect(&self) {
        let mut broker = self.broker();
        for subscription in &mut broker.subscriptions {
            subscription.dropped = true;
        }
        self.inner.1.notify_all();
    }

    /// Make the next `count` listen attempts fail to connect
    pub fn fail_connects(&self, count: usize) {
        self.broker().failing_connects = count;
    }

    pub fn set_publish_error(&self, error: Option<&str>) {
        self.broker().publish_error = error.map(str::to_string);
    }
}

impl PubSub for FakePubSub {
    fn publish(&self, channel: &str, payload: &str) -> Result<usize, PubSubError> {
        let mut broker = self.broker();
        if let Some(error) = &broker.publish_error {
            return Err(PubSubError::Publish(error.clone()));
        }

        let mut receivers = broker.external.get(channel).copied().unwrap_or(0);
        for subscription in &mut broker.subscriptions {
            if !subscription.dropped && subscription.channels.iter().any(|c| c == channel) {
                subscription.inbox.push_back(Message {
                    channel: channel.to_string(),
                    payload: payload.to_string(),
                });
                receivers += 1;
            }
        }
        broker.published.push(Published {
            channel: channel.to_string(),
            payload: payload.to_string(),
            receivers,
        });
        self.inner.1.notify_all();
        Ok(receivers)
    }

    fn listen(
        &self,
        channels: &[String],
        poll: Duration,
        handler: &mut dyn FnMut(Option<Message>) -> Flow,
    ) -> Result<(), PubSubError> {
        let id = {
            let mut broker = self.broker();
            broker.listen_calls += 1;
            if broker.failing_connects > 0 {
                broker.failing_connects -= 1;
                return Err(PubSubError::Connection("connection refused".to_string()));
            }
            broker.next_id += 1;
            let id = broker.next_id;
            broker.subscriptions.push(Subscription {
                id,
                channels: channels.to_vec(),
                inbox: VecDeque::new(),
                dropped: false,
            });
            id
        };

        let (lock, signal) = &*self.inner;
        let result = loop {
            // Take the next message without holding the lock across the handler
            let next = {
                let mut broker = lock.lock().unwrap_or_else(|e| e.into_inner());
                let mut waited = false;
                loop {
                    let Some(subscription) = broker.subscriptions.iter_mut().find(|s| s.id == id)
                    else {
                        break Err(PubSubError::Disconnected("subscription lost".to_string()));
                    };
                    if subscription.dropped {
                        break Err(PubSubError::Disconnected("connection reset".to_string()));
                    }
                    if let Some(message) = subscription.inbox.pop_front() {
                        break Ok(Some(message));
                    }
                    if waited {
                        break Ok(None);
                    }
                    let (guard, _) = signal
                        .wait_timeout(broker, poll)
                        .unwrap_or_else(|e| e.into_inner());
                    broker = guard;
                    waited = true;
                }
            };

            match next {
                Ok(message) => {
                    if handler(message) == Flow::Stop {
                        break Ok(());
                    }
                }
                Err(e) => break Err(e),
            }
        };

        self.broker().subscriptions.retain(|s| s.id != id);
        result
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
