// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run tracker: the single writer of the live state
//!
//! Decodes broker messages, applies them to the live state and persists the
//! resulting operation before the next message is taken.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use ts_adapters::Message;
use ts_core::{ChannelNames, Clock, EngineEvent, LiveState, Operation, Traced};
use ts_storage::RunStore;

/// Counters describing what the ingestor has seen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestorStats {
    pub connected: bool,
    pub received: u64,
    pub applied: u64,
    pub malformed: u64,
    pub unknown: u64,
    pub persist_failures: u64,
    pub reconnects: u64,
}

#[derive(Default)]
pub(crate) struct StatsCounters {
    connected: AtomicBool,
    received: AtomicU64,
    applied: AtomicU64,
    malformed: AtomicU64,
    unknown: AtomicU64,
    persist_failures: AtomicU64,
    reconnects: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        Self::bump(&self.reconnects);
    }

    pub(crate) fn snapshot(&self) -> IngestorStats {
        IngestorStats {
            connected: self.connected.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            unknown: self.unknown.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Read-only view of the live state and ingestor counters for request handlers
#[derive(Clone)]
pub struct LiveStateReader {
    state: Arc<RwLock<LiveState>>,
    stats: Arc<StatsCounters>,
}

impl LiveStateReader {
    pub fn snapshot(&self) -> LiveState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stats(&self) -> IngestorStats {
        self.stats.snapshot()
    }
}

/// Applies engine events to the live state and the run store
pub struct RunTracker<C: Clock> {
    state: Arc<RwLock<LiveState>>,
    store: Arc<dyn RunStore>,
    channels: ChannelNames,
    clock: C,
    stats: Arc<StatsCounters>,
}

impl<C: Clock> RunTracker<C> {
    pub fn new(store: Arc<dyn RunStore>, channels: ChannelNames, clock: C) -> Self {
        Self {
            state: Arc::new(RwLock::new(LiveState::idle())),
            store,
            channels,
            clock,
            stats: Arc::new(StatsCounters::default()),
        }
    }

    pub fn reader(&self) -> LiveStateReader {
        LiveStateReader {
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn channels(&self) -> &ChannelNames {
        &self.channels
    }

    pub fn stats(&self) -> IngestorStats {
        self.stats.snapshot()
    }

    pub(crate) fn counters(&self) -> Arc<StatsCounters> {
        Arc::clone(&self.stats)
    }

    /// Decode and apply one broker message. Bad messages are logged and dropped.
    pub fn handle_message(&self, message: &Message) {
        StatsCounters::bump(&self.stats.received);
        let topic = self.channels.resolve(&message.channel);

        let event = match EngineEvent::decode(topic, &message.payload) {
            Ok(event) => event,
            Err(e) => {
                StatsCounters::bump(&self.stats.malformed);
                tracing::warn!(channel = %message.channel, error = %e, "dropping malformed event");
                return;
            }
        };

        if let EngineEvent::Unknown { event_type, .. } = &event {
            StatsCounters::bump(&self.stats.unknown);
            tracing::debug!(channel = %message.channel, event_type, "dropping unknown event");
            return;
        }

        self.apply(&event);
    }

    /// Apply an event and persist the resulting operation
    pub fn apply(&self, event: &EngineEvent) {
        let now = self.clock.now();
        let op = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            let (next, op) = state.transition(event, now);
            *state = next;
            op
        };
        StatsCounters::bump(&self.stats.applied);
        tracing::debug!(event = event.name(), fields = ?event.fields(), "applied");

        if let Some(op) = op {
            self.persist(&op);
        }
    }

    fn persist(&self, op: &Operation) {
        let span = tracing::info_span!("persist", op = op.name());
        let _guard = span.enter();

        match self.store.apply(op) {
            Ok(row) => tracing::debug!(status = %row.status, phase = %row.phase, "stored"),
            // Live state stays authoritative; the write is dropped
            Err(e) if e.is_terminal_run() => {
                StatsCounters::bump(&self.stats.persist_failures);
                tracing::warn!(fields = ?op.fields(), error = %e, "store rejected write to finished run");
            }
            Err(e) => {
                StatsCounters::bump(&self.stats.persist_failures);
                tracing::error!(fields = ?op.fields(), error = %e, "persistence failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
