// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event ingestor: background subscriber over every engine event channel
//!
//! One named thread holds one broker subscription and feeds each message to
//! the [`RunTracker`] in arrival order. Events raised locally (a run accepted
//! by the dispatcher) arrive through an [`IngestorHandle`] mailbox and are
//! drained by the same thread, so the live state has a single writer.

use crate::error::IngestorError;
use crate::tracker::{IngestorStats, LiveStateReader, RunTracker, StatsCounters};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use ts_adapters::{Flow, Message, PubSub};
use ts_core::{ChannelNames, Clock, EngineEvent, Traced};
use ts_storage::RunStore;

/// Timing knobs of the receive loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestorConfig {
    /// How often the loop wakes without traffic to observe the stop flag
    pub poll_interval: Duration,
    /// First delay before resubscribing after a broker failure
    pub reconnect_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            reconnect_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Sends locally raised events to the ingestor thread
#[derive(Clone)]
pub struct IngestorHandle {
    tx: Sender<EngineEvent>,
}

impl IngestorHandle {
    /// Queue an event; returns false once the ingestor is gone
    pub fn notify(&self, event: EngineEvent) -> bool {
        let name = event.name();
        match self.tx.send(event) {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(event = name, "ingestor mailbox closed; event dropped");
                false
            }
        }
    }
}

struct Shared<C: Clock> {
    tracker: RunTracker<C>,
    mailbox: Mutex<Receiver<EngineEvent>>,
    stop: AtomicBool,
}

impl<C: Clock> Shared<C> {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn drain_mailbox(&self) -> usize {
        let mailbox = self.mailbox.lock().unwrap_or_else(|e| e.into_inner());
        let mut drained = 0;
        while let Ok(event) = mailbox.try_recv() {
            self.tracker.apply(&event);
            drained += 1;
        }
        drained
    }
}

struct Worker {
    thread: JoinHandle<()>,
    done: Receiver<()>,
}

/// Background subscriber that owns the live state
pub struct EventIngestor<P: PubSub, C: Clock> {
    pubsub: P,
    config: IngestorConfig,
    shared: Arc<Shared<C>>,
    tx: Sender<EngineEvent>,
    worker: Mutex<Option<Worker>>,
}

impl<P: PubSub, C: Clock> EventIngestor<P, C> {
    pub fn new(
        pubsub: P,
        store: Arc<dyn RunStore>,
        clock: C,
        channels: ChannelNames,
        config: IngestorConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            pubsub,
            config,
            shared: Arc::new(Shared {
                tracker: RunTracker::new(store, channels, clock),
                mailbox: Mutex::new(rx),
                stop: AtomicBool::new(false),
            }),
            tx,
            worker: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> IngestorHandle {
        IngestorHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn reader(&self) -> LiveStateReader {
        self.shared.tracker.reader()
    }

    pub fn stats(&self) -> IngestorStats {
        self.shared.tracker.stats()
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|w| !w.thread.is_finished())
    }

    /// Apply queued local events on the caller's thread.
    ///
    /// Only for use while the background thread is not running.
    pub fn drain_pending(&self) -> usize {
        self.shared.drain_mailbox()
    }

    /// Spawn the receive loop
    pub fn start(&self) -> Result<(), IngestorError> {
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            return Err(IngestorError::AlreadyStarted);
        }

        self.shared.stop.store(false, Ordering::SeqCst);
        let (done_tx, done_rx) = mpsc::channel();
        let pubsub = self.pubsub.clone();
        let shared = Arc::clone(&self.shared);
        let config = self.config;

        let thread = thread::Builder::new()
            .name("ts-ingestor".into())
            .spawn(move || {
                receive_loop(&pubsub, &shared, config);
                let _ = done_tx.send(());
            })?;

        tracing::info!(
            channels = self.shared.tracker.channels().event_channels().len(),
            "event ingestor started"
        );
        *worker = Some(Worker {
            thread,
            done: done_rx,
        });
        Ok(())
    }

    /// Stop the loop and join the thread, waiting at most `timeout`.
    ///
    /// On timeout the thread is left detached and the error is logged.
    pub fn stop(&self, timeout: Duration) -> Result<(), IngestorError> {
        let Some(worker) = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return Ok(());
        };

        self.shared.stop.store(true, Ordering::SeqCst);
        match worker.done.recv_timeout(timeout) {
            // Sender dropped without a send: the loop panicked
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::error!(
                    timeout_ms = timeout.as_millis() as u64,
                    "event ingestor did not stop in time"
                );
                return Err(IngestorError::StopTimeout(timeout));
            }
        }

        match worker.thread.join() {
            Ok(()) => {
                tracing::info!("event ingestor stopped");
                Ok(())
            }
            Err(_) => {
                tracing::error!("event ingestor thread panicked");
                Err(IngestorError::Panicked)
            }
        }
    }
}

fn receive_loop<P: PubSub, C: Clock>(pubsub: &P, shared: &Shared<C>, config: IngestorConfig) {
    let channels = shared.tracker.channels().event_channels();
    let counters: Arc<StatsCounters> = shared.tracker.counters();
    let mut backoff = config.reconnect_backoff;
    let mut first = true;

    while !shared.stopping() {
        if !first {
            counters.record_reconnect();
            tracing::info!(channel_count = channels.len(), "resubscribing");
        }
        first = false;

        let mut delivered = false;
        let mut handler = |message: Option<Message>| {
            if !delivered {
                delivered = true;
                counters.set_connected(true);
            }
            if let Some(message) = message {
                shared.tracker.handle_message(&message);
            }
            shared.drain_mailbox();
            if shared.stopping() {
                Flow::Stop
            } else {
                Flow::Continue
            }
        };
        let result = pubsub.listen(&channels, config.poll_interval, &mut handler);
        counters.set_connected(false);

        match result {
            Ok(()) => break,
            Err(e) => {
                if delivered {
                    backoff = config.reconnect_backoff;
                }
                tracing::warn!(
                    error = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "broker subscription lost"
                );
                sleep_draining(shared, backoff, config.poll_interval);
                backoff = (backoff * 2).min(config.max_backoff);
            }
        }
    }

    // Events queued after the last tick still reach the live state
    shared.drain_mailbox();
}

/// Sleep up to `total`, waking every `tick` to apply local events and check for stop
fn sleep_draining<C: Clock>(shared: &Shared<C>, total: Duration, tick: Duration) {
    let deadline = Instant::now() + total;
    loop {
        shared.drain_mailbox();
        if shared.stopping() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(tick.min(deadline - now));
    }
}

#[cfg(test)]
#[path = "ingestor_tests.rs"]
mod tests;
