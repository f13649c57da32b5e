// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator context: built once at startup, handed out by reference

use crate::dispatcher::{CommandDispatcher, DEFAULT_SOURCE};
use crate::error::IngestorError;
use crate::facade::StatusFacade;
use crate::ingestor::{EventIngestor, IngestorConfig};
use std::sync::Arc;
use std::time::Duration;
use ts_adapters::{EngineApi, PubSub};
use ts_core::{ChannelNames, Clock, IdGen};
use ts_storage::{RunStore, ScheduleStore};

/// Orchestrator adapter dependencies
pub struct OrchestratorDeps<A, P, C, I> {
    pub api: A,
    pub pubsub: P,
    pub store: Arc<dyn RunStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub clock: C,
    pub id_gen: I,
}

/// Orchestrator settings
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub channels: ChannelNames,
    /// Source tag stamped on outgoing commands
    pub source: String,
    pub ingestor: IngestorConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channels: ChannelNames::default(),
            source: DEFAULT_SOURCE.to_string(),
            ingestor: IngestorConfig::default(),
        }
    }
}

/// Owns the dispatcher, the ingestor and the facade
pub struct Orchestrator<A, P: PubSub, C: Clock, I> {
    dispatcher: Arc<CommandDispatcher<A, P, C, I>>,
    ingestor: EventIngestor<P, C>,
    facade: StatusFacade<A, P, C, I>,
}

impl<A, P, C, I> Orchestrator<A, P, C, I>
where
    A: EngineApi,
    P: PubSub,
    C: Clock,
    I: IdGen,
{
    pub fn new(deps: OrchestratorDeps<A, P, C, I>, config: OrchestratorConfig) -> Self {
        let ingestor = EventIngestor::new(
            deps.pubsub.clone(),
            Arc::clone(&deps.store),
            deps.clock.clone(),
            config.channels.clone(),
            config.ingestor,
        );
        let dispatcher = Arc::new(
            CommandDispatcher::new(
                deps.api,
                deps.pubsub,
                deps.clock,
                deps.id_gen,
                config.channels,
                deps.schedules,
            )
            .with_source(config.source)
            .with_ingestor(ingestor.handle()),
        );
        let facade = StatusFacade::new(Arc::clone(&dispatcher), ingestor.reader(), deps.store);

        Self {
            dispatcher,
            ingestor,
            facade,
        }
    }

    /// Start ingesting engine events
    pub fn start(&self) -> Result<(), IngestorError> {
        self.ingestor.start()
    }

    /// Stop ingesting, waiting at most `timeout` for the subscriber thread
    pub fn stop(&self, timeout: Duration) -> Result<(), IngestorError> {
        self.ingestor.stop(timeout)
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<A, P, C, I> {
        &self.dispatcher
    }

    pub fn facade(&self) -> &StatusFacade<A, P, C, I> {
        &self.facade
    }

    pub fn ingestor(&self) -> &EventIngestor<P, C> {
        &self.ingestor
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
