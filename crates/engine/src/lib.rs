// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! TickStock processing orchestration: command dispatch, event ingestion and
//! the merged status read path

mod context;
mod dispatcher;
mod error;
mod facade;
mod ingestor;
mod tracker;

pub use context::{Orchestrator, OrchestratorConfig, OrchestratorDeps};
pub use dispatcher::{
    CommandDispatcher, CommandResult, EngineHealth, ScheduleSource, ScheduleView, Transport,
    TriggerRequest, DEFAULT_SOURCE,
};
pub use error::{DispatchError, IngestorError};
pub use facade::{HealthReport, HistoryView, StatusFacade, StatusSnapshot, StatusSource, SummaryView};
pub use ingestor::{EventIngestor, IngestorConfig, IngestorHandle};
pub use tracker::{IngestorStats, LiveStateReader, RunTracker};
