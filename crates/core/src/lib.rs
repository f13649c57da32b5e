// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ts-core: domain types for the TickStock processing orchestrator
//!
//! This crate provides:
//! - Processing phases, run records and their lifecycle rules
//! - Engine event decoding and the live run state machine
//! - Commands and the channel aliases they travel on
//! - Clock and id abstractions

pub mod clock;
pub mod id;
pub mod traced;

pub mod channel;
pub mod command;
pub mod event;
pub mod phase;
pub mod run;
pub mod schedule;

// State machines (order matters for dependencies)
pub mod live;
pub mod operation;

// Re-exports
pub use channel::{ChannelNames, CommandTopic, EventTopic, NamingConvention};
pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{Command, CommandName};
pub use event::{EngineEvent, EventError, ProgressReport, StageEventKind};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use live::LiveState;
pub use operation::Operation;
pub use phase::{ProcessingPhase, Stage, UnknownPhase};
pub use run::{
    Completion, CounterUpdate, ProcessingRun, ProgressRecord, RunCounters, RunError, RunStatus,
    TriggerType,
};
pub use schedule::{Schedule, ScheduleError};
pub use traced::Traced;
