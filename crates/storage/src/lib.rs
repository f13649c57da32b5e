// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable run history and the local schedule copy

mod memory;
mod sqlite;
mod store;

pub use memory::MemoryRunStore;
pub use sqlite::SqliteRunStore;
pub use store::{RunStore, RunSummary, ScheduleStore, StoreError};
