// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory run store

use crate::store::{window_start, RunStore, RunSummary, ScheduleStore, StoreError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use ts_core::{Clock, Operation, ProcessingRun, Schedule, SystemClock};

#[derive(Default)]
struct MemoryState {
    runs: HashMap<String, ProcessingRun>,
    schedule: Option<Schedule>,
}

/// Run store held in memory; used by tests and when no database is configured
#[derive(Clone)]
pub struct MemoryRunStore<C: Clock = SystemClock> {
    state: Arc<Mutex<MemoryState>>,
    fail_writes: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    clock: C,
}

impl Default for MemoryRunStore<SystemClock> {
    fn default() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl MemoryRunStore<SystemClock> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock> MemoryRunStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_reads: Arc::new(AtomicBool::new(false)),
            clock,
        }
    }

    /// Make every write fail, simulating an unavailable database
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every read fail, simulating a database that cannot be opened
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn ensure_readable(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }

    fn sorted_runs(&self) -> Result<Vec<ProcessingRun>, StoreError> {
        self.ensure_readable()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut runs: Vec<_> = state.runs.values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}

impl<C: Clock> RunStore for MemoryRunStore<C> {
    fn apply(&self, op: &Operation) -> Result<ProcessingRun, StoreError> {
        self.ensure_writable()?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let existing = state.runs.get(op.run_id()).cloned();
        let row = op.apply(existing)?;
        state.runs.insert(row.run_id.clone(), row.clone());
        Ok(row)
    }

    fn list_recent(&self, days: u32, limit: u32) -> Result<Vec<ProcessingRun>, StoreError> {
        let since = window_start(self.clock.now(), days);
        Ok(self
            .sorted_runs()?
            .into_iter()
            .filter(|run| run.started_at >= since)
            .take(limit as usize)
            .collect())
    }

    fn get_run(&self, run_id: &str) -> Result<Option<ProcessingRun>, StoreError> {
        self.ensure_readable()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.runs.get(run_id).cloned())
    }

    fn latest_run(&self) -> Result<Option<ProcessingRun>, StoreError> {
        Ok(self.sorted_runs()?.into_iter().next())
    }

    fn summary(&self, days: u32) -> Result<RunSummary, StoreError> {
        let since = window_start(self.clock.now(), days);
        let runs = self.sorted_runs()?;
        Ok(RunSummary::from_runs(
            days,
            runs.iter().filter(|run| run.started_at >= since),
        ))
    }

    fn check(&self) -> Result<(), StoreError> {
        self.ensure_readable()?;
        self.ensure_writable()
    }
}

impl<C: Clock> ScheduleStore for MemoryRunStore<C> {
    fn save_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        self.ensure_writable()?;
        self.state.lock().unwrap_or_else(|e| e.into_inner()).schedule = Some(schedule.clone());
        Ok(())
    }

    fn load_schedule(&self) -> Result<Option<Schedule>, StoreError> {
        self.ensure_readable()?;
        Ok(self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .schedule
            .clone())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
