// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed run store
//!
//! Every operation opens its own connection, runs in one transaction and
//! closes. Nothing holds the database between events.

use crate::store::{window_start, RunStore, RunSummary, ScheduleStore, StoreError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::time::Duration;
use ts_core::{Clock, Operation, ProcessingRun, RunCounters, Schedule, SystemClock};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS processing_runs (
    run_id TEXT PRIMARY KEY,
    trigger_type TEXT NOT NULL,
    status TEXT NOT NULL,
    phase TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    duration_seconds REAL,
    symbols_total INTEGER NOT NULL DEFAULT 0,
    symbols_processed INTEGER NOT NULL DEFAULT 0,
    symbols_failed INTEGER NOT NULL DEFAULT 0,
    indicators_total INTEGER NOT NULL DEFAULT 0,
    indicators_processed INTEGER NOT NULL DEFAULT 0,
    indicators_failed INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    metadata TEXT NOT NULL DEFAULT 'null',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_processing_runs_started_at ON processing_runs (started_at DESC);
CREATE INDEX IF NOT EXISTS idx_processing_runs_status ON processing_runs (status);
CREATE TABLE IF NOT EXISTS processing_schedule (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schedule TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

const COLUMNS: &str = "run_id, trigger_type, status, phase, started_at, completed_at, \
    duration_seconds, symbols_total, symbols_processed, symbols_failed, indicators_total, \
    indicators_processed, indicators_failed, error_message, metadata, created_at, updated_at";

/// Run store in a SQLite file
#[derive(Debug, Clone)]
pub struct SqliteRunStore<C: Clock = SystemClock> {
    path: PathBuf,
    clock: C,
}

impl SqliteRunStore<SystemClock> {
    /// Open the database at `path`, creating it and its schema if needed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::with_clock(path, SystemClock)
    }
}

impl<C: Clock> SqliteRunStore<C> {
    pub fn with_clock(path: impl Into<PathBuf>, clock: C) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { path, clock };
        store.connect()?.execute_batch(SCHEMA)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn query_runs(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ProcessingRun>, StoreError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(sql)?;
        let runs = stmt
            .query_map(params, row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}

impl<C: Clock> RunStore for SqliteRunStore<C> {
    fn apply(&self, op: &Operation) -> Result<ProcessingRun, StoreError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let existing = tx
            .query_row(
                &format!("SELECT {COLUMNS} FROM processing_runs WHERE run_id = ?1"),
                params![op.run_id()],
                row_to_run,
            )
            .optional()?;
        let row = op.apply(existing)?;
        write_run(&tx, &row)?;
        tx.commit()?;

        Ok(row)
    }

    fn list_recent(&self, days: u32, limit: u32) -> Result<Vec<ProcessingRun>, StoreError> {
        let since = window_start(self.clock.now(), days);
        self.query_runs(
            &format!(
                "SELECT {COLUMNS} FROM processing_runs WHERE started_at >= ?1 \
                 ORDER BY started_at DESC LIMIT ?2"
            ),
            params![since, i64::from(limit)],
        )
    }

    fn get_run(&self, run_id: &str) -> Result<Option<ProcessingRun>, StoreError> {
        let conn = self.connect()?;
        let run = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM processing_runs WHERE run_id = ?1"),
                params![run_id],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    fn latest_run(&self) -> Result<Option<ProcessingRun>, StoreError> {
        let mut runs = self.query_runs(
            &format!("SELECT {COLUMNS} FROM processing_runs ORDER BY started_at DESC LIMIT 1"),
            [],
        )?;
        Ok(runs.pop())
    }

    fn summary(&self, days: u32) -> Result<RunSummary, StoreError> {
        let since = window_start(self.clock.now(), days);
        let conn = self.connect()?;
        let summary = conn.query_row(
            "SELECT COUNT(*), \
                    COALESCE(SUM(status = 'success'), 0), \
                    COALESCE(SUM(status = 'failed'), 0), \
                    COALESCE(SUM(status IN ('pending', 'running')), 0), \
                    AVG(duration_seconds) \
             FROM processing_runs WHERE started_at >= ?1",
            params![since],
            |row| {
                Ok(RunSummary {
                    days,
                    total_runs: count(row.get(0)?),
                    successful: count(row.get(1)?),
                    failed: count(row.get(2)?),
                    running: count(row.get(3)?),
                    average_duration_seconds: row.get(4)?,
                })
            },
        )?;
        Ok(summary)
    }

    fn check(&self) -> Result<(), StoreError> {
        self.connect()?.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

impl<C: Clock> ScheduleStore for SqliteRunStore<C> {
    fn save_schedule(&self, schedule: &Schedule) -> Result<(), StoreError> {
        let json = serde_json::to_string(schedule)?;
        self.connect()?.execute(
            "INSERT INTO processing_schedule (id, schedule, updated_at) VALUES (1, ?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET schedule = excluded.schedule, updated_at = excluded.updated_at",
            params![json, self.clock.now()],
        )?;
        Ok(())
    }

    fn load_schedule(&self) -> Result<Option<Schedule>, StoreError> {
        let json: Option<String> = self
            .connect()?
            .query_row(
                "SELECT schedule FROM processing_schedule WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

fn write_run(conn: &Connection, run: &ProcessingRun) -> Result<(), StoreError> {
    let c = &run.counters;
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO processing_runs ({COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            run.run_id,
            run.trigger_type.as_str(),
            run.status.as_str(),
            run.phase.as_str(),
            run.started_at,
            run.completed_at,
            run.duration_seconds,
            to_sql_count(c.symbols_total),
            to_sql_count(c.symbols_processed),
            to_sql_count(c.symbols_failed),
            to_sql_count(c.indicators_total),
            to_sql_count(c.indicators_processed),
            to_sql_count(c.indicators_failed),
            run.error_message,
            serde_json::to_string(&run.metadata)?,
            run.created_at,
            run.updated_at,
        ],
    )?;
    Ok(())
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<ProcessingRun> {
    let metadata: String = row.get(14)?;
    Ok(ProcessingRun {
        run_id: row.get(0)?,
        trigger_type: parse_column(row, 1)?,
        status: parse_column(row, 2)?,
        phase: parse_column(row, 3)?,
        started_at: row.get::<_, DateTime<Utc>>(4)?,
        completed_at: row.get(5)?,
        duration_seconds: row.get(6)?,
        counters: RunCounters {
            symbols_total: count(row.get(7)?),
            symbols_processed: count(row.get(8)?),
            symbols_failed: count(row.get(9)?),
            indicators_total: count(row.get(10)?),
            indicators_processed: count(row.get(11)?),
            indicators_failed: count(row.get(12)?),
        },
        error_message: row.get(13)?,
        metadata: serde_json::from_str(&metadata).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(14, rusqlite::types::Type::Text, Box::new(e))
        })?,
        created_at: row.get(15)?,
        updated_at: row.get(16)?,
    })
}

/// Read a text column through its `FromStr` impl
fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}

fn count(value: i64) -> u64 {
    value.max(0) as u64
}

fn to_sql_count(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
