// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine processing schedule

use crate::phase::Stage;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("run_time must be HH:MM, got {0:?}")]
    InvalidRunTime(String),
    #[error("timezone must not be empty")]
    EmptyTimezone,
    #[error("schedule must include at least one phase")]
    NoPhases,
    #[error("malformed schedule: {0}")]
    Malformed(String),
}

/// Daily run schedule. The engine owns it; a local copy is kept as fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Schedule {
    pub enabled: bool,
    /// Local time of day, `HH:MM`
    pub run_time: String,
    pub timezone: String,
    /// Skip runs on market holidays
    pub market_check: bool,
    pub phases: Vec<Stage>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            enabled: true,
            run_time: "16:10".to_string(),
            timezone: "America/New_York".to_string(),
            market_check: true,
            phases: Stage::ALL.to_vec(),
        }
    }
}

impl Schedule {
    /// Read a schedule from an engine response body.
    ///
    /// The engine nests it under `schedule` in some releases.
    pub fn from_value(value: &serde_json::Value) -> Result<Schedule, ScheduleError> {
        let body = value.get("schedule").unwrap_or(value);
        let schedule: Schedule = serde_json::from_value(body.clone())
            .map_err(|e| ScheduleError::Malformed(e.to_string()))?;
        schedule.validate()?;
        Ok(schedule)
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        self.time_of_day()?;
        if self.timezone.trim().is_empty() {
            return Err(ScheduleError::EmptyTimezone);
        }
        if self.phases.is_empty() {
            return Err(ScheduleError::NoPhases);
        }
        Ok(())
    }

    pub fn time_of_day(&self) -> Result<NaiveTime, ScheduleError> {
        NaiveTime::parse_from_str(&self.run_time, "%H:%M")
            .map_err(|_| ScheduleError::InvalidRunTime(self.run_time.clone()))
    }
}

#[cfg(test)]
#[path = "schedule_tests.rs"]
mod tests;
