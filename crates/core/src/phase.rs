// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processing phases and the engine stages that drive them

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle label of a processing run.
///
/// Declaration order is the nominal order a run moves through. `Error` is
/// reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPhase {
    Idle,
    Scheduled,
    DataImport,
    CacheSync,
    IndicatorProcessing,
    PatternDetection,
    Completed,
    Error,
}

impl ProcessingPhase {
    pub const ALL: [ProcessingPhase; 8] = [
        ProcessingPhase::Idle,
        ProcessingPhase::Scheduled,
        ProcessingPhase::DataImport,
        ProcessingPhase::CacheSync,
        ProcessingPhase::IndicatorProcessing,
        ProcessingPhase::PatternDetection,
        ProcessingPhase::Completed,
        ProcessingPhase::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingPhase::Idle => "idle",
            ProcessingPhase::Scheduled => "scheduled",
            ProcessingPhase::DataImport => "data_import",
            ProcessingPhase::CacheSync => "cache_sync",
            ProcessingPhase::IndicatorProcessing => "indicator_processing",
            ProcessingPhase::PatternDetection => "pattern_detection",
            ProcessingPhase::Completed => "completed",
            ProcessingPhase::Error => "error",
        }
    }

    /// Completed and error end a run
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProcessingPhase::Completed | ProcessingPhase::Error)
    }

    /// True while a run is between scheduling and its terminal phase
    pub fn is_active(&self) -> bool {
        !self.is_terminal() && *self != ProcessingPhase::Idle
    }
}

impl fmt::Display for ProcessingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a phase label is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown processing phase: {0}")]
pub struct UnknownPhase(pub String);

impl FromStr for ProcessingPhase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessingPhase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

/// Engine stage that reports its own started/progress/completed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Import,
    Cache,
    Indicators,
    Patterns,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Import, Stage::Cache, Stage::Indicators, Stage::Patterns];

    /// Event-name prefix used by the engine (`import_started`, ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Import => "import",
            Stage::Cache => "cache",
            Stage::Indicators => "indicators",
            Stage::Patterns => "patterns",
        }
    }

    /// Phase a run enters when this stage starts
    pub fn phase(&self) -> ProcessingPhase {
        match self {
            Stage::Import => ProcessingPhase::DataImport,
            Stage::Cache => ProcessingPhase::CacheSync,
            Stage::Indicators => ProcessingPhase::IndicatorProcessing,
            Stage::Patterns => ProcessingPhase::PatternDetection,
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.as_str() == prefix)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
