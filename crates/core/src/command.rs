// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator commands sent to the engine

use crate::channel::CommandTopic;
use crate::traced::Traced;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logical command names understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    TriggerProcessing,
    CancelProcessing,
    RequestStatus,
    RetryFailed,
    TriggerImport,
    TriggerIndicators,
}

impl CommandName {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandName::TriggerProcessing => "trigger_processing",
            CommandName::CancelProcessing => "cancel_processing",
            CommandName::RequestStatus => "request_status",
            CommandName::RetryFailed => "retry_failed",
            CommandName::TriggerImport => "trigger_import",
            CommandName::TriggerIndicators => "trigger_indicators",
        }
    }

    /// Pub-sub topic the command is broadcast on
    pub fn topic(&self) -> CommandTopic {
        match self {
            CommandName::TriggerProcessing => CommandTopic::Trigger,
            CommandName::CancelProcessing => CommandTopic::Cancel,
            CommandName::RequestStatus => CommandTopic::StatusRequest,
            CommandName::RetryFailed => CommandTopic::Retry,
            CommandName::TriggerImport => CommandTopic::ImportTrigger,
            CommandName::TriggerIndicators => CommandTopic::IndicatorsTrigger,
        }
    }

    /// Commands that start a new run
    pub fn starts_run(&self) -> bool {
        matches!(
            self,
            CommandName::TriggerProcessing
                | CommandName::TriggerImport
                | CommandName::TriggerIndicators
        )
    }
}

/// Command envelope, identical on both transports and correlated by `run_id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub command: CommandName,
    pub run_id: Option<String>,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

impl Command {
    pub fn new(
        command: CommandName,
        run_id: Option<String>,
        parameters: serde_json::Value,
        source: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            command,
            run_id,
            parameters,
            source: source.into(),
            timestamp,
        }
    }

    /// Wire encoding for pub-sub
    pub fn to_payload(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Traced for Command {
    fn name(&self) -> &'static str {
        self.command.as_str()
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![("source", self.source.clone())];
        if let Some(run_id) = &self.run_id {
            fields.push(("run_id", run_id.clone()));
        }
        fields
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
