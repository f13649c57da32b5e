// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pub-sub channel names and their aliases
//!
//! The engine and the dashboard have not settled on one naming convention,
//! so every logical topic exists under both the colon family
//! (`tickstock:processing:status`) and the dotted family
//! (`tickstock.processing.status`). Subscribers listen on all aliases and
//! publishers send to all of them.

use serde::{Deserialize, Serialize};

/// Separator family used to build channel names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingConvention {
    Colon,
    Dotted,
}

impl NamingConvention {
    pub const ALL: [NamingConvention; 2] = [NamingConvention::Colon, NamingConvention::Dotted];

    pub fn separator(&self) -> char {
        match self {
            NamingConvention::Colon => ':',
            NamingConvention::Dotted => '.',
        }
    }
}

/// Logical topics the engine publishes events on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    ProcessingStarted,
    ProcessingProgress,
    ProcessingCompleted,
    ProcessingError,
    ProcessingStatus,
    ProcessingSchedule,
    ImportProgress,
    CacheProgress,
    IndicatorsProgress,
    PatternsProgress,
}

impl EventTopic {
    pub const ALL: [EventTopic; 10] = [
        EventTopic::ProcessingStarted,
        EventTopic::ProcessingProgress,
        EventTopic::ProcessingCompleted,
        EventTopic::ProcessingError,
        EventTopic::ProcessingStatus,
        EventTopic::ProcessingSchedule,
        EventTopic::ImportProgress,
        EventTopic::CacheProgress,
        EventTopic::IndicatorsProgress,
        EventTopic::PatternsProgress,
    ];

    /// Name segments after the prefix
    pub fn segments(&self) -> [&'static str; 2] {
        match self {
            EventTopic::ProcessingStarted => ["processing", "started"],
            EventTopic::ProcessingProgress => ["processing", "progress"],
            EventTopic::ProcessingCompleted => ["processing", "completed"],
            EventTopic::ProcessingError => ["processing", "error"],
            EventTopic::ProcessingStatus => ["processing", "status"],
            EventTopic::ProcessingSchedule => ["processing", "schedule"],
            EventTopic::ImportProgress => ["import", "progress"],
            EventTopic::CacheProgress => ["cache", "progress"],
            EventTopic::IndicatorsProgress => ["indicators", "progress"],
            EventTopic::PatternsProgress => ["patterns", "progress"],
        }
    }

    /// Event type assumed for messages on this topic that omit one.
    ///
    /// The status topic multiplexes several event types, so messages there
    /// must name their type.
    pub fn default_event_type(&self) -> Option<&'static str> {
        match self {
            EventTopic::ProcessingStarted => Some("processing_started"),
            EventTopic::ProcessingProgress => Some("processing_progress"),
            EventTopic::ProcessingCompleted => Some("processing_completed"),
            EventTopic::ProcessingError => Some("processing_error"),
            EventTopic::ProcessingStatus => None,
            EventTopic::ProcessingSchedule => Some("schedule_updated"),
            EventTopic::ImportProgress => Some("import_progress"),
            EventTopic::CacheProgress => Some("cache_progress"),
            EventTopic::IndicatorsProgress => Some("indicators_progress"),
            EventTopic::PatternsProgress => Some("patterns_progress"),
        }
    }
}

/// Logical topics the dashboard publishes commands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTopic {
    Trigger,
    Cancel,
    StatusRequest,
    Retry,
    ImportTrigger,
    IndicatorsTrigger,
}

impl CommandTopic {
    pub fn segments(&self) -> [&'static str; 2] {
        match self {
            CommandTopic::Trigger => ["processing", "trigger"],
            CommandTopic::Cancel => ["processing", "cancel"],
            CommandTopic::StatusRequest => ["processing", "status_request"],
            CommandTopic::Retry => ["processing", "retry"],
            CommandTopic::ImportTrigger => ["import", "trigger"],
            CommandTopic::IndicatorsTrigger => ["indicators", "trigger"],
        }
    }
}

/// Builds channel names for a prefix under every naming convention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    prefix: String,
}

impl ChannelNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn join(&self, convention: NamingConvention, segments: [&str; 2]) -> String {
        let sep = convention.separator();
        format!("{}{sep}{}{sep}{}", self.prefix, segments[0], segments[1])
    }

    /// All equivalent channel names for one set of segments
    fn aliases(&self, segments: [&str; 2]) -> Vec<String> {
        NamingConvention::ALL
            .into_iter()
            .map(|convention| self.join(convention, segments))
            .collect()
    }

    pub fn event_aliases(&self, topic: EventTopic) -> Vec<String> {
        self.aliases(topic.segments())
    }

    pub fn command_aliases(&self, topic: CommandTopic) -> Vec<String> {
        self.aliases(topic.segments())
    }

    /// Every channel the ingestor subscribes to
    pub fn event_channels(&self) -> Vec<String> {
        EventTopic::ALL
            .into_iter()
            .flat_map(|topic| self.event_aliases(topic))
            .collect()
    }

    /// Map a concrete channel name back to its logical topic
    pub fn resolve(&self, channel: &str) -> Option<EventTopic> {
        let rest = channel.strip_prefix(self.prefix.as_str())?;
        let convention = NamingConvention::ALL
            .into_iter()
            .find(|c| rest.starts_with(c.separator()))?;
        let mut parts = rest[1..].split(convention.separator());
        let segments = [parts.next()?, parts.next()?];
        if parts.next().is_some() {
            return None;
        }
        EventTopic::ALL
            .into_iter()
            .find(|topic| topic.segments() == segments)
    }
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self::new("tickstock")
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
