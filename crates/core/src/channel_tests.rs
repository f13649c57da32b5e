// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashSet;
use yare::parameterized;

#[test]
fn every_event_topic_has_colon_and_dotted_alias() {
    let names = ChannelNames::default();
    assert_eq!(
        names.event_aliases(EventTopic::ProcessingStatus),
        vec![
            "tickstock:processing:status".to_string(),
            "tickstock.processing.status".to_string(),
        ]
    );
}

#[test]
fn event_channel_set_has_twenty_distinct_channels() {
    let channels = ChannelNames::default().event_channels();
    assert_eq!(channels.len(), 20);
    let unique: HashSet<_> = channels.iter().collect();
    assert_eq!(unique.len(), 20);
}

#[test]
fn command_aliases_use_custom_prefix() {
    let names = ChannelNames::new("ts");
    assert_eq!(
        names.command_aliases(CommandTopic::Retry),
        vec!["ts:processing:retry".to_string(), "ts.processing.retry".to_string()]
    );
}

#[parameterized(
    colon = { "tickstock:processing:progress", Some(EventTopic::ProcessingProgress) },
    dotted = { "tickstock.import.progress", Some(EventTopic::ImportProgress) },
    schedule = { "tickstock.processing.schedule", Some(EventTopic::ProcessingSchedule) },
    mixed = { "tickstock:processing.progress", None },
    foreign_prefix = { "other:processing:progress", None },
    too_deep = { "tickstock:processing:progress:extra", None },
    unknown_topic = { "tickstock:billing:progress", None },
)]
fn resolve_channel(channel: &str, expected: Option<EventTopic>) {
    assert_eq!(ChannelNames::default().resolve(channel), expected);
}

#[test]
fn every_subscribed_channel_resolves() {
    let names = ChannelNames::default();
    for channel in names.event_channels() {
        assert!(names.resolve(&channel).is_some(), "{channel} did not resolve");
    }
}
