// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn payload_carries_envelope_fields() {
    let timestamp = DateTime::parse_from_rfc3339("2026-03-02T21:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let command = Command::new(
        CommandName::TriggerProcessing,
        Some("run-1".to_string()),
        serde_json::json!({"skip_market_check": true}),
        "dashboard",
        timestamp,
    );

    let payload: serde_json::Value = serde_json::from_str(&command.to_payload().unwrap()).unwrap();
    assert_eq!(payload["command"], "trigger_processing");
    assert_eq!(payload["run_id"], "run-1");
    assert_eq!(payload["parameters"]["skip_market_check"], true);
    assert_eq!(payload["source"], "dashboard");
    assert!(payload["timestamp"].as_str().unwrap().starts_with("2026-03-02T21:00:00"));
}

#[test]
fn commands_map_to_topics() {
    assert_eq!(CommandName::CancelProcessing.topic(), CommandTopic::Cancel);
    assert_eq!(CommandName::RetryFailed.topic(), CommandTopic::Retry);
    assert_eq!(CommandName::RequestStatus.topic(), CommandTopic::StatusRequest);
    assert!(CommandName::TriggerImport.starts_run());
    assert!(!CommandName::CancelProcessing.starts_run());
}
