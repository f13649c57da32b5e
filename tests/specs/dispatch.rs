//! Command dispatch across the HTTP and pub-sub transports

use crate::prelude::*;
use similar_asserts::assert_eq;
use ts_adapters::Endpoint;
use ts_core::RunStatus;
use ts_engine::{DispatchError, ScheduleSource, Transport, TriggerRequest};
use ts_storage::RunStore;

#[test]
fn http_trigger_shows_running_until_completed() {
    let api = ts_adapters::FakeEngineApi::new();
    api.respond(
        Endpoint::TriggerManual,
        200,
        json!({"success": true, "run_id": "eng-7", "message": "queued"}),
    );
    let h = Harness::with_api(api);
    h.start();

    let result = h.orchestrator.dispatcher().trigger(&TriggerRequest::default());
    assert!(result.success);
    assert_eq!(result.transport, Some(Transport::Http));
    assert_eq!(result.run_id.as_deref(), Some("eng-7"));

    // Engine status goes quiet; the live state answers
    h.api.set_unreachable(true);
    wait_for("pending run", || {
        h.orchestrator.ingestor().reader().snapshot().run_id.as_deref() == Some("eng-7")
    });
    let status = h.status();
    assert_eq!(status["run_id"], "eng-7");
    assert_eq!(status["is_running"], true);

    h.publish(
        "tickstock:processing:started",
        json!({"type": "started", "run_id": "eng-7", "total_symbols": 2}),
    );
    h.publish(
        "tickstock:processing:completed",
        json!({"type": "completed", "run_id": "eng-7"}),
    );
    wait_for("completion", || !h.orchestrator.ingestor().reader().snapshot().is_running);

    assert_eq!(h.status()["is_running"], false);
    let row = h.store.get_run("eng-7").unwrap().unwrap();
    assert_eq!(row.status, RunStatus::Success);
}

#[test]
fn unreachable_engine_falls_back_to_pubsub() {
    let h = Harness::engine_down();
    h.pubsub.add_subscriber("tickstock:processing:trigger");

    let result = h.orchestrator.dispatcher().trigger(&TriggerRequest {
        universe: Some("sp500".to_string()),
        ..TriggerRequest::default()
    });

    assert!(result.success);
    assert_eq!(result.transport, Some(Transport::PubSub));
    let run_id = result.run_id.unwrap();
    assert_eq!(run_id, "run-1");

    let command: serde_json::Value =
        serde_json::from_str(&h.pubsub.published()[0].payload).unwrap();
    assert_eq!(command["run_id"], run_id);
    assert_eq!(command["parameters"]["universe"], "sp500");
}

#[test]
fn any_alias_with_a_subscriber_is_enough() {
    let h = Harness::engine_down();
    // The engine listens only on the dotted family
    h.pubsub.add_subscriber("tickstock.processing.cancel");

    let result = h.orchestrator.dispatcher().cancel(Some("r1"));

    assert!(result.success);
    let channels: Vec<_> = h
        .pubsub
        .published()
        .into_iter()
        .map(|p| (p.channel, p.receivers))
        .collect();
    assert_eq!(
        channels,
        vec![
            ("tickstock:processing:cancel".to_string(), 0),
            ("tickstock.processing.cancel".to_string(), 1),
        ]
    );
}

#[test]
fn no_transport_means_failure_not_panic() {
    let h = Harness::engine_down();

    let result = h.orchestrator.dispatcher().retry_failed("r1", None);

    assert!(!result.success);
    assert!(matches!(
        result.error,
        Some(DispatchError::TransportUnavailable { .. })
    ));
}

#[test]
fn engine_refusal_is_not_retried_over_pubsub() {
    let api = ts_adapters::FakeEngineApi::new();
    api.respond(
        Endpoint::TriggerManual,
        409,
        json!({"error": "a run is already in progress"}),
    );
    let h = Harness::with_api(api);
    h.pubsub.add_subscriber("tickstock:processing:trigger");

    let result = h.orchestrator.dispatcher().trigger(&TriggerRequest::default());

    assert!(!result.success);
    assert!(matches!(
        result.error,
        Some(DispatchError::Refused { status: 409, .. })
    ));
    assert!(h.pubsub.published().is_empty());
}

#[test]
fn schedule_update_is_kept_locally_while_engine_is_down() {
    let h = Harness::engine_down();
    let schedule = ts_core::Schedule {
        run_time: "17:30".to_string(),
        ..ts_core::Schedule::default()
    };

    let result = h.orchestrator.dispatcher().update_schedule(&schedule);
    assert!(result.success);
    assert_eq!(result.transport, Some(Transport::Local));
    assert!(result.warning.is_some());

    let view = h.orchestrator.facade().schedule();
    assert_eq!(view.source, ScheduleSource::Local);
    assert_eq!(view.schedule.run_time, "17:30");
}
