// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use ts_adapters::{Endpoint, FakeEngineApi, FakePubSub};
use ts_core::{FakeClock, SequentialIdGen};
use ts_engine::{DispatchError, OrchestratorConfig, OrchestratorDeps, StatusSource, Transport};
use ts_storage::MemoryRunStore;

type TestContext = ServerContext<FakeEngineApi, FakePubSub, FakeClock, SequentialIdGen>;

fn context(api: &FakeEngineApi, pubsub: &FakePubSub) -> TestContext {
    let clock = FakeClock::new();
    let store = Arc::new(MemoryRunStore::with_clock(clock.clone()));
    let orchestrator = Orchestrator::new(
        OrchestratorDeps {
            api: api.clone(),
            pubsub: pubsub.clone(),
            store: store.clone(),
            schedules: store,
            clock,
            id_gen: SequentialIdGen::new("run"),
        },
        OrchestratorConfig::default(),
    );
    ServerContext::new(Arc::new(orchestrator), Instant::now(), Arc::new(Notify::new()))
}

async fn send_raw(ctx: &TestContext, data: &[u8]) -> Response {
    let (client, server) = UnixStream::pair().unwrap();
    let task = tokio::spawn(handle_connection(ctx.clone(), server));

    let (mut reader, mut writer) = client.into_split();
    protocol::write_message(&mut writer, data).await.unwrap();
    let bytes = protocol::read_message(&mut reader).await.unwrap();

    task.await.unwrap().unwrap();
    protocol::decode(&bytes).unwrap()
}

async fn send(ctx: &TestContext, request: Request) -> Response {
    send_raw(ctx, &protocol::encode(&request).unwrap()).await
}

#[tokio::test]
async fn ping_pongs() {
    let ctx = context(&FakeEngineApi::new(), &FakePubSub::new());
    assert_eq!(send(&ctx, Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn hello_reports_protocol_version() {
    let ctx = context(&FakeEngineApi::new(), &FakePubSub::new());
    let response = send(
        &ctx,
        Request::Hello {
            version: "0.0.1".to_string(),
        },
    )
    .await;
    assert_eq!(
        response,
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn status_comes_from_engine_when_reachable() {
    let api = FakeEngineApi::new();
    api.respond(
        Endpoint::Status,
        200,
        json!({"is_running": true, "run_id": "e1"}),
    );
    let ctx = context(&api, &FakePubSub::new());

    let Response::Status { status } = send(&ctx, Request::Status).await else {
        panic!("expected Status response");
    };
    assert_eq!(status.source, StatusSource::Engine);
    assert_eq!(status.run_id(), Some("e1"));
}

#[tokio::test]
async fn trigger_falls_back_to_pubsub() {
    let api = FakeEngineApi::unreachable();
    let pubsub = FakePubSub::new();
    pubsub.add_subscriber("tickstock.processing.trigger");
    let ctx = context(&api, &pubsub);

    let response = send(
        &ctx,
        Request::Trigger {
            phases: None,
            skip_market_check: true,
            universe: None,
        },
    )
    .await;

    let Response::Command { result } = response else {
        panic!("expected Command response");
    };
    assert!(result.success);
    assert_eq!(result.transport, Some(Transport::PubSub));
    assert_eq!(result.run_id.as_deref(), Some("run-1"));
}

#[tokio::test]
async fn retry_of_unknown_run_reports_it() {
    let api = FakeEngineApi::new();
    api.respond(Endpoint::RetryImports, 404, json!({"error": "no such run"}));
    let ctx = context(&api, &FakePubSub::new());

    let response = send(
        &ctx,
        Request::Retry {
            run_id: "ghost".to_string(),
            symbols: None,
        },
    )
    .await;

    let Response::Command { result } = response else {
        panic!("expected Command response");
    };
    assert!(!result.success);
    assert!(matches!(result.error, Some(DispatchError::UnknownRun { .. })));
}

#[tokio::test]
async fn health_includes_uptime_and_ingestor_stats() {
    let ctx = context(&FakeEngineApi::unreachable(), &FakePubSub::new());

    let Response::Health {
        uptime_secs,
        health,
    } = send(&ctx, Request::Health).await
    else {
        panic!("expected Health response");
    };
    assert!(uptime_secs < 60);
    assert!(!health.engine.reachable);
    assert!(health.store_ok);
    assert_eq!(health.ingestor.received, 0);
}

#[tokio::test]
async fn shutdown_notifies_the_daemon() {
    let ctx = context(&FakeEngineApi::new(), &FakePubSub::new());

    assert_eq!(send(&ctx, Request::Shutdown).await, Response::ShuttingDown);

    // The permit is stored even though nobody was waiting yet
    tokio::time::timeout(std::time::Duration::from_secs(1), ctx.shutdown.notified())
        .await
        .expect("shutdown was not signalled");
}

#[tokio::test]
async fn malformed_request_gets_an_error_response() {
    let ctx = context(&FakeEngineApi::new(), &FakePubSub::new());

    let Response::Error { message } = send_raw(&ctx, br#"{"type":"Launch"}"#).await else {
        panic!("expected Error response");
    };
    assert!(message.starts_with("invalid request"), "{message}");
}

#[tokio::test]
async fn client_hanging_up_is_not_an_error() {
    let ctx = context(&FakeEngineApi::new(), &FakePubSub::new());
    let (client, server) = UnixStream::pair().unwrap();
    drop(client);

    handle_connection(ctx, server).await.unwrap();
}
