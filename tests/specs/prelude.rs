//! Shared harness for orchestrator specs

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use ts_adapters::{FakeEngineApi, FakePubSub, PubSub};
use ts_core::{FakeClock, SequentialIdGen};
use ts_engine::{IngestorConfig, Orchestrator, OrchestratorConfig, OrchestratorDeps};
use ts_storage::SqliteRunStore;

pub use serde_json::json;

pub type TestOrchestrator = Orchestrator<FakeEngineApi, FakePubSub, FakeClock, SequentialIdGen>;

pub struct Harness {
    pub api: FakeEngineApi,
    pub pubsub: FakePubSub,
    pub store: Arc<SqliteRunStore<FakeClock>>,
    pub orchestrator: TestOrchestrator,
    _dir: tempfile::TempDir,
}

impl Harness {
    /// Orchestrator whose engine refuses HTTP, so status comes from live state
    pub fn engine_down() -> Self {
        Self::with_api(FakeEngineApi::unreachable())
    }

    pub fn with_api(api: FakeEngineApi) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::new();
        let pubsub = FakePubSub::new();
        let store =
            Arc::new(SqliteRunStore::with_clock(dir.path().join("runs.db"), clock.clone()).unwrap());
        let orchestrator = Orchestrator::new(
            OrchestratorDeps {
                api: api.clone(),
                pubsub: pubsub.clone(),
                store: store.clone(),
                schedules: store.clone(),
                clock,
                id_gen: SequentialIdGen::new("run"),
            },
            OrchestratorConfig {
                ingestor: IngestorConfig {
                    poll_interval: Duration::from_millis(10),
                    reconnect_backoff: Duration::from_millis(10),
                    max_backoff: Duration::from_millis(50),
                },
                ..OrchestratorConfig::default()
            },
        );
        Self {
            api,
            pubsub,
            store,
            orchestrator,
            _dir: dir,
        }
    }

    /// Start ingesting and wait for the subscription
    pub fn start(&self) {
        self.orchestrator.start().unwrap();
        wait_for("subscription", || self.pubsub.listener_count() == 1);
    }

    pub fn publish(&self, channel: &str, payload: Value) {
        self.pubsub.publish(channel, &payload.to_string()).unwrap();
    }

    pub fn publish_raw(&self, channel: &str, payload: &str) {
        self.pubsub.publish(channel, payload).unwrap();
    }

    /// Wait until `n` events have been applied in total
    pub fn wait_applied(&self, n: u64) {
        wait_for("events applied", || {
            self.orchestrator.ingestor().stats().applied >= n
        });
    }

    /// Current status as the dashboard sees it
    pub fn status(&self) -> Value {
        serde_json::to_value(self.orchestrator.facade().current_status()).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.orchestrator.stop(Duration::from_secs(2));
    }
}

pub fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// The named fields of `value`, for comparing a slice of a large object
pub fn pick(value: &Value, keys: &[&str]) -> Value {
    let picked = keys
        .iter()
        .map(|key| (key.to_string(), value.get(*key).cloned().unwrap_or(Value::Null)))
        .collect::<serde_json::Map<_, _>>();
    Value::Object(picked)
}
