// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::path::Path;
use std::time::Duration;

/// Config rooted in `dir`, pointing at ports nothing listens on
fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.engine.base_url = "http://127.0.0.1:9".to_string();
    config.engine.timeout = Duration::from_millis(200);
    config.pubsub.url = "redis://127.0.0.1:9".to_string();
    config.pubsub.poll_interval = Duration::from_millis(20);
    config.pubsub.reconnect_backoff = Duration::from_millis(20);
    config.store.path = dir.join("state/runs.db");
    config.daemon.socket_path = dir.join("tsd.sock");
    config.daemon.lock_path = dir.join("state/tsd.pid");
    config.daemon.log_path = dir.join("tsd.log");
    config.daemon.stop_timeout = Duration::from_secs(2);
    config
}

#[tokio::test]
async fn startup_binds_socket_and_writes_pid() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let mut daemon = startup(&config).await.unwrap();

    assert!(config.daemon.socket_path.exists());
    assert!(config.store.path.exists());
    let pid = std::fs::read_to_string(&config.daemon.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());
    assert!(daemon.orchestrator.ingestor().is_running());

    daemon.shutdown().await.unwrap();
}

#[tokio::test]
async fn shutdown_stops_ingestor_and_removes_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let mut daemon = startup(&config).await.unwrap();

    daemon.shutdown().await.unwrap();

    assert!(!daemon.orchestrator.ingestor().is_running());
    assert!(!config.daemon.socket_path.exists());
    assert!(!config.daemon.lock_path.exists());
    // History survives the daemon
    assert!(config.store.path.exists());
}

#[tokio::test]
async fn second_daemon_fails_to_lock_and_leaves_first_intact() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let mut first = startup(&config).await.unwrap();

    let err = startup(&config).await.err().unwrap();

    assert!(matches!(err, LifecycleError::LockFailed(_)), "{err}");
    assert!(config.daemon.socket_path.exists());
    let pid = std::fs::read_to_string(&config.daemon.lock_path).unwrap();
    assert_eq!(pid.trim(), std::process::id().to_string());

    first.shutdown().await.unwrap();
}

#[tokio::test]
async fn bad_broker_url_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.pubsub.url = "redis://bad host:port/x".to_string();

    let err = startup(&config).await.err().unwrap();

    assert!(matches!(err, LifecycleError::PubSub(_)), "{err}");
    assert!(!config.daemon.socket_path.exists());
    assert!(!config.daemon.lock_path.exists());
}

#[tokio::test]
async fn stale_socket_is_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    std::fs::write(&config.daemon.socket_path, "stale").unwrap();

    let mut daemon = startup(&config).await.unwrap();

    let meta = std::fs::metadata(&config.daemon.socket_path).unwrap();
    assert!(!meta.is_file());

    daemon.shutdown().await.unwrap();
}
