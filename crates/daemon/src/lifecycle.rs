// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::{File, OpenOptions};
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{info, warn};
use ts_adapters::{HttpEngineApi, PubSubError, RedisPubSub, TracedEngineApi, TracedPubSub};
use ts_core::{SystemClock, UuidIdGen};
use ts_engine::{IngestorError, Orchestrator, OrchestratorDeps};
use ts_storage::{RunStore, SqliteRunStore, StoreError};

use crate::config::Config;
use crate::server::ServerContext;

/// Orchestrator with concrete adapter types (wrapped with tracing)
pub type DaemonOrchestrator = Orchestrator<
    TracedEngineApi<HttpEngineApi>,
    TracedPubSub<RedisPubSub>,
    SystemClock,
    UuidIdGen,
>;

/// Startup marker prefix written to log before anything else.
/// Full format: "--- tsd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- tsd: starting (pid: ";

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    pub orchestrator: Arc<DaemonOrchestrator>,
    /// When daemon started
    pub start_time: Instant,
    /// Signalled when a client asks the daemon to stop
    pub shutdown: Arc<Notify>,
}

impl DaemonState {
    /// Per-connection view handed to the server
    pub fn server_context(
        &self,
    ) -> ServerContext<TracedEngineApi<HttpEngineApi>, TracedPubSub<RedisPubSub>, SystemClock, UuidIdGen>
    {
        ServerContext::new(
            Arc::clone(&self.orchestrator),
            self.start_time,
            Arc::clone(&self.shutdown),
        )
    }

    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        // 1. Stop the ingestor; a stuck subscriber thread is logged and left behind
        let orchestrator = Arc::clone(&self.orchestrator);
        let timeout = self.config.daemon.stop_timeout;
        match tokio::task::spawn_blocking(move || orchestrator.stop(timeout)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to stop event ingestor: {}", e),
            Err(e) => warn!("Event ingestor stop task failed: {}", e),
        }

        // 2. Remove socket file
        let socket_path = &self.config.daemon.socket_path;
        if socket_path.exists() {
            if let Err(e) = std::fs::remove_file(socket_path) {
                warn!("Failed to remove socket file: {}", e);
            }
        }

        // 3. Remove PID file
        let lock_path = &self.config.daemon.lock_path;
        if lock_path.exists() {
            if let Err(e) = std::fs::remove_file(lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        // 4. Lock file is released automatically when self.lock_file is dropped

        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Log path does not name a file")]
    NoLogFile,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(std::path::PathBuf, std::io::Error),

    #[error("Run store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pub-sub error: {0}")]
    PubSub(#[from] PubSubError),

    #[error("Event ingestor error: {0}")]
    Ingestor(#[from] IngestorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        // The files belong to the daemon holding the lock
        Err(e @ LifecycleError::LockFailed(_)) => Err(e),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    // 1. Create directories for socket, lock and database
    for path in [
        &config.daemon.socket_path,
        &config.daemon.lock_path,
        &config.store.path,
    ] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
    }

    // 2. Acquire lock file FIRST - prevents races
    // Not truncated until locked: the PID may belong to a running daemon
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.daemon.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;

    // Write PID to lock file
    use std::io::Write;
    lock_file.set_len(0)?;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Open run history
    let store = Arc::new(SqliteRunStore::open(&config.store.path)?);
    reconcile_store(store.as_ref());

    // 4. Set up adapters (wrapped with tracing for observability)
    let api = TracedEngineApi::new(HttpEngineApi::new(
        config.engine.base_url.clone(),
        config.engine.timeout,
    ));
    let pubsub = TracedPubSub::new(RedisPubSub::open(&config.pubsub.url)?);

    // 5. Remove stale socket and bind (LAST - only after all validation passes)
    let socket_path = &config.daemon.socket_path;
    if socket_path.exists() {
        std::fs::remove_file(socket_path)?;
    }
    let listener = UnixListener::bind(socket_path)
        .map_err(|e| LifecycleError::BindFailed(socket_path.clone(), e))?;

    // 6. Build the orchestrator and start ingesting engine events
    let orchestrator = Orchestrator::new(
        OrchestratorDeps {
            api,
            pubsub,
            store: store.clone(),
            schedules: store,
            clock: SystemClock,
            id_gen: UuidIdGen,
        },
        config.orchestrator_config(),
    );
    orchestrator.start()?;

    info!(
        "Daemon started: engine {}, broker {}, store {}",
        config.engine.base_url,
        config.pubsub.url,
        config.store.path.display()
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        orchestrator: Arc::new(orchestrator),
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    // Remove socket if we created it
    if config.daemon.socket_path.exists() {
        let _ = std::fs::remove_file(&config.daemon.socket_path);
    }

    // Remove PID/lock file
    if config.daemon.lock_path.exists() {
        let _ = std::fs::remove_file(&config.daemon.lock_path);
    }
}

/// Warn about a run the previous daemon never saw finish
fn reconcile_store(store: &dyn RunStore) {
    match store.latest_run() {
        Ok(Some(run)) if !run.status.is_terminal() => {
            warn!(
                "Run {} was still {} at last shutdown; waiting for engine events to settle it",
                run.run_id,
                run.status.as_str()
            );
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to read run history: {}", e),
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
