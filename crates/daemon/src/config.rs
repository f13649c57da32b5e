// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: TOML file, environment overrides, defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use ts_core::ChannelNames;
use ts_engine::{IngestorConfig, OrchestratorConfig};

/// Config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "tickstock.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "TS_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("invalid config {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
}

/// Processing engine HTTP API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Pub-sub broker and ingestor tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PubSubConfig {
    pub url: String,
    pub channel_prefix: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub reconnect_backoff: Duration,
    #[serde(with = "humantime_serde")]
    pub max_backoff: Duration,
    /// Source tag stamped on outgoing commands
    pub source: String,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        let ingestor = IngestorConfig::default();
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            channel_prefix: "tickstock".to_string(),
            poll_interval: ingestor.poll_interval,
            reconnect_backoff: ingestor.reconnect_backoff,
            max_backoff: ingestor.max_backoff,
            source: ts_engine::DEFAULT_SOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database holding run history
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: state_dir().join("runs.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub log_path: PathBuf,
    /// PID file holding the exclusive daemon lock
    pub lock_path: PathBuf,
    /// Upper bound on waiting for the ingestor thread at shutdown
    #[serde(with = "humantime_serde")]
    pub stop_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        let dir = state_dir();
        Self {
            socket_path: dir.join("tsd.sock"),
            log_path: dir.join("tsd.log"),
            lock_path: dir.join("tsd.pid"),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// Resolved `tsd` configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    pub pubsub: PubSubConfig,
    pub store: StoreConfig,
    pub daemon: DaemonConfig,
}

impl Config {
    /// Load from `explicit`, else `$TS_CONFIG`, else `./tickstock.toml` when
    /// present, else defaults; then apply environment overrides and validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut config = match locate(explicit, &env, &cwd) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Override settings from `TS_*` variables
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env("TS_ENGINE_URL") {
            self.engine.base_url = url;
        }
        if let Some(url) = env("TS_REDIS_URL") {
            self.pubsub.url = url;
        }
        if let Some(path) = env("TS_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(path) = env("TS_SOCKET_PATH") {
            self.daemon.socket_path = PathBuf::from(path);
        }
        if let Some(path) = env("TS_LOG_PATH") {
            self.daemon.log_path = PathBuf::from(path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.engine.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "engine.base_url must be an http(s) URL, got {url:?}"
            )));
        }
        let url = &self.pubsub.url;
        if !["redis://", "rediss://", "unix://"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
        {
            return Err(ConfigError::Invalid(format!(
                "pubsub.url must be a redis URL, got {url:?}"
            )));
        }
        let prefix = &self.pubsub.channel_prefix;
        if prefix.is_empty() || prefix.contains([':', '.']) {
            return Err(ConfigError::Invalid(format!(
                "pubsub.channel_prefix must be a single non-empty segment, got {prefix:?}"
            )));
        }
        if self.pubsub.source.trim().is_empty() {
            return Err(ConfigError::Invalid("pubsub.source must not be empty".into()));
        }
        for (name, value) in [
            ("engine.timeout", self.engine.timeout),
            ("pubsub.poll_interval", self.pubsub.poll_interval),
            ("pubsub.reconnect_backoff", self.pubsub.reconnect_backoff),
            ("daemon.stop_timeout", self.daemon.stop_timeout),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.pubsub.max_backoff < self.pubsub.reconnect_backoff {
            return Err(ConfigError::Invalid(
                "pubsub.max_backoff must not be below pubsub.reconnect_backoff".into(),
            ));
        }
        Ok(())
    }

    /// Render as TOML, as printed by `tsd --check-config`
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            channels: ChannelNames::new(self.pubsub.channel_prefix.clone()),
            source: self.pubsub.source.clone(),
            ingestor: IngestorConfig {
                poll_interval: self.pubsub.poll_interval,
                reconnect_backoff: self.pubsub.reconnect_backoff,
                max_backoff: self.pubsub.max_backoff,
            },
        }
    }
}

/// Pick the config file to read, if any
fn locate(
    explicit: Option<&Path>,
    env: &impl Fn(&str) -> Option<String>,
    cwd: &Path,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    let local = cwd.join(DEFAULT_CONFIG_FILE);
    local.is_file().then_some(local)
}

/// State directory for tsd
fn state_dir() -> PathBuf {
    // Use XDG_STATE_HOME or default to ~/.local/state
    if let Some(xdg) = std::env::var_os("XDG_STATE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("tickstock");
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".local/state/tickstock"),
        None => PathBuf::from(".tickstock"),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
