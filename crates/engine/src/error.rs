// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the orchestration engine

use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Why a command or engine call did not succeed.
///
/// These travel inside results; the dispatcher never returns them as `Err`
/// from a command.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DispatchError {
    #[error("engine unreachable over HTTP ({http}){}", pubsub_suffix(.pubsub))]
    TransportUnavailable { http: String, pubsub: Option<String> },
    #[error("engine refused with HTTP {status}: {message}")]
    Refused { status: u16, message: String },
    #[error("unknown run: {}", .run_id.as_deref().unwrap_or("<current>"))]
    UnknownRun { run_id: Option<String> },
    #[error("command reached no subscribers: {0}")]
    Undelivered(String),
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error("malformed engine response: {0}")]
    Malformed(String),
}

fn pubsub_suffix(pubsub: &Option<String>) -> String {
    match pubsub {
        Some(reason) => format!(" and pub-sub ({reason})"),
        None => String::new(),
    }
}

/// Errors from the ingestor lifecycle
#[derive(Debug, Error)]
pub enum IngestorError {
    #[error("ingestor already started")]
    AlreadyStarted,
    #[error("failed to spawn ingestor thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("ingestor did not stop within {0:?}")]
    StopTimeout(Duration),
    #[error("ingestor thread panicked")]
    Panicked,
}
