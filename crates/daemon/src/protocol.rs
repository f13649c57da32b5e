// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dashboard socket protocol.
//!
//! Each frame is a 4-byte big-endian length followed by that many bytes of
//! JSON. A connection carries one request and one response.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use ts_core::{Schedule, Stage};
use ts_engine::{CommandResult, HealthReport, HistoryView, ScheduleView, StatusSnapshot, SummaryView};

/// Protocol version reported by `Hello`
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read/write timeout for one frame
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest frame accepted
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

fn default_days() -> u32 {
    7
}

fn default_limit() -> u32 {
    20
}

/// Dashboard requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Ping,

    Hello { version: String },

    /// Current run status from the first source that answers
    Status,

    History {
        #[serde(default = "default_days")]
        days: u32,
        #[serde(default = "default_limit")]
        limit: u32,
    },

    Summary {
        #[serde(default = "default_days")]
        days: u32,
    },

    /// Full pipeline run
    Trigger {
        #[serde(default)]
        phases: Option<Vec<Stage>>,
        #[serde(default)]
        skip_market_check: bool,
        #[serde(default)]
        universe: Option<String>,
    },

    TriggerImport {
        #[serde(default)]
        symbols: Option<Vec<String>>,
        #[serde(default)]
        universe: Option<String>,
    },

    TriggerIndicators {
        #[serde(default)]
        symbols: Option<Vec<String>>,
    },

    /// Cancel a run; the current one when `run_id` is absent
    Cancel {
        #[serde(default)]
        run_id: Option<String>,
    },

    /// Retry the failed symbols of a run
    Retry {
        run_id: String,
        #[serde(default)]
        symbols: Option<Vec<String>>,
    },

    Schedule,

    UpdateSchedule { schedule: Schedule },

    Health,

    Shutdown,
}

/// Daemon responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Pong,

    Hello { version: String },

    Status { status: StatusSnapshot },

    History { history: HistoryView },

    Summary { summary: SummaryView },

    /// Outcome of a trigger, cancel, retry or schedule update
    Command { result: CommandResult },

    Schedule { schedule: ScheduleView },

    Health {
        uptime_secs: u64,
        health: HealthReport,
    },

    ShuttingDown,

    Error { message: String },
}

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message too large: {0} bytes (max {MAX_MESSAGE_SIZE})")]
    MessageTooLarge(usize),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("timeout")]
    Timeout,
}

/// Serialize a message to JSON (no length prefix)
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(message)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write one length-prefixed frame
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(data.len()));
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut prefix = [0u8; 4];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(prefix) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge(len));
    }
    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Request, ProtocolError> {
    let data = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&data)
}

pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError> {
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
