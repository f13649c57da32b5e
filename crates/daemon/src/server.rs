// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::sync::Arc;
use std::time::Instant;

use tokio::net::UnixStream;
use tokio::sync::Notify;
use tracing::{debug, error};
use ts_adapters::{EngineApi, PubSub};
use ts_core::{Clock, IdGen};
use ts_engine::{Orchestrator, TriggerRequest};

use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};

/// What a connection needs from the daemon
pub struct ServerContext<A, P: PubSub, C: Clock, I> {
    orchestrator: Arc<Orchestrator<A, P, C, I>>,
    start_time: Instant,
    shutdown: Arc<Notify>,
}

impl<A, P: PubSub, C: Clock, I> Clone for ServerContext<A, P, C, I> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            start_time: self.start_time,
            shutdown: Arc::clone(&self.shutdown),
        }
    }
}

impl<A, P, C, I> ServerContext<A, P, C, I>
where
    A: EngineApi,
    P: PubSub,
    C: Clock,
    I: IdGen,
{
    pub fn new(
        orchestrator: Arc<Orchestrator<A, P, C, I>>,
        start_time: Instant,
        shutdown: Arc<Notify>,
    ) -> Self {
        Self {
            orchestrator,
            start_time,
            shutdown,
        }
    }
}

/// Handle a single client connection
pub async fn handle_connection<A, P, C, I>(
    ctx: ServerContext<A, P, C, I>,
    stream: UnixStream,
) -> Result<(), ServerError>
where
    A: EngineApi,
    P: PubSub,
    C: Clock,
    I: IdGen,
{
    // Split stream for reading/writing
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(protocol::ProtocolError::Json(e)) => {
            // Tell the client what was wrong instead of hanging up
            let response = Response::Error {
                message: format!("invalid request: {}", e),
            };
            protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    let response = handle_request(&ctx, request).await;

    debug!("Sending response: {:?}", response);

    // Write response with timeout
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
async fn handle_request<A, P, C, I>(ctx: &ServerContext<A, P, C, I>, request: Request) -> Response
where
    A: EngineApi,
    P: PubSub,
    C: Clock,
    I: IdGen,
{
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        // Engine and broker calls block; keep them off the event loop
        request => {
            let orchestrator = Arc::clone(&ctx.orchestrator);
            let uptime_secs = ctx.start_time.elapsed().as_secs();
            match tokio::task::spawn_blocking(move || {
                orchestrate(&orchestrator, request, uptime_secs)
            })
            .await
            {
                Ok(response) => response,
                Err(e) => {
                    error!("Request task failed: {}", e);
                    Response::Error {
                        message: format!("request failed: {}", e),
                    }
                }
            }
        }
    }
}

/// Requests answered by the orchestrator
fn orchestrate<A, P, C, I>(
    orchestrator: &Orchestrator<A, P, C, I>,
    request: Request,
    uptime_secs: u64,
) -> Response
where
    A: EngineApi,
    P: PubSub,
    C: Clock,
    I: IdGen,
{
    let dispatcher = orchestrator.dispatcher();
    let facade = orchestrator.facade();

    match request {
        Request::Status => Response::Status {
            status: facade.current_status(),
        },

        Request::History { days, limit } => Response::History {
            history: facade.history(days, limit),
        },

        Request::Summary { days } => Response::Summary {
            summary: facade.summary(days),
        },

        Request::Trigger {
            phases,
            skip_market_check,
            universe,
        } => Response::Command {
            result: dispatcher.trigger(&TriggerRequest {
                phases,
                skip_market_check,
                universe,
            }),
        },

        Request::TriggerImport { symbols, universe } => Response::Command {
            result: dispatcher.trigger_import(symbols, universe),
        },

        Request::TriggerIndicators { symbols } => Response::Command {
            result: dispatcher.trigger_indicators(symbols),
        },

        Request::Cancel { run_id } => Response::Command {
            result: dispatcher.cancel(run_id.as_deref()),
        },

        Request::Retry { run_id, symbols } => Response::Command {
            result: dispatcher.retry_failed(&run_id, symbols),
        },

        Request::Schedule => Response::Schedule {
            schedule: facade.schedule(),
        },

        Request::UpdateSchedule { schedule } => Response::Command {
            result: dispatcher.update_schedule(&schedule),
        },

        Request::Health => Response::Health {
            uptime_secs,
            health: facade.health(),
        },

        Request::Ping | Request::Hello { .. } | Request::Shutdown => Response::Error {
            message: "request must be handled by the server".to_string(),
        },
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
