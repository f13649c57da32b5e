//! Workspace behavior tests for the TickStock orchestrator.
//!
//! These tests drive a whole orchestrator (dispatcher, ingestor, facade and a
//! SQLite run store) through fake engine and broker adapters and verify what
//! the dashboard sees.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

#[path = "specs/prelude.rs"]
mod prelude;

#[path = "specs/scenarios.rs"]
mod scenarios;

#[path = "specs/dispatch.rs"]
mod dispatch;

#[path = "specs/ingest.rs"]
mod ingest;
