// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the engine's HTTP API and the pub-sub broker

pub mod engine_api;
pub mod pubsub;
pub mod traced;

pub use engine_api::{ApiError, ApiResponse, EngineApi, Endpoint, HttpEngineApi};
pub use pubsub::{Flow, Message, PubSub, PubSubError, RedisPubSub};
pub use traced::{TracedEngineApi, TracedPubSub};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use engine_api::{ApiCall, FakeEngineApi};
#[cfg(any(test, feature = "test-support"))]
pub use pubsub::{FakePubSub, Published};
