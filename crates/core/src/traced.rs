// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Span names and fields for events, commands and store operations

/// A value that describes itself to the log
pub trait Traced {
    /// Span name, e.g. `run_upsert` or `trigger_processing`
    fn name(&self) -> &'static str;

    /// Structured fields recorded alongside the name
    fn fields(&self) -> Vec<(&'static str, String)>;
}
