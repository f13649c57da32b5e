// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    idle = { "idle", ProcessingPhase::Idle },
    scheduled = { "scheduled", ProcessingPhase::Scheduled },
    data_import = { "data_import", ProcessingPhase::DataImport },
    cache_sync = { "cache_sync", ProcessingPhase::CacheSync },
    indicators = { "indicator_processing", ProcessingPhase::IndicatorProcessing },
    patterns = { "pattern_detection", ProcessingPhase::PatternDetection },
    completed = { "completed", ProcessingPhase::Completed },
    error = { "error", ProcessingPhase::Error },
)]
fn phase_label_parses_and_displays(label: &str, phase: ProcessingPhase) {
    assert_eq!(label.parse::<ProcessingPhase>().unwrap(), phase);
    assert_eq!(phase.to_string(), label);
    assert_eq!(serde_json::to_string(&phase).unwrap(), format!("\"{}\"", label));
}

#[test]
fn unknown_phase_is_rejected() {
    let err = "warming_up".parse::<ProcessingPhase>().unwrap_err();
    assert_eq!(err, UnknownPhase("warming_up".to_string()));
}

#[test]
fn only_completed_and_error_are_terminal() {
    let terminal: Vec<_> = ProcessingPhase::ALL
        .into_iter()
        .filter(|p| p.is_terminal())
        .collect();
    assert_eq!(terminal, vec![ProcessingPhase::Completed, ProcessingPhase::Error]);
    assert!(!ProcessingPhase::Idle.is_active());
    assert!(ProcessingPhase::CacheSync.is_active());
}

#[test]
fn stages_map_to_phases() {
    assert_eq!(Stage::Import.phase(), ProcessingPhase::DataImport);
    assert_eq!(Stage::Cache.phase(), ProcessingPhase::CacheSync);
    assert_eq!(Stage::Indicators.phase(), ProcessingPhase::IndicatorProcessing);
    assert_eq!(Stage::Patterns.phase(), ProcessingPhase::PatternDetection);
    assert_eq!(Stage::from_prefix("cache"), Some(Stage::Cache));
    assert_eq!(Stage::from_prefix("processing"), None);
}
