//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Batch lifecycle (started, completed, failed)
//! - Stage execution (item outcomes, durations, retry rounds)
//! - Manual gates (confirmations, timeouts)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Batch lifecycle
// =============================================================================

/// Batch runs started.
pub static BATCHES_STARTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("convoy_batches_started_total", "Total batch runs started").unwrap()
});

/// Batches that reached completed.
pub static BATCHES_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convoy_batches_completed_total",
        "Total batches completed successfully",
    )
    .unwrap()
});

/// Batches halted by a fatal error.
pub static BATCHES_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convoy_batches_failed_total",
        "Total batches halted with a fatal error",
    )
    .unwrap()
});

// =============================================================================
// Stage execution
// =============================================================================

/// Per-item stage outcomes.
pub static STAGE_ITEM_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "convoy_stage_item_outcomes_total",
            "Per-item stage outcomes",
        ),
        &["stage", "outcome"], // "success", "failure", "skipped"
    )
    .unwrap()
});

/// Stage faults (systemic executor failures, not per-item).
pub static STAGE_FAULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convoy_stage_faults_total", "Systemic stage faults"),
        &["stage"],
    )
    .unwrap()
});

/// Retry rounds run beyond the first attempt.
pub static RETRY_ROUNDS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convoy_retry_rounds_total", "Retry rounds per stage"),
        &["stage"],
    )
    .unwrap()
});

/// Wall-clock duration of each stage run.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "convoy_stage_duration_seconds",
            "Duration of one stage run over a batch",
        )
        .buckets(vec![0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 1800.0, 7200.0]),
        &["stage"],
    )
    .unwrap()
});

// =============================================================================
// Manual gates
// =============================================================================

/// Gate waits by result.
pub static GATE_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convoy_gate_results_total", "Manual gate wait results"),
        &["result"], // "confirmed", "timed_out", "stopped"
    )
    .unwrap()
});

/// Register all core metrics with the given registry.
///
/// Safe to call once per process; duplicate registration errors are ignored
/// so tests that build multiple servers do not panic.
pub fn register(registry: &Registry) {
    let _ = registry.register(Box::new(BATCHES_STARTED.clone()));
    let _ = registry.register(Box::new(BATCHES_COMPLETED.clone()));
    let _ = registry.register(Box::new(BATCHES_FAILED.clone()));
    let _ = registry.register(Box::new(STAGE_ITEM_OUTCOMES.clone()));
    let _ = registry.register(Box::new(STAGE_FAULTS.clone()));
    let _ = registry.register(Box::new(RETRY_ROUNDS.clone()));
    let _ = registry.register(Box::new(STAGE_DURATION.clone()));
    let _ = registry.register(Box::new(GATE_RESULTS.clone()));
}
