//! Types for the orchestration engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::batch::StoreError;

/// Errors that can occur while orchestrating a batch.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Batch not found.
    #[error("batch not found: {0}")]
    BatchNotFound(String),

    /// A live orchestration task already exists for this batch.
    #[error("batch already running: {0}")]
    AlreadyRunning(String),

    /// Requested start stage is out of range.
    #[error("invalid start stage {stage} for batch {batch_id} ({stage_count} stages)")]
    InvalidStage {
        batch_id: String,
        stage: usize,
        stage_count: usize,
    },

    /// The batch is not in a state that allows the operation.
    #[error("invalid batch state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// No stages are configured, so batches cannot be created or run.
    #[error("no stages configured")]
    NoStagesConfigured,

    /// Checkpoint store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Cooperative stop signal shared between the control surface and one
/// batch's orchestration task.
///
/// Cancellation is cooperative, not preemptive: the flag is checked at
/// stage boundaries, before each gate poll, and before dispatching each
/// item. An in-flight external call runs to completion first.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop at the next cooperative checkpoint.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
