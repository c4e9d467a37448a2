//! Checkpoint storage trait and request/filter types.

use thiserror::Error;

use super::{Batch, BatchStatus, Item, ItemStageState, StageCounters, StageResult};

/// Error type for checkpoint store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Batch not found.
    #[error("batch not found: {0}")]
    BatchNotFound(String),

    /// Item not found.
    #[error("item not found: {0}")]
    ItemNotFound(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Request to create a new batch with its items.
#[derive(Debug, Clone)]
pub struct CreateBatchRequest {
    /// Human-readable batch name.
    pub name: String,
    /// Ordered stage names the batch will run through.
    pub stages: Vec<String>,
    /// Caller references for the items (e.g. tenant domains).
    pub item_refs: Vec<String>,
}

/// Filter for querying batches.
#[derive(Debug, Clone)]
pub struct BatchFilter {
    /// Filter by status string.
    pub status: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl Default for BatchFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchFilter {
    pub fn new() -> Self {
        Self {
            status: None,
            limit: 100,
            offset: 0,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for durable batch/item/result storage.
///
/// Implementations acquire their storage handle per call and release it
/// before returning; callers never hold a handle across an external
/// operation.
pub trait BatchStore: Send + Sync {
    /// Create a batch and its items in one transaction.
    fn create_batch(&self, request: CreateBatchRequest) -> Result<Batch, StoreError>;

    /// Get a batch by ID.
    fn get_batch(&self, id: &str) -> Result<Option<Batch>, StoreError>;

    /// List batches matching the filter, most recent first.
    fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<Batch>, StoreError>;

    /// Update the batch status, maintaining lifecycle timestamps.
    fn update_status(&self, id: &str, status: BatchStatus) -> Result<(), StoreError>;

    /// Set the durable gate-confirmation flag.
    fn set_gate_confirmed(&self, id: &str, confirmed: bool) -> Result<(), StoreError>;

    /// Checkpoint progress: current stage index, status, and the stage's
    /// aggregate counters, written together so a restart resumes correctly.
    fn checkpoint(
        &self,
        id: &str,
        stage_index: usize,
        status: BatchStatus,
        counters: &StageCounters,
    ) -> Result<(), StoreError>;

    /// Permanently delete a batch, its items, and its results.
    /// Returns the deleted batch if found.
    fn delete_batch(&self, id: &str) -> Result<Batch, StoreError>;

    /// All items of a batch.
    fn items(&self, batch_id: &str) -> Result<Vec<Item>, StoreError>;

    /// Get a single item by ID.
    fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError>;

    /// Overwrite one item's state for one stage.
    fn update_item_stage(
        &self,
        item_id: &str,
        stage: &str,
        state: &ItemStageState,
    ) -> Result<(), StoreError>;

    /// Append a stage result row; returns the assigned row ID.
    fn append_result(&self, result: &StageResult) -> Result<i64, StoreError>;

    /// Most recent stage results for a batch, newest first.
    fn recent_results(&self, batch_id: &str, limit: i64) -> Result<Vec<StageResult>, StoreError>;

    /// Startup reconciliation: any batch durably marked running cannot have
    /// a live orchestrator after a restart, so it is conservatively flipped
    /// to paused. Returns the IDs that were transitioned.
    fn recover_interrupted(&self) -> Result<Vec<String>, StoreError>;
}
