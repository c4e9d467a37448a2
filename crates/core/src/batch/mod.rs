//! Batch data model and durable checkpoint store.
//!
//! The store is the sole source of truth for resume decisions: everything
//! the orchestrator needs to continue after a crash lives here.

mod sqlite;
mod store;
mod types;

pub use sqlite::SqliteBatchStore;
pub use store::{BatchFilter, BatchStore, CreateBatchRequest, StoreError};
pub use types::{
    ArtifactPayload, Batch, BatchStatus, Item, ItemStageState, StageCounters, StageOutcome,
    StageResult,
};
