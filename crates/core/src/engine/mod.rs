//! Batch orchestration engine.
//!
//! Composes the bounded worker pool, retry controller, manual gate, and
//! checkpoint store to drive one batch through its stages in order from a
//! resume point:
//! - **Per-item failures** are retried up to the stage budget, then
//!   force-skipped so they never block the batch.
//! - **Stage faults** are recorded and, by default, stepped over.
//! - **Fatal errors** (the durable store itself failing) halt the batch.

mod gate;
mod manager;
mod pool;
mod retry;
mod runner;
mod stage;
mod types;

pub use gate::{poll_until, GateController, GateVerdict, PollVerdict};
pub use manager::{GateConfirmation, PipelineManager};
pub use pool::run_bounded;
pub use retry::RetryController;
pub use runner::BatchRunner;
pub use stage::{
    build_plan, StageDescriptor, StageKind, MAX_API_PARALLELISM, MAX_AUTOMATION_PARALLELISM,
};
pub use types::{EngineError, StopFlag};
