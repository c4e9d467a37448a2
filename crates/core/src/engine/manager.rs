//! Lifecycle-managed control surface over running batches.
//!
//! Owns the live task handle, stop flag, and in-memory gate flag for each
//! running batch, replacing any notion of a global mutable job dict. The
//! host keeps one manager and calls it from its API layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::batch::{
    Batch, BatchFilter, BatchStatus, BatchStore, CreateBatchRequest, StageResult,
};
use crate::config::{EngineConfig, StageConfig};
use crate::executor::ExecutorRegistry;
use crate::metrics;
use crate::progress::{JobStatus, ProgressReporter, StatusBoard};

use super::gate::GateController;
use super::retry::RetryController;
use super::runner::BatchRunner;
use super::stage::{build_plan, StageDescriptor};
use super::types::{EngineError, StopFlag};

/// Control state for one live orchestration task.
struct BatchHandle {
    stop: StopFlag,
    gate_confirmed: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Result of a gate confirmation call.
#[derive(Debug, Clone)]
pub struct GateConfirmation {
    pub batch_id: String,
    /// Whether a live orchestration task observed the confirmation. When
    /// false the caller must re-start the batch at the gate's dependent
    /// stage; the durable flag is already set.
    pub orchestrator_running: bool,
}

/// Coordinates batch orchestration tasks and exposes the control surface.
pub struct PipelineManager {
    store: Arc<dyn BatchStore>,
    plan: Arc<Vec<StageDescriptor>>,
    runner: Arc<BatchRunner>,
    board: Arc<StatusBoard>,
    reporter: Arc<ProgressReporter>,
    active: Arc<RwLock<HashMap<String, BatchHandle>>>,
}

impl PipelineManager {
    pub fn new(
        engine: &EngineConfig,
        stages: &[StageConfig],
        store: Arc<dyn BatchStore>,
        registry: Arc<ExecutorRegistry>,
    ) -> Self {
        let plan = Arc::new(build_plan(stages, engine.max_retries));
        let board = Arc::new(StatusBoard::new());
        let reporter = Arc::new(ProgressReporter::new(
            Arc::clone(&store),
            engine.activity_ring_capacity,
        ));

        let runner = Arc::new(BatchRunner::new(
            Arc::clone(&store),
            registry,
            Arc::clone(&reporter),
            Arc::clone(&board),
            Arc::clone(&plan),
            RetryController::new(Duration::from_millis(engine.retry_backoff_ms)),
            GateController::new(
                Duration::from_millis(engine.gate_poll_interval_ms),
                Duration::from_secs(engine.gate_ceiling_secs),
            ),
        ));

        Self {
            store,
            plan,
            runner,
            board,
            reporter,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Startup reconciliation: batches durably marked running cannot have a
    /// live task after a restart and are conservatively paused. Resumption
    /// then requires an explicit resume call.
    pub fn recover_interrupted(&self) -> Result<Vec<String>, EngineError> {
        let recovered = self.store.recover_interrupted()?;
        for id in &recovered {
            info!("Recovered interrupted batch {} as paused", id);
        }
        Ok(recovered)
    }

    /// Create a batch over the configured stage plan.
    pub fn create_batch(
        &self,
        name: impl Into<String>,
        item_refs: Vec<String>,
    ) -> Result<Batch, EngineError> {
        if self.plan.is_empty() {
            return Err(EngineError::NoStagesConfigured);
        }
        let stages = self.plan.iter().map(|d| d.name.clone()).collect();
        let batch = self.store.create_batch(CreateBatchRequest {
            name: name.into(),
            stages,
            item_refs,
        })?;
        info!("Created batch {} ({})", batch.name, batch.id);
        Ok(batch)
    }

    /// Start orchestrating a batch at `start_stage`.
    ///
    /// Idempotence guard: a second start while a live task exists for the
    /// same batch is rejected, so no two workers ever mutate the same
    /// item's same-stage fields.
    pub async fn start(&self, batch_id: &str, start_stage: usize) -> Result<(), EngineError> {
        let batch = self
            .store
            .get_batch(batch_id)?
            .ok_or_else(|| EngineError::BatchNotFound(batch_id.to_string()))?;

        if batch.status == BatchStatus::Completed {
            return Err(EngineError::InvalidState {
                expected: "paused, error, or new".to_string(),
                actual: "completed".to_string(),
            });
        }
        if start_stage >= batch.stages.len() {
            return Err(EngineError::InvalidStage {
                batch_id: batch_id.to_string(),
                stage: start_stage,
                stage_count: batch.stages.len(),
            });
        }

        let mut active = self.active.write().await;
        if let Some(handle) = active.get(batch_id) {
            if !handle.task.is_finished() {
                return Err(EngineError::AlreadyRunning(batch_id.to_string()));
            }
            active.remove(batch_id);
        }

        let stop = StopFlag::new();
        let gate_confirmed = Arc::new(AtomicBool::new(batch.gate_confirmed));

        let runner = Arc::clone(&self.runner);
        let active_map = Arc::clone(&self.active);
        let task_stop = stop.clone();
        let task_gate = Arc::clone(&gate_confirmed);
        let id = batch_id.to_string();

        let task = tokio::spawn(async move {
            runner.run(&id, start_stage, task_stop, task_gate).await;
            active_map.write().await.remove(&id);
        });

        active.insert(
            batch_id.to_string(),
            BatchHandle {
                stop,
                gate_confirmed,
                task,
            },
        );
        metrics::BATCHES_STARTED.inc();
        Ok(())
    }

    /// Request a cooperative pause.
    ///
    /// With a live task, the stop flag is honored at the next checkpoint
    /// (stage boundary, gate poll, or item dispatch). Without one, a batch
    /// durably marked running is reconciled straight to paused.
    pub async fn pause(&self, batch_id: &str) -> Result<(), EngineError> {
        {
            let active = self.active.read().await;
            if let Some(handle) = active.get(batch_id) {
                if !handle.task.is_finished() {
                    info!("Pause requested for batch {}", batch_id);
                    handle.stop.trigger();
                    return Ok(());
                }
            }
        }

        let batch = self
            .store
            .get_batch(batch_id)?
            .ok_or_else(|| EngineError::BatchNotFound(batch_id.to_string()))?;
        match batch.status {
            BatchStatus::Running => {
                warn!(
                    "Batch {} marked running with no live task; reconciling to paused",
                    batch_id
                );
                self.store.update_status(batch_id, BatchStatus::Paused)?;
                self.board
                    .update(batch_id, |status| {
                        status.status = BatchStatus::Paused;
                        status.message = "paused".to_string();
                    })
                    .await;
                Ok(())
            }
            BatchStatus::Paused => Ok(()),
            other => Err(EngineError::InvalidState {
                expected: "running or paused".to_string(),
                actual: other.as_str().to_string(),
            }),
        }
    }

    /// Resume a paused (or fatally errored) batch from durable state.
    ///
    /// The resume stage is recomputed from the checkpoint; an already
    /// confirmed manual gate is skipped to its dependent stage.
    pub async fn resume(&self, batch_id: &str) -> Result<usize, EngineError> {
        let batch = self
            .store
            .get_batch(batch_id)?
            .ok_or_else(|| EngineError::BatchNotFound(batch_id.to_string()))?;

        match batch.status {
            BatchStatus::Paused | BatchStatus::Error => {}
            other => {
                return Err(EngineError::InvalidState {
                    expected: "paused or error".to_string(),
                    actual: other.as_str().to_string(),
                })
            }
        }
        if batch.stages.is_empty() {
            return Err(EngineError::NoStagesConfigured);
        }

        let mut stage = batch.current_stage.min(batch.stages.len() - 1);
        if batch.gate_confirmed && stage + 1 < batch.stages.len() {
            let is_gate = self
                .plan
                .iter()
                .find(|d| d.name == batch.stages[stage])
                .map(|d| d.is_gate())
                .unwrap_or(false);
            if is_gate {
                stage += 1;
            }
        }

        self.start(batch_id, stage).await?;
        Ok(stage)
    }

    /// Confirm a manual gate.
    ///
    /// Sets the durable flag first, then the in-memory fast path of the
    /// live task if one exists. When none does, the caller relaunches via
    /// resume and the durable flag carries the confirmation.
    pub async fn confirm_gate(&self, batch_id: &str) -> Result<GateConfirmation, EngineError> {
        self.store.set_gate_confirmed(batch_id, true)?;

        let active = self.active.read().await;
        let running = match active.get(batch_id) {
            Some(handle) if !handle.task.is_finished() => {
                handle.gate_confirmed.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        };

        info!(
            "Gate confirmed for batch {} (orchestrator running: {})",
            batch_id, running
        );
        Ok(GateConfirmation {
            batch_id: batch_id.to_string(),
            orchestrator_running: running,
        })
    }

    /// Live status for a batch, rebuilt from durable state on a cache miss.
    pub async fn get_status(&self, batch_id: &str) -> Result<JobStatus, EngineError> {
        if let Some(status) = self.board.get(batch_id).await {
            return Ok(status);
        }

        let batch = self
            .store
            .get_batch(batch_id)?
            .ok_or_else(|| EngineError::BatchNotFound(batch_id.to_string()))?;

        let mut status = JobStatus::from_batch(&batch);
        for result in self.store.recent_results(batch_id, 20)? {
            if !matches!(
                result.outcome,
                crate::batch::StageOutcome::Success
            ) {
                if let Some(error) = result.error {
                    status.push_error(format!("{}: {}", result.stage, error));
                }
            }
        }
        status.errors.reverse();

        self.board.insert(status.clone()).await;
        Ok(status)
    }

    /// Recent activity, served from the ring buffer when it has entries
    /// for this batch and from the durable log otherwise (e.g. after a
    /// restart).
    pub fn get_activity(
        &self,
        batch_id: &str,
        limit: usize,
    ) -> Result<Vec<StageResult>, EngineError> {
        let from_ring = self.reporter.recent(batch_id, limit);
        if !from_ring.is_empty() {
            return Ok(from_ring);
        }
        Ok(self.store.recent_results(batch_id, limit as i64)?)
    }

    /// Fetch a batch by ID.
    pub fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>, EngineError> {
        Ok(self.store.get_batch(batch_id)?)
    }

    /// List batches.
    pub fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<Batch>, EngineError> {
        Ok(self.store.list_batches(filter)?)
    }

    /// Delete a batch and evict its cache entry. Running batches must be
    /// paused first.
    pub async fn delete_batch(&self, batch_id: &str) -> Result<Batch, EngineError> {
        {
            let active = self.active.read().await;
            if let Some(handle) = active.get(batch_id) {
                if !handle.task.is_finished() {
                    return Err(EngineError::InvalidState {
                        expected: "not running".to_string(),
                        actual: "running".to_string(),
                    });
                }
            }
        }

        let batch = self.store.delete_batch(batch_id)?;
        self.board.remove(batch_id).await;
        self.active.write().await.remove(batch_id);
        info!("Deleted batch {}", batch_id);
        Ok(batch)
    }

    /// Whether a live orchestration task exists for the batch.
    pub async fn is_running(&self, batch_id: &str) -> bool {
        let active = self.active.read().await;
        active
            .get(batch_id)
            .map(|handle| !handle.task.is_finished())
            .unwrap_or(false)
    }

    /// Trigger stops for every live task and wait for them to settle.
    /// Used for graceful shutdown.
    pub async fn stop_all(&self) {
        let handles: Vec<(String, BatchHandle)> =
            self.active.write().await.drain().collect();
        for (_, handle) in &handles {
            handle.stop.trigger();
        }
        for (id, handle) in handles {
            if let Err(e) = handle.task.await {
                warn!("Orchestration task for batch {} ended abnormally: {}", id, e);
            }
        }
        info!("All orchestration tasks stopped");
    }
}
