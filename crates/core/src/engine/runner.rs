//! Per-batch run loop.
//!
//! Drives one batch through its stages in order from a resume point.
//! Per-item failures are retried and then skipped; a stage fault is
//! recorded and (by default) stepped over; only an error outside all
//! per-stage handling (the durable store itself failing) halts the
//! batch with status error.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::batch::{Batch, BatchStatus, BatchStore, StageOutcome};
use crate::config::FaultPolicy;
use crate::executor::ExecutorRegistry;
use crate::metrics;
use crate::progress::{ProgressReporter, StatusBoard};

use super::gate::{GateController, GateVerdict};
use super::retry::{RetryController, StageDisposition};
use super::stage::{StageDescriptor, StageKind};
use super::types::{EngineError, StopFlag};

/// Executes one batch's stages; shared by all orchestration tasks.
pub struct BatchRunner {
    store: Arc<dyn BatchStore>,
    registry: Arc<ExecutorRegistry>,
    reporter: Arc<ProgressReporter>,
    board: Arc<StatusBoard>,
    plan: Arc<Vec<StageDescriptor>>,
    retry: RetryController,
    gate: GateController,
}

/// Why the run loop returned before completing every stage.
enum LoopExit {
    Completed,
    Paused,
    Halted,
}

impl BatchRunner {
    pub fn new(
        store: Arc<dyn BatchStore>,
        registry: Arc<ExecutorRegistry>,
        reporter: Arc<ProgressReporter>,
        board: Arc<StatusBoard>,
        plan: Arc<Vec<StageDescriptor>>,
        retry: RetryController,
        gate: GateController,
    ) -> Self {
        Self {
            store,
            registry,
            reporter,
            board,
            plan,
            retry,
            gate,
        }
    }

    /// Drive the batch from `start_stage` to the end of its stage list.
    ///
    /// Never returns an error to the spawning task: fatal failures are
    /// persisted as batch status error and logged.
    pub async fn run(
        &self,
        batch_id: &str,
        start_stage: usize,
        stop: StopFlag,
        gate_confirmed: Arc<AtomicBool>,
    ) {
        match self.drive(batch_id, start_stage, &stop, &gate_confirmed).await {
            Ok(()) => {}
            Err(e) => {
                error!("Fatal error driving batch {}: {}", batch_id, e);
                metrics::BATCHES_FAILED.inc();
                self.board
                    .update(batch_id, |status| {
                        status.status = BatchStatus::Error;
                        status.message = format!("fatal: {}", e);
                        status.push_error(e.to_string());
                    })
                    .await;
                // The store itself may be the failing component; nothing
                // more can be done if this write is lost too.
                if let Err(store_err) = self.store.update_status(batch_id, BatchStatus::Error) {
                    error!(
                        "Failed to persist error status for batch {}: {}",
                        batch_id, store_err
                    );
                }
            }
        }
    }

    async fn drive(
        &self,
        batch_id: &str,
        start_stage: usize,
        stop: &StopFlag,
        gate_confirmed: &Arc<AtomicBool>,
    ) -> Result<(), EngineError> {
        let batch = self
            .store
            .get_batch(batch_id)?
            .ok_or_else(|| EngineError::BatchNotFound(batch_id.to_string()))?;

        if start_stage > batch.stages.len() {
            return Err(EngineError::InvalidStage {
                batch_id: batch_id.to_string(),
                stage: start_stage,
                stage_count: batch.stages.len(),
            });
        }

        info!(
            "Batch {} ({}) starting at stage {}/{}",
            batch.name,
            batch_id,
            start_stage + 1,
            batch.stages.len()
        );
        self.store.update_status(batch_id, BatchStatus::Running)?;
        self.board.populate(&batch).await;
        self.board
            .update(batch_id, |status| status.status = BatchStatus::Running)
            .await;

        let mut exit = LoopExit::Completed;
        for index in start_stage..batch.stages.len() {
            // Pause signal is honored at every stage boundary.
            if stop.is_set() {
                exit = LoopExit::Paused;
                break;
            }

            let stage_name = batch.stages[index].clone();
            let Some(descriptor) = self.plan.iter().find(|d| d.name == stage_name) else {
                // Stage plan drifted since the batch was created; recorded
                // like any other stage fault and stepped over.
                self.record_stage_fault(
                    batch_id,
                    &stage_name,
                    &format!("stage {} is no longer configured", stage_name),
                )
                .await;
                continue;
            };

            self.begin_stage(&batch, index, descriptor).await?;

            let started = Instant::now();
            let stage_exit = match descriptor.kind {
                StageKind::ManualGate => {
                    self.run_gate(&batch, index, descriptor, stop, gate_confirmed)
                        .await?
                }
                StageKind::Standard => {
                    self.run_standard(&batch, index, descriptor, stop).await?
                }
            };
            metrics::STAGE_DURATION
                .with_label_values(&[&descriptor.name])
                .observe(started.elapsed().as_secs_f64());

            if let Some(stage_exit) = stage_exit {
                exit = stage_exit;
                break;
            }
        }

        match exit {
            LoopExit::Completed => {
                self.store.update_status(batch_id, BatchStatus::Completed)?;
                self.board
                    .update(batch_id, |status| {
                        status.status = BatchStatus::Completed;
                        status.message = "completed".to_string();
                    })
                    .await;
                metrics::BATCHES_COMPLETED.inc();
                info!("Batch {} completed", batch_id);
            }
            LoopExit::Paused => self.persist_paused(batch_id).await?,
            LoopExit::Halted => {
                self.store.update_status(batch_id, BatchStatus::Error)?;
                self.board
                    .update(batch_id, |status| {
                        status.status = BatchStatus::Error;
                        status.message = "halted on stage fault".to_string();
                    })
                    .await;
                warn!("Batch {} halted by stage fault policy", batch_id);
            }
        }
        Ok(())
    }

    /// Mark a stage running in both the live cache and durable state.
    async fn begin_stage(
        &self,
        batch: &Batch,
        index: usize,
        descriptor: &StageDescriptor,
    ) -> Result<(), EngineError> {
        let total = batch.stages.len();
        let name = descriptor.name.clone();
        self.board
            .update(&batch.id, |status| {
                status.current_stage = index;
                status.stage_name = Some(name.clone());
                status.message = if descriptor.is_gate() {
                    format!("waiting for confirmation at {} ({}/{})", name, index + 1, total)
                } else {
                    format!("running stage {} ({}/{})", name, index + 1, total)
                };
            })
            .await;

        let counters = batch
            .counters
            .get(&descriptor.name)
            .cloned()
            .unwrap_or_default();
        self.store
            .checkpoint(&batch.id, index, BatchStatus::Running, &counters)?;
        Ok(())
    }

    async fn run_gate(
        &self,
        batch: &Batch,
        _index: usize,
        descriptor: &StageDescriptor,
        stop: &StopFlag,
        gate_confirmed: &Arc<AtomicBool>,
    ) -> Result<Option<LoopExit>, EngineError> {
        let verdict = self
            .gate
            .wait(
                &batch.id,
                &descriptor.name,
                stop,
                gate_confirmed,
                &self.store,
                &self.board,
            )
            .await;

        match verdict {
            GateVerdict::Stopped => {
                metrics::GATE_RESULTS.with_label_values(&["stopped"]).inc();
                Ok(Some(LoopExit::Paused))
            }
            GateVerdict::Confirmed => {
                metrics::GATE_RESULTS.with_label_values(&["confirmed"]).inc();
                self.store.set_gate_confirmed(&batch.id, true)?;
                self.reporter.log(
                    &batch.id,
                    &descriptor.name,
                    None,
                    StageOutcome::Success,
                    "confirmation received",
                    None,
                );
                Ok(None)
            }
            GateVerdict::TimedOut => {
                metrics::GATE_RESULTS.with_label_values(&["timed_out"]).inc();
                self.reporter.log(
                    &batch.id,
                    &descriptor.name,
                    None,
                    StageOutcome::Timeout,
                    format!("gate {} force-completed on timeout", descriptor.name),
                    None,
                );
                Ok(None)
            }
        }
    }

    async fn run_standard(
        &self,
        batch: &Batch,
        index: usize,
        descriptor: &StageDescriptor,
        stop: &StopFlag,
    ) -> Result<Option<LoopExit>, EngineError> {
        let Some(executor_name) = descriptor.executor.as_deref() else {
            self.record_stage_fault(
                &batch.id,
                &descriptor.name,
                &format!("stage {} has no executor configured", descriptor.name),
            )
            .await;
            return Ok(self.fault_exit(descriptor));
        };
        let Some(executor) = self.registry.get(executor_name) else {
            self.record_stage_fault(
                &batch.id,
                &descriptor.name,
                &format!(
                    "stage {} references unknown executor {}",
                    descriptor.name, executor_name
                ),
            )
            .await;
            return Ok(self.fault_exit(descriptor));
        };

        let disposition = self
            .retry
            .run_stage(batch, descriptor, executor, &self.store, &self.reporter, stop)
            .await?;

        match disposition {
            StageDisposition::Completed(counters) => {
                self.store
                    .checkpoint(&batch.id, index, BatchStatus::Running, &counters)?;
                let name = descriptor.name.clone();
                self.board
                    .update(&batch.id, |status| {
                        status.counters.insert(name, counters.clone());
                    })
                    .await;
                Ok(None)
            }
            StageDisposition::Stopped(counters) => {
                self.store
                    .checkpoint(&batch.id, index, BatchStatus::Running, &counters)?;
                Ok(Some(LoopExit::Paused))
            }
            StageDisposition::Faulted(message) => {
                self.record_stage_fault(&batch.id, &descriptor.name, &message)
                    .await;
                Ok(self.fault_exit(descriptor))
            }
        }
    }

    fn fault_exit(&self, descriptor: &StageDescriptor) -> Option<LoopExit> {
        match descriptor.fault_policy {
            FaultPolicy::Continue => None,
            FaultPolicy::Halt => Some(LoopExit::Halted),
        }
    }

    /// Record a systemic stage fault; the batch proceeds unless the stage's
    /// fault policy says otherwise.
    async fn record_stage_fault(&self, batch_id: &str, stage: &str, message: &str) {
        warn!("Stage {} faulted for batch {}: {}", stage, batch_id, message);
        metrics::STAGE_FAULTS.with_label_values(&[stage]).inc();
        self.reporter.log(
            batch_id,
            stage,
            None,
            StageOutcome::StageError,
            format!("stage {} faulted", stage),
            Some(message),
        );
        let summary = format!("{}: {}", stage, message);
        self.board
            .update(batch_id, |status| status.push_error(summary))
            .await;
    }

    async fn persist_paused(&self, batch_id: &str) -> Result<(), EngineError> {
        self.store.update_status(batch_id, BatchStatus::Paused)?;
        self.board
            .update(batch_id, |status| {
                status.status = BatchStatus::Paused;
                status.message = "paused".to_string();
            })
            .await;
        info!("Batch {} paused", batch_id);
        Ok(())
    }
}
