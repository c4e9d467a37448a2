//! Bounded retry rounds for one stage.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::batch::{
    Batch, BatchStore, Item, ItemStageState, StageCounters, StageOutcome, StoreError,
};
use crate::executor::{StepExecutor, StepOutcome};
use crate::metrics;
use crate::progress::ProgressReporter;

use super::pool::run_bounded;
use super::stage::StageDescriptor;
use super::types::StopFlag;

/// How a stage run ended.
#[derive(Debug)]
pub(crate) enum StageDisposition {
    /// All retry rounds finished; every item is settled.
    Completed(StageCounters),
    /// A stop was requested; unfinished items stay eligible for resume.
    Stopped(StageCounters),
    /// The stage executor itself faulted (systemic, not per-item).
    Faulted(String),
}

/// Bounds per-item attempts within one stage to `max_retries + 1` total
/// across repeated rounds separated by a fixed backoff sleep.
///
/// No per-item timeout is enforced here; executors own their timeouts, so a
/// hung item consumes the full round's time budget.
pub struct RetryController {
    backoff: Duration,
}

impl RetryController {
    pub fn new(backoff: Duration) -> Self {
        Self { backoff }
    }

    pub(crate) async fn run_stage(
        &self,
        batch: &Batch,
        stage: &StageDescriptor,
        executor: Arc<dyn StepExecutor>,
        store: &Arc<dyn BatchStore>,
        reporter: &ProgressReporter,
        stop: &StopFlag,
    ) -> Result<StageDisposition, StoreError> {
        for round in 0..=stage.max_retries {
            if stop.is_set() {
                return Ok(StageDisposition::Stopped(self.counters(batch, stage, store)?));
            }

            // Recompute the eligible subset each round: items that already
            // succeeded or were force-skipped drop out.
            let items = store.items(&batch.id)?;
            let eligible: Vec<Item> = items
                .into_iter()
                .filter(|item| item.is_eligible(&stage.name, stage.max_retries))
                .collect();

            if eligible.is_empty() {
                break;
            }

            if round > 0 {
                info!(
                    "Stage {} retry round {} for batch {}: {} items remaining",
                    stage.name,
                    round,
                    batch.id,
                    eligible.len()
                );
                metrics::RETRY_ROUNDS.with_label_values(&[&stage.name]).inc();
            }

            let outcomes = self
                .dispatch(stage, Arc::clone(&executor), eligible.clone(), stop)
                .await;

            let outcomes = match outcomes {
                Ok(outcomes) => outcomes,
                Err(fault) => return Ok(StageDisposition::Faulted(fault)),
            };

            let by_id: HashMap<&str, &Item> =
                eligible.iter().map(|item| (item.id.as_str(), item)).collect();

            let mut any_retryable = false;
            for outcome in outcomes.into_iter().flatten() {
                let Some(item) = by_id.get(outcome.item_id.as_str()) else {
                    warn!(
                        "Stage {} executor returned outcome for unknown item {}",
                        stage.name, outcome.item_id
                    );
                    continue;
                };

                let retryable = self.apply_outcome(item, stage, &outcome, store, reporter)?;
                any_retryable = any_retryable || retryable;
            }

            if !any_retryable {
                break;
            }
            if round < stage.max_retries && !stop.is_set() {
                debug!(
                    "Stage {} backing off {:?} before next round",
                    stage.name, self.backoff
                );
                tokio::time::sleep(self.backoff).await;
            }
        }

        let counters = self.counters(batch, stage, store)?;
        if stop.is_set() {
            Ok(StageDisposition::Stopped(counters))
        } else {
            Ok(StageDisposition::Completed(counters))
        }
    }

    /// Run one round of the stage over the eligible items.
    ///
    /// Per-item work goes through the bounded pool, which converts worker
    /// panics into failure outcomes. A batched executor runs once for the
    /// whole set; a panic there is a systemic stage fault.
    async fn dispatch(
        &self,
        stage: &StageDescriptor,
        executor: Arc<dyn StepExecutor>,
        eligible: Vec<Item>,
        stop: &StopFlag,
    ) -> Result<Vec<Option<StepOutcome>>, String> {
        if stage.batched {
            let stage_name = stage.name.clone();
            let handle =
                tokio::spawn(async move { executor.execute_batch(&eligible, &stage_name).await });
            match handle.await {
                Ok(outcomes) => Ok(outcomes.into_iter().map(Some).collect()),
                Err(e) => Err(format!("stage executor panicked: {}", e)),
            }
        } else {
            let stage_name = stage.name.clone();
            Ok(run_bounded(
                eligible,
                stage.max_parallel,
                stop.clone(),
                move |item| {
                    let executor = Arc::clone(&executor);
                    let stage_name = stage_name.clone();
                    async move { executor.execute(&item, &stage_name).await }
                },
            )
            .await)
        }
    }

    /// Persist one outcome. Returns whether the item is still retry-eligible.
    fn apply_outcome(
        &self,
        item: &Item,
        stage: &StageDescriptor,
        outcome: &StepOutcome,
        store: &Arc<dyn BatchStore>,
        reporter: &ProgressReporter,
    ) -> Result<bool, StoreError> {
        let mut state = item.stage_state(&stage.name);

        if outcome.success {
            state.complete = true;
            state.last_error = None;
            if outcome.artifact.is_some() {
                state.artifact = outcome.artifact.clone();
            }
            store.update_item_stage(&item.id, &stage.name, &state)?;

            metrics::STAGE_ITEM_OUTCOMES
                .with_label_values(&[&stage.name, "success"])
                .inc();
            reporter.log(
                &item.batch_id,
                &stage.name,
                Some(&item.id),
                StageOutcome::Success,
                format!("{} completed {}", item.item_ref, stage.name),
                None,
            );
            return Ok(false);
        }

        let error = outcome
            .error
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());
        state.retry_count += 1;

        if state.retry_count > stage.max_retries {
            // Force completion so the item never blocks later rounds or
            // stages; the annotated error marks it as retry-exhausted.
            state.complete = true;
            state.last_error = Some(format!(
                "retries exhausted after {} attempts: {}",
                stage.max_retries + 1,
                error
            ));
            store.update_item_stage(&item.id, &stage.name, &state)?;

            metrics::STAGE_ITEM_OUTCOMES
                .with_label_values(&[&stage.name, "skipped"])
                .inc();
            warn!(
                "Item {} exhausted retries in stage {}: {}",
                item.item_ref, stage.name, error
            );
            reporter.log(
                &item.batch_id,
                &stage.name,
                Some(&item.id),
                StageOutcome::Skipped,
                format!(
                    "{} skipped in {} after {} attempts",
                    item.item_ref,
                    stage.name,
                    stage.max_retries + 1
                ),
                Some(&error),
            );
            Ok(false)
        } else {
            state.last_error = Some(error.clone());
            store.update_item_stage(&item.id, &stage.name, &state)?;

            metrics::STAGE_ITEM_OUTCOMES
                .with_label_values(&[&stage.name, "failure"])
                .inc();
            reporter.log(
                &item.batch_id,
                &stage.name,
                Some(&item.id),
                StageOutcome::Failure,
                format!(
                    "{} failed {} (attempt {})",
                    item.item_ref, stage.name, state.retry_count
                ),
                Some(&error),
            );
            Ok(true)
        }
    }

    /// Recompute the stage's counters from durable item state.
    fn counters(
        &self,
        batch: &Batch,
        stage: &StageDescriptor,
        store: &Arc<dyn BatchStore>,
    ) -> Result<StageCounters, StoreError> {
        let items = store.items(&batch.id)?;
        let mut counters = StageCounters::default();
        for item in &items {
            let state: ItemStageState = item.stage_state(&stage.name);
            match (state.complete, state.last_error.is_some()) {
                (true, false) => counters.succeeded += 1,
                (true, true) => counters.skipped += 1,
                (false, true) => counters.failed += 1,
                (false, false) => counters.pending += 1,
            }
        }
        Ok(counters)
    }
}
