//! Bounded worker pool for per-item external operations.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::warn;

use crate::batch::Item;
use crate::executor::StepOutcome;

use super::types::StopFlag;

/// Run `per_item` for every item with at most `max_parallel` invocations in
/// flight at once.
///
/// Guarantees:
/// - a panicking worker is converted into a failure outcome for its item,
///   never propagated, and never disturbs concurrent workers;
/// - the stop flag is checked before each item is dispatched; items not
///   dispatched yield `None` and stay eligible;
/// - outcomes are returned in item order.
///
/// Each worker owns its own resources; nothing mutable is shared between
/// concurrent invocations.
pub async fn run_bounded<F, Fut>(
    items: Vec<Item>,
    max_parallel: usize,
    stop: StopFlag,
    per_item: F,
) -> Vec<Option<StepOutcome>>
where
    F: Fn(Item) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = StepOutcome> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
    let per_item = Arc::new(per_item);

    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        let item_id = item.id.clone();
        let semaphore = Arc::clone(&semaphore);
        let per_item = Arc::clone(&per_item);
        let stop = stop.clone();

        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            if stop.is_set() {
                return None;
            }
            Some(per_item(item).await)
        });
        handles.push((item_id, handle));
    }

    futures::future::join_all(handles.into_iter().map(|(item_id, handle)| async move {
        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Worker for item {} panicked: {}", item_id, e);
                Some(StepOutcome::failed(
                    item_id,
                    format!("worker panicked: {}", e),
                ))
            }
        }
    }))
    .await
}
