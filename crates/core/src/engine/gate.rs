//! Manual confirmation gate and the shared polling primitive.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::batch::BatchStore;
use crate::progress::StatusBoard;

use super::types::StopFlag;

/// Result of a bounded polling wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    /// The condition became true before the ceiling.
    Met,
    /// The wall-clock ceiling elapsed first.
    TimedOut,
}

/// Poll `condition` at a fixed interval until it holds or the wall-clock
/// ceiling elapses.
///
/// The condition is checked once immediately, then after each interval.
/// Shared by the manual gate and any other wait-for-external-condition
/// stage.
pub async fn poll_until<F, Fut>(
    mut condition: F,
    interval: Duration,
    ceiling: Duration,
) -> PollVerdict
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + ceiling;
    loop {
        if condition().await {
            return PollVerdict::Met;
        }
        if tokio::time::Instant::now() >= deadline {
            return PollVerdict::TimedOut;
        }
        tokio::time::sleep(interval).await;
    }
}

/// How a gate wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVerdict {
    /// A confirmation flag was set.
    Confirmed,
    /// The ceiling elapsed with no confirmation; the gate force-completes.
    TimedOut,
    /// A stop was requested while waiting.
    Stopped,
}

/// Waits for an external confirmation before letting a batch proceed.
///
/// Each poll iteration checks, in order: the stop signal, the durable
/// confirmation flag, and the in-memory flag (fast path). The first one set
/// wins. Each iteration also refreshes the heartbeat so liveness stays
/// externally observable.
pub struct GateController {
    pub poll_interval: Duration,
    pub ceiling: Duration,
}

impl GateController {
    pub fn new(poll_interval: Duration, ceiling: Duration) -> Self {
        Self {
            poll_interval,
            ceiling,
        }
    }

    pub async fn wait(
        &self,
        batch_id: &str,
        stage: &str,
        stop: &StopFlag,
        confirmed: &Arc<AtomicBool>,
        store: &Arc<dyn BatchStore>,
        board: &StatusBoard,
    ) -> GateVerdict {
        info!(
            "Batch {} waiting for confirmation at gate stage {}",
            batch_id, stage
        );

        let verdict = poll_until(
            || async move {
                if stop.is_set() {
                    return true;
                }
                match store.get_batch(batch_id) {
                    Ok(Some(batch)) if batch.gate_confirmed => return true,
                    Ok(_) => {}
                    Err(e) => {
                        // The gate keeps waiting through transient store
                        // trouble; the durable flag is re-read next poll.
                        warn!("Gate poll failed to read batch {}: {}", batch_id, e);
                    }
                }
                if confirmed.load(Ordering::SeqCst) {
                    return true;
                }
                board.touch(batch_id).await;
                debug!("Gate stage {} still waiting for batch {}", stage, batch_id);
                false
            },
            self.poll_interval,
            self.ceiling,
        )
        .await;

        match verdict {
            PollVerdict::TimedOut => {
                warn!(
                    "Gate stage {} for batch {} timed out after {:?}; force-completing",
                    stage, batch_id, self.ceiling
                );
                GateVerdict::TimedOut
            }
            PollVerdict::Met => {
                if stop.is_set() {
                    GateVerdict::Stopped
                } else {
                    info!("Gate stage {} confirmed for batch {}", stage, batch_id);
                    GateVerdict::Confirmed
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchStore, CreateBatchRequest, SqliteBatchStore};
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_poll_until_met_immediately() {
        let verdict = poll_until(
            || async { true },
            Duration::from_millis(10),
            Duration::from_millis(100),
        )
        .await;
        assert_eq!(verdict, PollVerdict::Met);
    }

    #[tokio::test]
    async fn test_poll_until_met_after_some_iterations() {
        let count = AtomicUsize::new(0);
        let count = &count;
        let verdict = poll_until(
            || async move { count.fetch_add(1, Ordering::SeqCst) + 1 >= 3 },
            Duration::from_millis(5),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(verdict, PollVerdict::Met);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_until_times_out() {
        let start = tokio::time::Instant::now();
        let verdict = poll_until(
            || async { false },
            Duration::from_millis(10),
            Duration::from_millis(60),
        )
        .await;
        assert_eq!(verdict, PollVerdict::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    fn gate_fixture() -> (Arc<dyn BatchStore>, String, StatusBoard) {
        let store = Arc::new(SqliteBatchStore::in_memory().unwrap());
        let batch = store
            .create_batch(CreateBatchRequest {
                name: "wave-1".to_string(),
                stages: vec!["await_confirmation".to_string()],
                item_refs: vec!["alpha.example".to_string()],
            })
            .unwrap();
        (store as Arc<dyn BatchStore>, batch.id, StatusBoard::new())
    }

    #[tokio::test]
    async fn test_gate_times_out_without_confirmation() {
        let (store, batch_id, board) = gate_fixture();
        let gate = GateController::new(Duration::from_millis(10), Duration::from_millis(80));

        let verdict = gate
            .wait(
                &batch_id,
                "await_confirmation",
                &StopFlag::new(),
                &Arc::new(AtomicBool::new(false)),
                &store,
                &board,
            )
            .await;

        assert_eq!(verdict, GateVerdict::TimedOut);
    }

    #[tokio::test]
    async fn test_gate_memory_flag_confirms() {
        let (store, batch_id, board) = gate_fixture();
        let gate = GateController::new(Duration::from_millis(10), Duration::from_secs(5));
        let confirmed = Arc::new(AtomicBool::new(false));

        let confirmed2 = Arc::clone(&confirmed);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            confirmed2.store(true, Ordering::SeqCst);
        });

        let verdict = gate
            .wait(
                &batch_id,
                "await_confirmation",
                &StopFlag::new(),
                &confirmed,
                &store,
                &board,
            )
            .await;

        assert_eq!(verdict, GateVerdict::Confirmed);
    }

    #[tokio::test]
    async fn test_gate_durable_flag_confirms() {
        let (store, batch_id, board) = gate_fixture();
        let gate = GateController::new(Duration::from_millis(10), Duration::from_secs(5));

        store.set_gate_confirmed(&batch_id, true).unwrap();

        let verdict = gate
            .wait(
                &batch_id,
                "await_confirmation",
                &StopFlag::new(),
                &Arc::new(AtomicBool::new(false)),
                &store,
                &board,
            )
            .await;

        assert_eq!(verdict, GateVerdict::Confirmed);
    }

    #[tokio::test]
    async fn test_gate_stop_wins_over_confirmation() {
        let (store, batch_id, board) = gate_fixture();
        let gate = GateController::new(Duration::from_millis(10), Duration::from_secs(5));

        let stop = StopFlag::new();
        stop.trigger();
        // Both set: stop is checked first
        store.set_gate_confirmed(&batch_id, true).unwrap();

        let verdict = gate
            .wait(
                &batch_id,
                "await_confirmation",
                &stop,
                &Arc::new(AtomicBool::new(true)),
                &store,
                &board,
            )
            .await;

        assert_eq!(verdict, GateVerdict::Stopped);
    }
}
