//! Append-only transition log with a low-latency ring buffer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::batch::{BatchStore, StageOutcome, StageResult};

/// Records stage transitions durably (best effort) and mirrors recent
/// activity in memory for cheap polling reads.
///
/// A failed durable write is logged and swallowed; progress reporting must
/// never fail the orchestrator.
pub struct ProgressReporter {
    store: Arc<dyn BatchStore>,
    ring: Mutex<VecDeque<StageResult>>,
    capacity: usize,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn BatchStore>, capacity: usize) -> Self {
        Self {
            store,
            ring: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
        }
    }

    /// Record one stage transition.
    pub fn log(
        &self,
        batch_id: &str,
        stage: &str,
        item_id: Option<&str>,
        outcome: StageOutcome,
        message: impl Into<String>,
        error: Option<&str>,
    ) {
        let mut result = StageResult {
            id: 0,
            batch_id: batch_id.to_string(),
            item_id: item_id.map(String::from),
            stage: stage.to_string(),
            outcome,
            message: message.into(),
            error: error.map(String::from),
            created_at: Utc::now(),
        };

        match self.store.append_result(&result) {
            Ok(id) => result.id = id,
            Err(e) => {
                tracing::warn!(
                    "Failed to persist stage result for batch {}: {}",
                    batch_id,
                    e
                );
            }
        }

        let mut ring = self.ring.lock().unwrap();
        ring.push_back(result);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// Recent activity for a batch from the in-memory ring, newest first.
    pub fn recent(&self, batch_id: &str, limit: usize) -> Vec<StageResult> {
        let ring = self.ring.lock().unwrap();
        ring.iter()
            .rev()
            .filter(|r| r.batch_id == batch_id)
            .take(limit)
            .cloned()
            .collect()
    }
}
