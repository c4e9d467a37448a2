//! Live job status cache.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::batch::{Batch, BatchStatus, StageCounters};

/// Cap on the error list carried in a job status.
const MAX_ERRORS: usize = 50;

/// Ephemeral, best-effort view of one batch's progress.
///
/// Non-authoritative: may be absent or stale, and is always reconstructible
/// from the durable batch and item state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    /// Batch this status mirrors.
    pub batch_id: String,
    /// Overall status.
    pub status: BatchStatus,
    /// Index of the stage currently running (or next to run).
    pub current_stage: usize,
    /// Name of that stage, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
    /// Human-readable progress message.
    pub message: String,
    /// Per-stage counters, keyed by stage name.
    pub counters: HashMap<String, StageCounters>,
    /// Recent error summaries, bounded.
    pub errors: Vec<String>,
    /// Last liveness signal from the orchestration task.
    pub heartbeat_at: DateTime<Utc>,
}

impl JobStatus {
    /// Build a status summary from durable batch state.
    pub fn from_batch(batch: &Batch) -> Self {
        let stage_name = batch.stages.get(batch.current_stage).cloned();
        let message = match batch.status {
            BatchStatus::Running => format!(
                "running stage {} ({}/{})",
                stage_name.as_deref().unwrap_or("?"),
                batch.current_stage + 1,
                batch.stages.len()
            ),
            BatchStatus::Paused => "paused".to_string(),
            BatchStatus::Completed => "completed".to_string(),
            BatchStatus::Error => "halted on fatal error".to_string(),
        };

        Self {
            batch_id: batch.id.clone(),
            status: batch.status,
            current_stage: batch.current_stage,
            stage_name,
            message,
            counters: batch.counters.clone(),
            errors: Vec::new(),
            heartbeat_at: Utc::now(),
        }
    }

    /// Append an error summary, dropping the oldest past the cap.
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        if self.errors.len() > MAX_ERRORS {
            let excess = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..excess);
        }
    }
}

/// Concurrency-safe cache of live job statuses, keyed by batch id.
///
/// Populated on start/resume, rebuilt from durable state on a miss, and
/// evicted on batch deletion. Never shared ad hoc.
#[derive(Default)]
pub struct StatusBoard {
    inner: RwLock<HashMap<String, JobStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the cached status for a batch.
    pub async fn insert(&self, status: JobStatus) {
        self.inner
            .write()
            .await
            .insert(status.batch_id.clone(), status);
    }

    /// Seed the cache from durable batch state.
    pub async fn populate(&self, batch: &Batch) {
        self.insert(JobStatus::from_batch(batch)).await;
    }

    /// Mutate the cached status, if present, refreshing the heartbeat.
    pub async fn update<F>(&self, batch_id: &str, f: F)
    where
        F: FnOnce(&mut JobStatus),
    {
        let mut inner = self.inner.write().await;
        if let Some(status) = inner.get_mut(batch_id) {
            f(status);
            status.heartbeat_at = Utc::now();
        }
    }

    /// Refresh only the heartbeat, signalling liveness.
    pub async fn touch(&self, batch_id: &str) {
        self.update(batch_id, |_| {}).await;
    }

    /// Current cached status for a batch.
    pub async fn get(&self, batch_id: &str) -> Option<JobStatus> {
        self.inner.read().await.get(batch_id).cloned()
    }

    /// Whether a cache entry exists.
    pub async fn contains(&self, batch_id: &str) -> bool {
        self.inner.read().await.contains_key(batch_id)
    }

    /// Evict a batch from the cache.
    pub async fn remove(&self, batch_id: &str) {
        self.inner.write().await.remove(batch_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Batch {
        Batch {
            id: "b-1".to_string(),
            name: "wave-1".to_string(),
            stages: vec!["dns_zone".to_string(), "verify".to_string()],
            current_stage: 1,
            status: BatchStatus::Running,
            counters: HashMap::new(),
            gate_confirmed: false,
            created_at: Utc::now(),
            started_at: Some(Utc::now()),
            paused_at: None,
            completed_at: None,
        }
    }

    #[test]
    fn test_from_batch() {
        let status = JobStatus::from_batch(&batch());
        assert_eq!(status.batch_id, "b-1");
        assert_eq!(status.current_stage, 1);
        assert_eq!(status.stage_name.as_deref(), Some("verify"));
        assert_eq!(status.message, "running stage verify (2/2)");
    }

    #[test]
    fn test_error_cap() {
        let mut status = JobStatus::from_batch(&batch());
        for i in 0..60 {
            status.push_error(format!("error {}", i));
        }
        assert_eq!(status.errors.len(), MAX_ERRORS);
        assert_eq!(status.errors[0], "error 10");
        assert_eq!(status.errors.last().unwrap(), "error 59");
    }

    #[tokio::test]
    async fn test_board_lifecycle() {
        let board = StatusBoard::new();
        assert!(board.get("b-1").await.is_none());

        board.populate(&batch()).await;
        assert!(board.contains("b-1").await);

        board
            .update("b-1", |s| s.message = "running stage verify".to_string())
            .await;
        assert_eq!(
            board.get("b-1").await.unwrap().message,
            "running stage verify"
        );

        board.remove("b-1").await;
        assert!(!board.contains("b-1").await);
    }

    #[tokio::test]
    async fn test_touch_advances_heartbeat() {
        let board = StatusBoard::new();
        board.populate(&batch()).await;

        let before = board.get("b-1").await.unwrap().heartbeat_at;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        board.touch("b-1").await;
        let after = board.get("b-1").await.unwrap().heartbeat_at;
        assert!(after > before);
    }

    #[tokio::test]
    async fn test_update_missing_is_noop() {
        let board = StatusBoard::new();
        board.update("ghost", |s| s.message = "x".to_string()).await;
        assert!(board.get("ghost").await.is_none());
    }
}
