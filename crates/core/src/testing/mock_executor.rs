//! Mock step executor for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::batch::{ArtifactPayload, Item};
use crate::executor::{StepExecutor, StepOutcome};

/// A recorded executor invocation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedInvocation {
    pub item_id: String,
    pub item_ref: String,
    pub stage: String,
    pub success: bool,
}

/// Mock implementation of the StepExecutor trait.
///
/// Provides controllable behavior for testing:
/// - Script per-item failure sequences (fail N times, then succeed)
/// - Record invocations for assertions
/// - Simulate slow external calls
/// - Probe how many workers run concurrently
/// - Panic on demand to exercise fault conversion
///
/// # Example
///
/// ```rust,ignore
/// use convoy_core::testing::MockExecutor;
///
/// let executor = MockExecutor::new("dns");
/// executor.fail_times("alpha.example", 2).await;
///
/// // First two attempts for alpha.example fail, the third succeeds.
/// let invocations = executor.recorded_invocations().await;
/// ```
#[derive(Debug, Clone)]
pub struct MockExecutor {
    name: String,
    /// Remaining scripted failures per item ref.
    failures: Arc<RwLock<HashMap<String, u32>>>,
    /// Item refs that fail on every attempt.
    always_fail: Arc<RwLock<Vec<String>>>,
    /// Item refs whose invocation panics.
    panic_on: Arc<RwLock<Vec<String>>>,
    /// Recorded invocations.
    invocations: Arc<RwLock<Vec<RecordedInvocation>>>,
    /// Artifact returned on success.
    artifact: Arc<RwLock<Option<ArtifactPayload>>>,
    /// Simulated call duration in milliseconds.
    delay_ms: Arc<RwLock<u64>>,
    /// Workers currently inside execute().
    active: Arc<AtomicUsize>,
    /// High-water mark of concurrent workers.
    max_observed: Arc<AtomicUsize>,
}

impl MockExecutor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failures: Arc::new(RwLock::new(HashMap::new())),
            always_fail: Arc::new(RwLock::new(Vec::new())),
            panic_on: Arc::new(RwLock::new(Vec::new())),
            invocations: Arc::new(RwLock::new(Vec::new())),
            artifact: Arc::new(RwLock::new(None)),
            delay_ms: Arc::new(RwLock::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            max_observed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script the next `count` attempts for an item ref to fail.
    pub async fn fail_times(&self, item_ref: impl Into<String>, count: u32) {
        self.failures.write().await.insert(item_ref.into(), count);
    }

    /// Make every attempt for an item ref fail.
    pub async fn fail_always(&self, item_ref: impl Into<String>) {
        self.always_fail.write().await.push(item_ref.into());
    }

    /// Make the invocation for an item ref panic.
    pub async fn panic_on(&self, item_ref: impl Into<String>) {
        self.panic_on.write().await.push(item_ref.into());
    }

    /// Artifact attached to successful outcomes.
    pub async fn set_artifact(&self, artifact: ArtifactPayload) {
        *self.artifact.write().await = Some(artifact);
    }

    /// Simulated duration of each call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay_ms.write().await = delay.as_millis() as u64;
    }

    /// All recorded invocations.
    pub async fn recorded_invocations(&self) -> Vec<RecordedInvocation> {
        self.invocations.read().await.clone()
    }

    /// Invocation count for one item ref.
    pub async fn invocation_count(&self, item_ref: &str) -> usize {
        self.invocations
            .read()
            .await
            .iter()
            .filter(|i| i.item_ref == item_ref)
            .count()
    }

    /// Total invocation count.
    pub async fn total_invocations(&self) -> usize {
        self.invocations.read().await.len()
    }

    /// Highest number of concurrent invocations observed.
    pub fn max_concurrency_observed(&self) -> usize {
        self.max_observed.load(Ordering::SeqCst)
    }

    async fn should_fail(&self, item_ref: &str) -> bool {
        if self.always_fail.read().await.iter().any(|r| r == item_ref) {
            return true;
        }
        let mut failures = self.failures.write().await;
        if let Some(remaining) = failures.get_mut(item_ref) {
            if *remaining > 0 {
                *remaining -= 1;
                return true;
            }
        }
        false
    }
}

#[async_trait]
impl StepExecutor for MockExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, item: &Item, stage: &str) -> StepOutcome {
        if self.panic_on.read().await.iter().any(|r| r == &item.item_ref) {
            panic!("scripted panic for {}", item.item_ref);
        }

        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay_ms.read().await;
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);

        let fail = self.should_fail(&item.item_ref).await;
        self.invocations.write().await.push(RecordedInvocation {
            item_id: item.id.clone(),
            item_ref: item.item_ref.clone(),
            stage: stage.to_string(),
            success: !fail,
        });

        if fail {
            StepOutcome::failed(&item.id, format!("scripted failure for {}", item.item_ref))
        } else {
            match self.artifact.read().await.clone() {
                Some(artifact) => StepOutcome::ok_with_artifact(&item.id, artifact),
                None => StepOutcome::ok(&item.id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(item_ref: &str) -> Item {
        Item {
            id: format!("id-{}", item_ref),
            batch_id: "b-1".to_string(),
            item_ref: item_ref.to_string(),
            stages: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_succeeds_by_default() {
        let executor = MockExecutor::new("mock");
        let outcome = executor.execute(&item("a"), "dns_zone").await;
        assert!(outcome.success);
        assert_eq!(executor.invocation_count("a").await, 1);
    }

    #[tokio::test]
    async fn test_fail_times_then_succeed() {
        let executor = MockExecutor::new("mock");
        executor.fail_times("a", 2).await;

        assert!(!executor.execute(&item("a"), "s").await.success);
        assert!(!executor.execute(&item("a"), "s").await.success);
        assert!(executor.execute(&item("a"), "s").await.success);
    }

    #[tokio::test]
    async fn test_fail_always() {
        let executor = MockExecutor::new("mock");
        executor.fail_always("a").await;

        for _ in 0..5 {
            assert!(!executor.execute(&item("a"), "s").await.success);
        }
    }

    #[tokio::test]
    async fn test_artifact_attached_on_success() {
        let executor = MockExecutor::new("mock");
        executor
            .set_artifact(ArtifactPayload::Mailbox {
                address: "admin@a.example".to_string(),
            })
            .await;

        let outcome = executor.execute(&item("a"), "mailbox").await;
        assert!(matches!(
            outcome.artifact,
            Some(ArtifactPayload::Mailbox { .. })
        ));
    }

    #[tokio::test]
    async fn test_records_stage_and_success() {
        let executor = MockExecutor::new("mock");
        executor.fail_always("b").await;

        executor.execute(&item("a"), "dns_zone").await;
        executor.execute(&item("b"), "dns_zone").await;

        let invocations = executor.recorded_invocations().await;
        assert_eq!(invocations.len(), 2);
        assert!(invocations[0].success);
        assert!(!invocations[1].success);
        assert_eq!(invocations[0].stage, "dns_zone");
    }
}
