//! Step executor interface and generic adapters.
//!
//! Executors perform the side-effecting external work for one item in one
//! stage. They report failure through the returned outcome rather than an
//! error type, so a misbehaving integration can never abort a round; only
//! panics are left for the worker pool to absorb.

mod command;
mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::batch::{ArtifactPayload, Item};
use crate::config::ExecutorConfig;

pub use command::{CommandConfig, CommandExecutor};
pub use webhook::{WebhookConfig, WebhookExecutor};

/// Internal error type used by executor adapters before conversion into a
/// failed [`StepOutcome`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Failed to launch or wait on an external process.
    #[error("process error: {0}")]
    Process(String),

    /// HTTP transport or status error.
    #[error("http error: {0}")]
    Http(String),

    /// The external call ran past its deadline.
    #[error("timed out after {0}s")]
    Timeout(u64),
}

/// Result of one executor invocation for one item.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Item the outcome belongs to.
    pub item_id: String,
    /// Whether the step succeeded.
    pub success: bool,
    /// Error detail on failure.
    pub error: Option<String>,
    /// Executor-owned payload to persist on the item.
    pub artifact: Option<ArtifactPayload>,
}

impl StepOutcome {
    /// Successful outcome with no artifact.
    pub fn ok(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            success: true,
            error: None,
            artifact: None,
        }
    }

    /// Successful outcome carrying an artifact.
    pub fn ok_with_artifact(item_id: impl Into<String>, artifact: ArtifactPayload) -> Self {
        Self {
            item_id: item_id.into(),
            success: true,
            error: None,
            artifact: Some(artifact),
        }
    }

    /// Failed outcome.
    pub fn failed(item_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            success: false,
            error: Some(error.into()),
            artifact: None,
        }
    }

    /// Convert an adapter-level result into an outcome.
    pub fn from_result(
        item_id: impl Into<String>,
        result: Result<Option<ArtifactPayload>, ExecutorError>,
    ) -> Self {
        let item_id = item_id.into();
        match result {
            Ok(artifact) => Self {
                item_id,
                success: true,
                error: None,
                artifact,
            },
            Err(e) => Self::failed(item_id, e.to_string()),
        }
    }
}

/// A side-effecting integration driven by the orchestrator.
///
/// Implementations should be idempotent on retry where feasible; the
/// orchestrator assumes but does not enforce this.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Short name used in logs and the registry.
    fn name(&self) -> &str;

    /// Execute the stage for a single item.
    async fn execute(&self, item: &Item, stage: &str) -> StepOutcome;

    /// Execute the stage for a set of items in one invocation.
    ///
    /// The default maps over [`execute`](Self::execute) sequentially;
    /// executors that amortize setup cost (one authenticated session reused
    /// across sub-operations) override this.
    async fn execute_batch(&self, items: &[Item], stage: &str) -> Vec<StepOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(self.execute(item, stage).await);
        }
        outcomes
    }
}

/// Named lookup of the executors a deployment has configured.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its own name. Replaces any previous
    /// executor with the same name.
    pub fn register(&mut self, executor: Arc<dyn StepExecutor>) {
        self.executors
            .insert(executor.name().to_string(), executor);
    }

    /// Look up an executor by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn StepExecutor>> {
        self.executors.get(name).cloned()
    }

    /// Names of all registered executors.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Build a registry from the configured executors.
pub fn build_registry(configs: &[ExecutorConfig]) -> Result<ExecutorRegistry, ExecutorError> {
    let mut registry = ExecutorRegistry::new();
    for config in configs {
        match config {
            ExecutorConfig::Command { name, config } => {
                registry.register(Arc::new(CommandExecutor::new(name.clone(), config.clone())));
            }
            ExecutorConfig::Webhook { name, config } => {
                registry.register(Arc::new(WebhookExecutor::new(
                    name.clone(),
                    config.clone(),
                )?));
            }
        }
    }
    Ok(registry)
}
