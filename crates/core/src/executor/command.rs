//! Step executor that shells out to a configured program per item.
//!
//! Generic adapter for remote-shell shaped integrations (e.g. a wrapper
//! script around `ssh` that provisions a mailbox). The program receives the
//! item reference as its final argument plus `CONVOY_*` environment
//! variables; a zero exit code is success, and stdout that parses as JSON
//! is kept as the item's artifact.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::batch::{ArtifactPayload, Item};

use super::{ExecutorError, StepExecutor, StepOutcome};

/// Configuration for a command executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    /// Program to run.
    pub program: String,

    /// Fixed arguments passed before the item reference.
    #[serde(default)]
    pub args: Vec<String>,

    /// Per-invocation timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    300
}

/// Runs an external program once per item.
pub struct CommandExecutor {
    name: String,
    config: CommandConfig,
}

impl CommandExecutor {
    pub fn new(name: impl Into<String>, config: CommandConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    async fn run(&self, item: &Item, stage: &str) -> Result<Option<ArtifactPayload>, ExecutorError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg(&item.item_ref)
            .env("CONVOY_BATCH", &item.batch_id)
            .env("CONVOY_ITEM", &item.id)
            .env("CONVOY_ITEM_REF", &item.item_ref)
            .env("CONVOY_STAGE", stage)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            "Running {} for item {} in stage {}",
            self.config.program, item.item_ref, stage
        );

        let child = command
            .spawn()
            .map_err(|e| ExecutorError::Process(format!("failed to spawn {}: {}", self.config.program, e)))?;

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| ExecutorError::Timeout(self.config.timeout_secs))?
        .map_err(|e| ExecutorError::Process(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ExecutorError::Process(format!(
                "{} exited with {}: {}",
                self.config.program, output.status, tail
            )));
        }

        // A JSON stdout becomes the item's artifact; anything else is
        // treated as plain logging from the program.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let artifact = serde_json::from_str::<serde_json::Value>(stdout.trim())
            .ok()
            .map(ArtifactPayload::Opaque);

        Ok(artifact)
    }
}

#[async_trait]
impl StepExecutor for CommandExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, item: &Item, stage: &str) -> StepOutcome {
        StepOutcome::from_result(&item.id, self.run(item, stage).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn item(item_ref: &str) -> Item {
        Item {
            id: "i-1".to_string(),
            batch_id: "b-1".to_string(),
            item_ref: item_ref.to_string(),
            stages: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_successful_command() {
        let executor = CommandExecutor::new(
            "echo",
            CommandConfig {
                program: "true".to_string(),
                args: vec![],
                timeout_secs: 10,
            },
        );

        let outcome = executor.execute(&item("alpha.example"), "mailbox").await;
        assert!(outcome.success, "error: {:?}", outcome.error);
        assert_eq!(outcome.item_id, "i-1");
    }

    #[tokio::test]
    async fn test_failing_command() {
        let executor = CommandExecutor::new(
            "fail",
            CommandConfig {
                program: "false".to_string(),
                args: vec![],
                timeout_secs: 10,
            },
        );

        let outcome = executor.execute(&item("alpha.example"), "mailbox").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("exited with"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let executor = CommandExecutor::new(
            "ghost",
            CommandConfig {
                program: "/nonexistent/program".to_string(),
                args: vec![],
                timeout_secs: 10,
            },
        );

        let outcome = executor.execute(&item("alpha.example"), "mailbox").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn test_json_stdout_becomes_artifact() {
        let executor = CommandExecutor::new(
            "json",
            CommandConfig {
                program: "echo".to_string(),
                args: vec![r#"{"mailbox":"admin@alpha.example"}"#.to_string()],
                timeout_secs: 10,
            },
        );

        let outcome = executor.execute(&item("alpha.example"), "mailbox").await;
        assert!(outcome.success);
        match outcome.artifact {
            Some(ArtifactPayload::Opaque(value)) => {
                assert_eq!(value["mailbox"], "admin@alpha.example");
            }
            other => panic!("expected opaque artifact, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_json_stdout_is_ignored() {
        let executor = CommandExecutor::new(
            "plain",
            CommandConfig {
                program: "echo".to_string(),
                args: vec!["provisioned ok".to_string()],
                timeout_secs: 10,
            },
        );

        let outcome = executor.execute(&item("alpha.example"), "mailbox").await;
        assert!(outcome.success);
        assert!(outcome.artifact.is_none());
    }

    #[tokio::test]
    async fn test_timeout() {
        let executor = CommandExecutor::new(
            "slow",
            CommandConfig {
                program: "sleep".to_string(),
                args: vec!["5".to_string()],
                timeout_secs: 1,
            },
        );

        let outcome = executor.execute(&item("alpha.example"), "mailbox").await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("timed out"));
    }
}
