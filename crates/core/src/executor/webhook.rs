//! Step executor that POSTs each item to a configured HTTP endpoint.
//!
//! Generic adapter for network-API shaped integrations (DNS providers,
//! admin portals with HTTP automation frontends). A 2xx response is
//! success; a JSON response body is kept as the item's artifact.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::batch::{ArtifactPayload, Item};

use super::{ExecutorError, StepExecutor, StepOutcome};

/// Configuration for a webhook executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Endpoint to POST item payloads to.
    pub url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Optional value for the Authorization header.
    #[serde(default)]
    pub auth_header: Option<String>,
}

fn default_timeout() -> u64 {
    30
}

/// Calls an HTTP endpoint once per item.
pub struct WebhookExecutor {
    name: String,
    config: WebhookConfig,
    client: reqwest::Client,
}

impl WebhookExecutor {
    pub fn new(name: impl Into<String>, config: WebhookConfig) -> Result<Self, ExecutorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExecutorError::Http(format!("failed to build client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            config,
            client,
        })
    }

    async fn call(&self, item: &Item, stage: &str) -> Result<Option<ArtifactPayload>, ExecutorError> {
        let payload = json!({
            "batch_id": item.batch_id,
            "item_id": item.id,
            "item_ref": item.item_ref,
            "stage": stage,
            "artifact": item.stage_state(stage).artifact,
        });

        debug!("POST {} for item {} in stage {}", self.config.url, item.item_ref, stage);

        let mut request = self.client.post(&self.config.url).json(&payload);
        if let Some(ref auth) = self.config.auth_header {
            request = request.header(reqwest::header::AUTHORIZATION, auth);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExecutorError::Timeout(self.config.timeout_secs)
            } else {
                ExecutorError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.chars().take(200).collect();
            return Err(ExecutorError::Http(format!("HTTP {}: {}", status, detail)));
        }

        let artifact = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .filter(|v| !v.is_null())
            .map(ArtifactPayload::Opaque);

        Ok(artifact)
    }
}

#[async_trait]
impl StepExecutor for WebhookExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, item: &Item, stage: &str) -> StepOutcome {
        StepOutcome::from_result(&item.id, self.call(item, stage).await)
    }
}
