use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::auth::{AuthConfig, AuthMethod};
use crate::executor::{CommandConfig, WebhookConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
    #[serde(default)]
    pub executors: Vec<ExecutorConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("convoy.db")
}

/// Orchestration engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Default per-item retry budget per stage (attempts = max_retries + 1).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed sleep between retry rounds (milliseconds).
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Manual gate poll interval (milliseconds).
    #[serde(default = "default_gate_poll_interval")]
    pub gate_poll_interval_ms: u64,

    /// Hard wall-clock ceiling on the manual gate (seconds).
    /// On expiry the gate force-completes rather than blocking forever.
    #[serde(default = "default_gate_ceiling")]
    pub gate_ceiling_secs: u64,

    /// Capacity of the in-memory recent-activity ring buffer.
    #[serde(default = "default_ring_capacity")]
    pub activity_ring_capacity: usize,
}

fn default_max_retries() -> u32 {
    4
}

fn default_retry_backoff() -> u64 {
    5000
}

fn default_gate_poll_interval() -> u64 {
    2000
}

fn default_gate_ceiling() -> u64 {
    86400 // 24 hours
}

fn default_ring_capacity() -> usize {
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            gate_poll_interval_ms: default_gate_poll_interval(),
            gate_ceiling_secs: default_gate_ceiling(),
            activity_ring_capacity: default_ring_capacity(),
        }
    }
}

/// Resource cost class of a stage, used to clamp parallelism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageClass {
    /// Cheap network-API work; tolerates high parallelism.
    #[default]
    Api,
    /// Expensive interactive automation (e.g. a driven browser session).
    Automation,
}

/// What a stage fault does to the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Record the fault and proceed to the next stage.
    #[default]
    Continue,
    /// Halt the batch with status error; requires an operator resume.
    Halt,
}

/// Declarative description of one pipeline stage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageConfig {
    /// Stage name; also the key for counters and item state.
    pub name: String,

    /// Executor to run (required unless this is a manual gate).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<String>,

    /// Resource class, used to clamp parallelism.
    #[serde(default)]
    pub class: StageClass,

    /// Whether this stage blocks on an external confirmation.
    #[serde(default)]
    pub manual_gate: bool,

    /// Concurrent item workers (clamped by class; class default if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Per-stage retry budget override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Stage fault policy.
    #[serde(default)]
    pub fault_policy: FaultPolicy,

    /// Hand the whole eligible set to the executor in one invocation
    /// (for executors that amortize setup cost).
    #[serde(default)]
    pub batched: bool,
}

/// Configuration for one named step executor.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorConfig {
    /// Run an external program per item.
    Command {
        name: String,
        #[serde(flatten)]
        config: CommandConfig,
    },
    /// POST each item to an HTTP endpoint.
    Webhook {
        name: String,
        #[serde(flatten)]
        config: WebhookConfig,
    },
}

impl ExecutorConfig {
    pub fn name(&self) -> &str {
        match self {
            ExecutorConfig::Command { name, .. } => name,
            ExecutorConfig::Webhook { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorConfig::Command { .. } => "command",
            ExecutorConfig::Webhook { .. } => "webhook",
        }
    }
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub engine: EngineConfig,
    pub stages: Vec<StageConfig>,
    pub executors: Vec<SanitizedExecutorConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: AuthMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedExecutorConfig {
    pub name: String,
    pub kind: &'static str,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: config.auth.method,
            },
            server: config.server.clone(),
            database: config.database.clone(),
            engine: config.engine.clone(),
            stages: config.stages.clone(),
            executors: config
                .executors
                .iter()
                .map(|e| SanitizedExecutorConfig {
                    name: e.name().to_string(),
                    kind: e.kind(),
                })
                .collect(),
        }
    }
}
