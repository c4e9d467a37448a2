//! Configuration loading and validation.

mod loader;
mod types;
mod validate;

use thiserror::Error;

pub use loader::{load_config, load_config_from_str};
pub use types::{
    Config, DatabaseConfig, EngineConfig, ExecutorConfig, FaultPolicy, SanitizedConfig,
    ServerConfig, StageClass, StageConfig,
};
pub use validate::validate_config;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("config file not found: {0}")]
    FileNotFound(String),

    /// Failed to parse configuration.
    #[error("failed to parse config: {0}")]
    ParseError(String),

    /// Configuration is structurally valid but semantically wrong.
    #[error("invalid config: {0}")]
    ValidationError(String),
}
