use std::collections::HashSet;

use regex_lite::Regex;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Stage names are well-formed and unique
/// - Every non-gate stage names a configured executor
/// - Gate stages carry no executor
/// - Executor names are unique
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let name_pattern = Regex::new("^[a-z][a-z0-9_-]*$").expect("static pattern");

    let mut executor_names = HashSet::new();
    for executor in &config.executors {
        if !executor_names.insert(executor.name()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate executor name: {}",
                executor.name()
            )));
        }
    }

    let mut stage_names = HashSet::new();
    for stage in &config.stages {
        if !name_pattern.is_match(&stage.name) {
            return Err(ConfigError::ValidationError(format!(
                "invalid stage name: {:?}",
                stage.name
            )));
        }
        if !stage_names.insert(stage.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate stage name: {}",
                stage.name
            )));
        }

        if stage.manual_gate {
            if stage.executor.is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "gate stage {} cannot have an executor",
                    stage.name
                )));
            }
        } else {
            let executor = stage.executor.as_deref().ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "stage {} has no executor and is not a gate",
                    stage.name
                ))
            })?;
            if !executor_names.contains(executor) {
                return Err(ConfigError::ValidationError(format!(
                    "stage {} references unknown executor {}",
                    stage.name, executor
                )));
            }
        }
    }

    Ok(())
}
