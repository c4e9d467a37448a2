//! Shared fixtures for engine tests.

use crate::config::{EngineConfig, FaultPolicy, StageClass, StageConfig};

/// Standard stage backed by the named executor.
pub fn stage(name: &str, executor: &str) -> StageConfig {
    StageConfig {
        name: name.to_string(),
        executor: Some(executor.to_string()),
        class: StageClass::Api,
        manual_gate: false,
        max_parallel: None,
        max_retries: None,
        fault_policy: FaultPolicy::Continue,
        batched: false,
    }
}

/// Manual-gate stage.
pub fn gate_stage(name: &str) -> StageConfig {
    StageConfig {
        name: name.to_string(),
        executor: None,
        class: StageClass::Api,
        manual_gate: true,
        max_parallel: None,
        max_retries: None,
        fault_policy: FaultPolicy::Continue,
        batched: false,
    }
}

/// Engine config with intervals shortened for tests.
pub fn fast_engine_config() -> EngineConfig {
    EngineConfig {
        max_retries: 4,
        retry_backoff_ms: 10,
        gate_poll_interval_ms: 20,
        gate_ceiling_secs: 3600,
        activity_ring_capacity: 64,
    }
}
