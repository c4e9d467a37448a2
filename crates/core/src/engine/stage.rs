//! Declarative stage plan.
//!
//! The per-stage try/except sprawl of ad-hoc pipelines collapses into one
//! table of descriptors the runner loops over; the continue-on-fault policy
//! lives in exactly one place.

use tracing::warn;

use crate::config::{FaultPolicy, StageClass, StageConfig};

/// Parallelism ceiling for cheap network-API stages.
pub const MAX_API_PARALLELISM: usize = 16;
/// Parallelism ceiling for interactive-automation stages, which each hold
/// an expensive exclusive resource (e.g. a driven browser session).
pub const MAX_AUTOMATION_PARALLELISM: usize = 2;

const DEFAULT_API_PARALLELISM: usize = 8;
const DEFAULT_AUTOMATION_PARALLELISM: usize = 1;

/// How the runner drives a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Retry rounds over a step executor.
    Standard,
    /// Blocks on external confirmation via the gate controller.
    ManualGate,
}

/// Resolved, validated description of one pipeline stage.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    pub name: String,
    pub executor: Option<String>,
    pub kind: StageKind,
    pub max_parallel: usize,
    pub max_retries: u32,
    pub fault_policy: FaultPolicy,
    pub batched: bool,
}

impl StageDescriptor {
    pub fn is_gate(&self) -> bool {
        self.kind == StageKind::ManualGate
    }
}

fn clamp_parallelism(stage: &StageConfig) -> usize {
    let (default, ceiling) = match stage.class {
        StageClass::Api => (DEFAULT_API_PARALLELISM, MAX_API_PARALLELISM),
        StageClass::Automation => (DEFAULT_AUTOMATION_PARALLELISM, MAX_AUTOMATION_PARALLELISM),
    };

    let requested = stage.max_parallel.unwrap_or(default).max(1);
    if requested > ceiling {
        warn!(
            "Stage {} requested parallelism {} above the {:?} ceiling; clamping to {}",
            stage.name, requested, stage.class, ceiling
        );
        ceiling
    } else {
        requested
    }
}

/// Resolve stage configs into the runner's execution plan.
pub fn build_plan(stages: &[StageConfig], default_max_retries: u32) -> Vec<StageDescriptor> {
    stages
        .iter()
        .map(|stage| StageDescriptor {
            name: stage.name.clone(),
            executor: stage.executor.clone(),
            kind: if stage.manual_gate {
                StageKind::ManualGate
            } else {
                StageKind::Standard
            },
            max_parallel: clamp_parallelism(stage),
            max_retries: stage.max_retries.unwrap_or(default_max_retries),
            fault_policy: stage.fault_policy,
            batched: stage.batched,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str) -> StageConfig {
        StageConfig {
            name: name.to_string(),
            executor: Some("dns".to_string()),
            class: StageClass::Api,
            manual_gate: false,
            max_parallel: None,
            max_retries: None,
            fault_policy: FaultPolicy::Continue,
            batched: false,
        }
    }

    #[test]
    fn test_defaults_by_class() {
        let mut api = stage("dns_zone");
        api.class = StageClass::Api;
        let mut automation = stage("portal_setup");
        automation.class = StageClass::Automation;

        let plan = build_plan(&[api, automation], 4);
        assert_eq!(plan[0].max_parallel, DEFAULT_API_PARALLELISM);
        assert_eq!(plan[1].max_parallel, DEFAULT_AUTOMATION_PARALLELISM);
        assert_eq!(plan[0].max_retries, 4);
    }

    #[test]
    fn test_parallelism_clamped_to_class_ceiling() {
        let mut api = stage("dns_zone");
        api.max_parallel = Some(100);
        let mut automation = stage("portal_setup");
        automation.class = StageClass::Automation;
        automation.max_parallel = Some(100);

        let plan = build_plan(&[api, automation], 4);
        assert_eq!(plan[0].max_parallel, MAX_API_PARALLELISM);
        assert_eq!(plan[1].max_parallel, MAX_AUTOMATION_PARALLELISM);
    }

    #[test]
    fn test_zero_parallelism_raised_to_one() {
        let mut config = stage("dns_zone");
        config.max_parallel = Some(0);
        let plan = build_plan(&[config], 4);
        assert_eq!(plan[0].max_parallel, 1);
    }

    #[test]
    fn test_gate_and_retry_override() {
        let mut gate = stage("await_confirmation");
        gate.executor = None;
        gate.manual_gate = true;
        let mut retried = stage("verify");
        retried.max_retries = Some(1);

        let plan = build_plan(&[gate, retried], 4);
        assert!(plan[0].is_gate());
        assert_eq!(plan[1].kind, StageKind::Standard);
        assert_eq!(plan[1].max_retries, 1);
    }
}
