//! Core batch and item data types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Batch
// ============================================================================

/// Overall status of a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// The orchestrator is actively driving the batch through its stages.
    Running,
    /// Stopped at a checkpoint; can be resumed.
    Paused,
    /// All stages finished.
    Completed,
    /// A fatal error halted the batch; requires an explicit operator resume.
    Error,
}

impl BatchStatus {
    /// Stable string form used in the database and filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Running => "running",
            BatchStatus::Paused => "paused",
            BatchStatus::Completed => "completed",
            BatchStatus::Error => "error",
        }
    }

    /// Parse from the stored string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(BatchStatus::Running),
            "paused" => Some(BatchStatus::Paused),
            "completed" => Some(BatchStatus::Completed),
            "error" => Some(BatchStatus::Error),
            _ => None,
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Error)
    }
}

/// Aggregate per-stage item counters, checkpointed on the batch record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounters {
    /// Items that completed the stage cleanly.
    pub succeeded: usize,
    /// Items currently carrying an error but still retry-eligible.
    pub failed: usize,
    /// Items force-completed after exhausting their retry budget.
    pub skipped: usize,
    /// Items not yet attempted or mid-flight.
    pub pending: usize,
}

/// One end-to-end run over a set of items.
///
/// Mutated only by the orchestrator; the durable store is the source of
/// truth for resume decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Unique batch ID.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Ordered stage names this batch runs through.
    pub stages: Vec<String>,
    /// Index of the stage the batch is currently on (or will resume at).
    pub current_stage: usize,
    /// Overall status.
    pub status: BatchStatus,
    /// Checkpointed per-stage counters, keyed by stage name.
    #[serde(default)]
    pub counters: HashMap<String, StageCounters>,
    /// Durable manual-gate confirmation flag.
    #[serde(default)]
    pub gate_confirmed: bool,
    /// When the batch was created.
    pub created_at: DateTime<Utc>,
    /// When the batch first started running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the batch was last paused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paused_at: Option<DateTime<Utc>>,
    /// When the batch reached a terminal status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Item
// ============================================================================

/// Opaque per-stage payload owned by the step executor that produced it.
///
/// The orchestrator passes this through without interpreting its shape;
/// only the owning executor reads or writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ArtifactPayload {
    /// DNS zone created at a provider.
    DnsZone {
        zone_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        nameservers: Vec<String>,
    },
    /// Account reference from an admin-portal automation run.
    PortalAccount { account_ref: String },
    /// Provisioned mailbox address.
    Mailbox { address: String },
    /// Anything else an executor wants to carry between attempts.
    Opaque(serde_json::Value),
}

/// Progress of one item through one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemStageState {
    /// Whether the stage is done for this item (success or force-skip).
    #[serde(default)]
    pub complete: bool,
    /// Failed attempts so far, bounded by the stage retry budget.
    #[serde(default)]
    pub retry_count: u32,
    /// Error text from the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Executor-owned payload carried across attempts and stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactPayload>,
}

/// One independently tracked unit of work within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique item ID.
    pub id: String,
    /// Owning batch.
    pub batch_id: String,
    /// Caller-supplied reference (e.g. a tenant domain).
    pub item_ref: String,
    /// Per-stage progress, keyed by stage name. Absent key = untouched stage.
    #[serde(default)]
    pub stages: HashMap<String, ItemStageState>,
    /// When the item was created.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Current state for a stage, defaulting to untouched.
    pub fn stage_state(&self, stage: &str) -> ItemStageState {
        self.stages.get(stage).cloned().unwrap_or_default()
    }

    /// Whether this item still needs work in the given stage.
    ///
    /// An item is eligible while its completion flag is unset and its retry
    /// counter has not exceeded the stage budget. Force-skipped items have
    /// the flag set, so they never block a round.
    pub fn is_eligible(&self, stage: &str, max_retries: u32) -> bool {
        let state = self.stage_state(stage);
        !state.complete && state.retry_count <= max_retries
    }
}

// ============================================================================
// Stage results
// ============================================================================

/// Outcome of one recorded stage event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    /// An item completed the stage.
    Success,
    /// An item's attempt failed (may retry).
    Failure,
    /// An item was force-completed after exhausting retries.
    Skipped,
    /// The stage executor itself faulted (systemic, not per-item).
    StageError,
    /// A gate or wait hit its wall-clock ceiling and was force-advanced.
    Timeout,
}

impl StageOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::Failure => "failure",
            StageOutcome::Skipped => "skipped",
            StageOutcome::StageError => "stage_error",
            StageOutcome::Timeout => "timeout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(StageOutcome::Success),
            "failure" => Some(StageOutcome::Failure),
            "skipped" => Some(StageOutcome::Skipped),
            "stage_error" => Some(StageOutcome::StageError),
            "timeout" => Some(StageOutcome::Timeout),
            _ => None,
        }
    }
}

/// Append-only record of one stage transition, item-level or stage-level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    /// Row ID assigned by the store (0 before insert).
    pub id: i64,
    /// Owning batch.
    pub batch_id: String,
    /// Item the event concerns, if item-level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// Stage name.
    pub stage: String,
    /// What happened.
    pub outcome: StageOutcome,
    /// Human-readable description.
    pub message: String,
    /// Error detail, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}
