//! Missions: one execution of one plan
//!
//! A mission moves through `Pending -> Running -> AwaitingApproval -> Running
//! -> ... -> Completed | Failed | Cancelled`. Terminal states are absorbing.

use crate::{AuditEvent, ExecutionPlan, ExecutionStep, MissionId, PhaseId, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

// ── Status ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Pending,
    Running,
    AwaitingApproval,
    Completed,
    Failed,
    Cancelled,
}

impl MissionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MissionStatus::Completed | MissionStatus::Failed | MissionStatus::Cancelled
        )
    }

    /// Whether the state machine may move from `self` to `next`.
    pub fn can_transition_to(&self, next: MissionStatus) -> bool {
        use MissionStatus::*;
        match (self, next) {
            (Pending, Running) | (Pending, Cancelled) | (Pending, Failed) => true,
            (Running, AwaitingApproval)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Cancelled) => true,
            (AwaitingApproval, Running)
            | (AwaitingApproval, Failed)
            | (AwaitingApproval, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MissionStatus::Pending => "pending",
            MissionStatus::Running => "running",
            MissionStatus::AwaitingApproval => "awaiting_approval",
            MissionStatus::Completed => "completed",
            MissionStatus::Failed => "failed",
            MissionStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Why a mission ended without completing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionFailureReason {
    HumanRejected,
    ApprovalTimeout,
    ExecutionFailed,
    AuditUnavailable,
    Cancelled,
}

impl MissionFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionFailureReason::HumanRejected => "human_rejected",
            MissionFailureReason::ApprovalTimeout => "approval_timeout",
            MissionFailureReason::ExecutionFailed => "execution_failed",
            MissionFailureReason::AuditUnavailable => "audit_unavailable",
            MissionFailureReason::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for MissionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissionFailure {
    pub reason: MissionFailureReason,
    pub detail: String,
}

// ── Phases ───────────────────────────────────────────────────────────

/// A contiguous run of steps sharing a semantic label
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    pub index: usize,
    pub label: String,
    /// Indices into the plan's step list
    pub step_indices: Vec<usize>,
}

impl Phase {
    pub fn steps<'a>(&'a self, plan: &'a ExecutionPlan) -> impl Iterator<Item = &'a ExecutionStep> {
        self.step_indices.iter().filter_map(|i| plan.steps.get(*i))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Succeeded,
    Failed,
    Rejected,
}

/// What an agent reports for a single step
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    pub fn success() -> Self {
        Self {
            success: true,
            extracted_data: None,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            extracted_data: None,
            error: Some(error.into()),
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extracted_data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
        self
    }
}

/// A step result as recorded against a phase attempt
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: StepId,
    pub attempt: u32,
    pub result: StepResult,
    pub duration_ms: u64,
}

/// Final outcome of one phase
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseOutcome {
    pub phase_id: PhaseId,
    pub status: PhaseStatus,
    pub attempts: u32,
    pub step_results: Vec<StepOutcome>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extracted_data: BTreeMap<String, Value>,
}

// ── Checkpoints ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointDecision {
    Requested,
    Approved,
    Rejected,
    TimedOut,
}

/// One approval gate interaction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub phase_id: PhaseId,
    pub decision: CheckpointDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub at: DateTime<Utc>,
}

// ── Mission ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub mission_id: MissionId,
    pub plan: Arc<ExecutionPlan>,
    pub status: MissionStatus,
    pub human_oversight: bool,
    pub max_retries: u32,
    pub phases: Vec<Phase>,
    pub results: BTreeMap<PhaseId, PhaseOutcome>,
    pub audit_trail: Vec<AuditEvent>,
    pub checkpoints: Vec<CheckpointRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<MissionFailure>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Mission {
    pub fn new(plan: Arc<ExecutionPlan>, human_oversight: bool, max_retries: u32) -> Self {
        Self {
            mission_id: MissionId::generate(),
            plan,
            status: MissionStatus::Pending,
            human_oversight,
            max_retries,
            phases: Vec::new(),
            results: BTreeMap::new(),
            audit_trail: Vec::new(),
            checkpoints: Vec::new(),
            failure: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn with_id(mut self, mission_id: MissionId) -> Self {
        self.mission_id = mission_id;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn failure_reason(&self) -> Option<MissionFailureReason> {
        self.failure.as_ref().map(|f| f.reason)
    }

    /// All data extracted by successful phases, later phases winning on key clashes.
    pub fn extracted_data(&self) -> BTreeMap<String, Value> {
        let mut merged = BTreeMap::new();
        for phase in &self.phases {
            if let Some(outcome) = self.results.get(&phase.id) {
                merged.extend(outcome.extracted_data.clone());
            }
        }
        merged
    }
}
