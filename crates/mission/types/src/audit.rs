//! Audit events
//!
//! Callers hand an [`AuditAppend`] to an audit log; the log assigns the
//! sequence number and chain hash and returns the stored [`AuditEvent`].

use crate::{MissionId, PhaseId, StepId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kinds of event a mission trail may contain
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    Started,
    Succeeded,
    Retried,
    Failed,
    CheckpointRequested,
    CheckpointApproved,
    CheckpointRejected,
    FallbackInvoked,
    Cancelled,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::Started => "started",
            AuditEventKind::Succeeded => "succeeded",
            AuditEventKind::Retried => "retried",
            AuditEventKind::Failed => "failed",
            AuditEventKind::CheckpointRequested => "checkpoint_requested",
            AuditEventKind::CheckpointApproved => "checkpoint_approved",
            AuditEventKind::CheckpointRejected => "checkpoint_rejected",
            AuditEventKind::FallbackInvoked => "fallback_invoked",
            AuditEventKind::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event to be appended
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditAppend {
    pub mission_id: MissionId,
    pub kind: AuditEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<PhaseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditAppend {
    pub fn new(mission_id: MissionId, kind: AuditEventKind, detail: impl Into<String>) -> Self {
        Self {
            mission_id,
            kind,
            phase_id: None,
            step_id: None,
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_phase(mut self, phase_id: PhaseId) -> Self {
        self.phase_id = Some(phase_id);
        self
    }

    pub fn with_step(mut self, step_id: StepId) -> Self {
        self.step_id = Some(step_id);
        self
    }
}

/// An event as stored: sequenced and chained per mission
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub mission_id: MissionId,
    /// 1-based position in the mission's trail
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: AuditEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_id: Option<PhaseId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_hash: Option<String>,
    pub hash: String,
}
