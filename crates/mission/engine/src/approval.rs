//! Approval channels
//!
//! A mission pauses at a checkpoint and asks an [`ApprovalChannel`] for a
//! decision. The engine applies its own timeout around the request.

use crate::error::ApprovalError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mission_types::{ExecutionStep, MissionId, PhaseId, WorkflowId};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// What a reviewer is asked to approve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub mission_id: MissionId,
    pub workflow_id: WorkflowId,
    pub phase_id: PhaseId,
    pub phase_label: String,
    pub steps: Vec<ExecutionStep>,
    pub requested_at: DateTime<Utc>,
}

/// A reviewer's answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ApprovalDecision {
    pub fn approve() -> Self {
        Self {
            approved: true,
            reviewer: None,
            note: None,
        }
    }

    pub fn reject(note: impl Into<String>) -> Self {
        Self {
            approved: false,
            reviewer: None,
            note: Some(note.into()),
        }
    }

    pub fn by(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewer = Some(reviewer.into());
        self
    }
}

/// Source of checkpoint decisions.
#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    async fn request_approval(
        &self,
        request: ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError>;
}

/// Approves everything.
#[derive(Debug, Clone, Default)]
pub struct AutoApprove;

#[async_trait]
impl ApprovalChannel for AutoApprove {
    async fn request_approval(
        &self,
        _request: ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        Ok(ApprovalDecision::approve().by("auto"))
    }
}

/// Rejects everything.
#[derive(Debug, Clone, Default)]
pub struct AutoReject;

#[async_trait]
impl ApprovalChannel for AutoReject {
    async fn request_approval(
        &self,
        _request: ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        Ok(ApprovalDecision::reject("rejected by policy").by("auto"))
    }
}

/// A request waiting for a reviewer, with the slot to answer it through
#[derive(Debug)]
pub struct PendingApproval {
    pub request: ApprovalRequest,
    responder: oneshot::Sender<ApprovalDecision>,
}

impl PendingApproval {
    /// Send the decision back to the waiting mission. Returns false when the
    /// mission has stopped waiting.
    pub fn respond(self, decision: ApprovalDecision) -> bool {
        self.responder.send(decision).is_ok()
    }
}

/// Forwards requests over a channel to whatever front end reviews them.
#[derive(Debug, Clone)]
pub struct ChannelApproval {
    sender: mpsc::Sender<PendingApproval>,
}

impl ChannelApproval {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingApproval>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ApprovalChannel for ChannelApproval {
    async fn request_approval(
        &self,
        request: ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        let (responder, answer) = oneshot::channel();
        self.sender
            .send(PendingApproval { request, responder })
            .await
            .map_err(|_| ApprovalError::ChannelClosed)?;
        answer.await.map_err(|_| ApprovalError::ChannelClosed)
    }
}
