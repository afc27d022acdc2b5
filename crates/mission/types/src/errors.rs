//! Validation errors for procedures and execution plans

use crate::StepId;

/// A procedure definition that cannot be planned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProcedureError {
    #[error("procedure title is empty")]
    EmptyTitle,

    #[error("procedure has no nodes")]
    NoNodes,

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("node {0} has an empty label")]
    EmptyLabel(String),
}

/// An execution plan that violates a structural invariant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanValidationError {
    #[error("plan title is empty")]
    EmptyTitle,

    #[error("plan has no steps")]
    NoSteps,

    #[error("step at index {0} has an empty id")]
    EmptyStepId(usize),

    #[error("duplicate step id: {0}")]
    DuplicateStepId(StepId),

    #[error("checkpoint index {index} is out of range for {steps} steps")]
    CheckpointOutOfRange { index: usize, steps: usize },

    #[error("checkpoint at index {0} is on a step that does not require approval")]
    CheckpointWithoutApproval(usize),

    #[error("operator checkpoint {0} is not a human checkpoint")]
    OrphanOperatorCheckpoint(usize),

    #[error("low-confidence step {0} does not require approval")]
    LowConfidenceWithoutApproval(StepId),

    #[error("declared duration {declared}s does not match step total {computed}s")]
    DurationMismatch { declared: u64, computed: u64 },
}

pub type PlanValidationResult<T> = Result<T, PlanValidationError>;
