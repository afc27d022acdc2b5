use mission_planner::PlanningError;
use mission_types::PlanValidationError;
use thiserror::Error;

/// Errors raised before or around a mission run.
///
/// Failures inside a run never surface here: they end the mission in
/// `Failed` with a reason code instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("plan rejected: {0}")]
    InvalidPlan(#[from] PlanValidationError),

    #[error("planning failed: {0}")]
    Planning(#[from] PlanningError),

    #[error("mission task ended abnormally: {0}")]
    Join(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Failure reported by an action agent
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgentError {
    #[error("agent unavailable: {0}")]
    Unavailable(String),

    #[error("step failed: {0}")]
    Failed(String),
}

/// Failure of the approval channel itself, as opposed to a rejection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApprovalError {
    #[error("approval channel closed")]
    ChannelClosed,

    #[error("approval channel error: {0}")]
    Other(String),
}
