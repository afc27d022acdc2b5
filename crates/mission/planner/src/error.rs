use mission_audit::AuditError;
use mission_types::{PlanValidationError, ProcedureError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the reasoning path did not produce a plan.
///
/// These never escape the planner facade; each one turns into a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasoningError {
    #[error("reasoning backend not configured")]
    NotConfigured,

    #[error("reasoning backend credential missing")]
    MissingCredential,

    #[error("reasoning backend timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("unparseable plan document: {0}")]
    Parse(String),

    #[error("plan document failed validation: {0}")]
    Validation(String),
}

impl ReasoningError {
    pub fn cause(&self) -> FallbackCause {
        match self {
            ReasoningError::NotConfigured => FallbackCause::NotConfigured,
            ReasoningError::MissingCredential => FallbackCause::MissingCredential,
            ReasoningError::Timeout(_) => FallbackCause::Timeout,
            ReasoningError::Transport(_) => FallbackCause::Transport,
            ReasoningError::HttpStatus { .. } => FallbackCause::HttpStatus,
            ReasoningError::Parse(_) => FallbackCause::Parse,
            ReasoningError::Validation(_) => FallbackCause::Validation,
        }
    }
}

/// Reason code recorded when the rule-based fallback is used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackCause {
    NotConfigured,
    MissingCredential,
    Timeout,
    Transport,
    HttpStatus,
    Parse,
    Validation,
}

impl FallbackCause {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackCause::NotConfigured => "not_configured",
            FallbackCause::MissingCredential => "missing_credential",
            FallbackCause::Timeout => "timeout",
            FallbackCause::Transport => "transport",
            FallbackCause::HttpStatus => "http_status",
            FallbackCause::Parse => "parse",
            FallbackCause::Validation => "validation",
        }
    }
}

impl std::fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors the planner facade can return
#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("invalid procedure: {0}")]
    InvalidProcedure(#[from] ProcedureError),

    #[error("no valid plan: reasoning failed ({reasoning}) and fallback plan was invalid ({fallback})")]
    BothPathsFailed {
        reasoning: ReasoningError,
        fallback: PlanValidationError,
    },

    #[error("planning record could not be stored: {0}")]
    Storage(#[from] AuditError),
}

pub type PlanningResult<T> = Result<T, PlanningError>;
