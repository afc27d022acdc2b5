use thiserror::Error;

/// Result type for audit and plan storage operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Audit-layer errors.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("chain integrity violation: {0}")]
    Integrity(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("backend error: {0}")]
    Backend(String),
}
