//! Mission domain types
//!
//! Shared vocabulary for the planning and execution crates:
//!
//! - [`ProcedureDefinition`]: a recorded procedure to plan from
//! - [`ExecutionPlan`]: the validated, immutable result of planning
//! - [`Mission`]: one execution of a plan, with its phases and outcomes
//! - [`AuditEvent`]: an entry in a mission's hash-chained audit trail

#![deny(unsafe_code)]

pub mod audit;
pub mod errors;
pub mod ids;
pub mod mission;
pub mod plan;
pub mod procedure;
pub mod text;

pub use audit::{AuditAppend, AuditEvent, AuditEventKind};
pub use errors::{PlanValidationError, PlanValidationResult, ProcedureError};
pub use ids::{JobId, MissionId, PhaseId, StepId, WorkflowId};
pub use mission::{
    CheckpointDecision, CheckpointRecord, Mission, MissionFailure, MissionFailureReason,
    MissionStatus, Phase, PhaseOutcome, PhaseStatus, StepOutcome, StepResult,
};
pub use plan::{
    ActionType, Confidence, ExecutionPlan, ExecutionStep, PlanSource, RiskAssessment, RiskLevel,
    total_duration, FALLBACK_MARKER,
};
pub use procedure::{
    NodeKind, ProcedureDefinition, ProcedureNode, TargetElement, TranscriptEvent,
    TranscriptEventKind,
};
