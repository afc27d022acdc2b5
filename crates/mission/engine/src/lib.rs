//! Mission execution engine
//!
//! Runs a validated [`ExecutionPlan`] phase by phase:
//!
//! 1. steps are grouped into phases by semantic label
//! 2. a phase holding an approval-requiring step pauses for a human decision
//!    when oversight is on
//! 3. steps run through an [`ActionAgent`], one at a time
//! 4. a failing phase is retried up to the mission's budget
//! 5. every transition is appended to the hash-chained audit log first
//!
//! [`MissionService`] wraps planning and execution for callers that start
//! from a recorded procedure.
//!
//! [`ExecutionPlan`]: mission_types::ExecutionPlan

#![deny(unsafe_code)]

pub mod agent;
pub mod approval;
pub mod cancel;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod phases;
pub mod service;
pub mod state_machine;

pub use agent::{ActionAgent, DryRunAgent, SerializedAgent, StepContext};
pub use approval::{
    ApprovalChannel, ApprovalDecision, ApprovalRequest, AutoApprove, AutoReject,
    ChannelApproval, PendingApproval,
};
pub use cancel::CancellationHandle;
pub use config::EngineConfig;
pub use error::{AgentError, ApprovalError, EngineError, EngineResult};
pub use orchestrator::MissionOrchestrator;
pub use phases::{group_phases, phase_label};
pub use service::{MissionEvents, MissionHandle, MissionRequest, MissionService};
pub use state_machine::{MissionStateMachine, MissionWatch};
