//! Mission planning
//!
//! Turns a recorded [`ProcedureDefinition`] into a validated
//! [`ExecutionPlan`]. Planning goes through [`PlannerFacade`], which prefers
//! the reasoning backend and falls back to the deterministic
//! [`RuleBasedPlanner`] whenever the backend is missing, slow, failing or
//! returns something that does not validate.
//!
//! [`ProcedureDefinition`]: mission_types::ProcedureDefinition
//! [`ExecutionPlan`]: mission_types::ExecutionPlan

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod facade;
pub mod reasoning;
pub mod rule_based;
pub mod transport;

pub use config::{PlannerConfig, ReasoningBackendConfig};
pub use error::{FallbackCause, PlanningError, PlanningResult, ReasoningError};
pub use facade::{PlanOutcome, PlannerFacade};
pub use reasoning::{parse_plan_payload, payload_into_plan, ReasoningPlanner};
pub use rule_based::{default_duration, RuleBasedPlanner};
pub use transport::{HttpReasoningTransport, ReasoningRequest, ReasoningTransport};
