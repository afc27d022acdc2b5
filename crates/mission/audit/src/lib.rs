//! Mission audit log and plan store
//!
//! Every mission has an append-only trail of [`AuditEvent`]s linked by a
//! blake3 hash chain. Two backends are provided:
//!
//! - [`MemoryAuditLog`] / [`MemoryPlanStore`] for tests and short-lived runs
//! - [`FileAuditLog`] / [`FilePlanStore`] persisting to a directory
//!
//! [`AuditEvent`]: mission_types::AuditEvent

#![deny(unsafe_code)]

pub mod chain;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use chain::{compute_event_hash, verify_chain, ChainHead, ChainVerification};
pub use error::{AuditError, AuditResult};
pub use file::{FileAuditLog, FilePlanStore};
pub use memory::{MemoryAuditLog, MemoryPlanStore};
pub use traits::{AuditLog, PlanStore};
