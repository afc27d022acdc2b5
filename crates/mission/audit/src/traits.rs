use crate::chain::{verify_chain, ChainVerification};
use crate::AuditResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mission_types::{AuditAppend, AuditEvent, ExecutionPlan, MissionId, WorkflowId};
use tokio::sync::broadcast;

/// Append-only, per-mission audit trail.
///
/// `append` returns only once the event is durably recorded, so callers can
/// treat a successful return as permission to advance.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append an event and return the sequenced, hash-linked stored record.
    async fn append(&self, event: AuditAppend) -> AuditResult<AuditEvent>;

    /// All events for a mission in sequence order.
    async fn events_for(&self, mission_id: &MissionId) -> AuditResult<Vec<AuditEvent>>;

    /// Events for a mission with `from <= timestamp <= to`.
    async fn events_between(
        &self,
        mission_id: &MissionId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AuditResult<Vec<AuditEvent>> {
        let events = self.events_for(mission_id).await?;
        Ok(events
            .into_iter()
            .filter(|e| e.timestamp >= from && e.timestamp <= to)
            .collect())
    }

    /// Live feed of every event appended after the call.
    fn subscribe(&self) -> broadcast::Receiver<AuditEvent>;

    /// Recompute a mission's hash chain.
    async fn verify(&self, mission_id: &MissionId) -> AuditResult<ChainVerification> {
        let events = self.events_for(mission_id).await?;
        Ok(verify_chain(mission_id, &events))
    }
}

/// Storage for immutable execution plans.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Persist a plan. Saving a different plan under an existing id is a conflict.
    async fn save_plan(&self, plan: &ExecutionPlan) -> AuditResult<()>;

    async fn load_plan(&self, workflow_id: &WorkflowId) -> AuditResult<Option<ExecutionPlan>>;

    async fn list_plans(&self) -> AuditResult<Vec<WorkflowId>>;
}
