//! In-memory audit log and plan store, for tests and single-process runs.

use crate::chain::ChainHead;
use crate::traits::{AuditLog, PlanStore};
use crate::{AuditError, AuditResult};
use async_trait::async_trait;
use mission_types::{AuditAppend, AuditEvent, ExecutionPlan, MissionId, WorkflowId};
use parking_lot::RwLock;
use std::collections::HashMap;
use tokio::sync::broadcast;

const FEED_CAPACITY: usize = 256;

/// Audit log held entirely in memory
pub struct MemoryAuditLog {
    trails: RwLock<HashMap<MissionId, Vec<AuditEvent>>>,
    feed: broadcast::Sender<AuditEvent>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            trails: RwLock::new(HashMap::new()),
            feed,
        }
    }

    pub fn mission_count(&self) -> usize {
        self.trails.read().len()
    }
}

impl Default for MemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, event: AuditAppend) -> AuditResult<AuditEvent> {
        let record = {
            let mut trails = self.trails.write();
            let trail = trails.entry(event.mission_id.clone()).or_default();
            let mut head = ChainHead::from_last(trail.last());
            let record = head.seal(event)?;
            trail.push(record.clone());
            record
        };

        // No subscribers is not an error.
        let _ = self.feed.send(record.clone());
        Ok(record)
    }

    async fn events_for(&self, mission_id: &MissionId) -> AuditResult<Vec<AuditEvent>> {
        Ok(self
            .trails
            .read()
            .get(mission_id)
            .cloned()
            .unwrap_or_default())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.feed.subscribe()
    }
}

/// Plan store held entirely in memory
#[derive(Default)]
pub struct MemoryPlanStore {
    plans: RwLock<HashMap<WorkflowId, ExecutionPlan>>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn save_plan(&self, plan: &ExecutionPlan) -> AuditResult<()> {
        let mut plans = self.plans.write();
        match plans.get(&plan.workflow_id) {
            Some(existing) if existing != plan => Err(AuditError::Conflict(format!(
                "plan {} already stored with different content",
                plan.workflow_id
            ))),
            Some(_) => Ok(()),
            None => {
                plans.insert(plan.workflow_id.clone(), plan.clone());
                Ok(())
            }
        }
    }

    async fn load_plan(&self, workflow_id: &WorkflowId) -> AuditResult<Option<ExecutionPlan>> {
        Ok(self.plans.read().get(workflow_id).cloned())
    }

    async fn list_plans(&self) -> AuditResult<Vec<WorkflowId>> {
        let mut ids: Vec<_> = self.plans.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use mission_types::{
        ActionType, AuditEventKind, Confidence, ExecutionStep, PlanSource, RiskAssessment,
        RiskLevel,
    };

    fn append(mission: &str, kind: AuditEventKind) -> AuditAppend {
        AuditAppend::new(MissionId::new(mission), kind, "detail")
    }

    #[tokio::test]
    async fn test_chains_are_per_mission() {
        let log = MemoryAuditLog::new();
        let a1 = log.append(append("a", AuditEventKind::Started)).await.unwrap();
        let b1 = log.append(append("b", AuditEventKind::Started)).await.unwrap();
        let a2 = log.append(append("a", AuditEventKind::Succeeded)).await.unwrap();

        assert_eq!(a1.sequence, 1);
        assert_eq!(b1.sequence, 1);
        assert_eq!(a2.sequence, 2);
        assert_eq!(a2.previous_hash, Some(a1.hash));
        assert_eq!(log.mission_count(), 2);

        let trail = log.events_for(&MissionId::new("a")).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert!(log.verify(&MissionId::new("a")).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_unknown_mission_is_empty() {
        let log = MemoryAuditLog::new();
        let events = log.events_for(&MissionId::new("none")).await.unwrap();
        assert!(events.is_empty());
        let report = log.verify(&MissionId::new("none")).await.unwrap();
        assert!(report.valid);
        assert_eq!(report.events, 0);
    }

    #[tokio::test]
    async fn test_events_between() {
        let log = MemoryAuditLog::new();
        let start = Utc::now();
        log.append(append("a", AuditEventKind::Started)).await.unwrap();
        let mut late = append("a", AuditEventKind::Succeeded);
        late.timestamp = start + Duration::hours(1);
        log.append(late).await.unwrap();

        let window = log
            .events_between(
                &MissionId::new("a"),
                start - Duration::seconds(1),
                start + Duration::minutes(1),
            )
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].kind, AuditEventKind::Started);
    }

    #[tokio::test]
    async fn test_subscribers_see_appends() {
        let log = MemoryAuditLog::new();
        let mut feed = log.subscribe();
        log.append(append("a", AuditEventKind::Started)).await.unwrap();
        let event = feed.recv().await.unwrap();
        assert_eq!(event.kind, AuditEventKind::Started);
    }

    #[tokio::test]
    async fn test_plan_store_conflict() {
        let store = MemoryPlanStore::new();
        let plan = ExecutionPlan::new(
            "Plan",
            "",
            vec![ExecutionStep::new(
                "s1",
                "Open",
                ActionType::Navigate,
                Confidence::High,
                5,
            )],
            RiskAssessment::new(RiskLevel::Low),
            PlanSource::RuleBased,
        );
        store.save_plan(&plan).await.unwrap();
        store.save_plan(&plan).await.unwrap();

        let mut changed = plan.clone();
        changed.title = "Other".to_string();
        assert!(matches!(
            store.save_plan(&changed).await,
            Err(AuditError::Conflict(_))
        ));

        let loaded = store.load_plan(&plan.workflow_id).await.unwrap();
        assert_eq!(loaded, Some(plan.clone()));
        assert_eq!(store.list_plans().await.unwrap(), vec![plan.workflow_id]);
    }
}
