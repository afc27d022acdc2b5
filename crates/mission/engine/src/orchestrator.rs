//! Mission orchestrator
//!
//! Holds the collaborators every mission needs and turns validated plans
//! into running [`MissionStateMachine`]s.

use crate::agent::ActionAgent;
use crate::approval::ApprovalChannel;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::state_machine::MissionStateMachine;
use mission_audit::AuditLog;
use mission_types::{ExecutionPlan, Mission};
use std::sync::Arc;

#[derive(Clone)]
pub struct MissionOrchestrator {
    config: EngineConfig,
    agent: Arc<dyn ActionAgent>,
    approvals: Arc<dyn ApprovalChannel>,
    audit: Arc<dyn AuditLog>,
}

impl MissionOrchestrator {
    pub fn new(
        config: EngineConfig,
        agent: Arc<dyn ActionAgent>,
        approvals: Arc<dyn ApprovalChannel>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            config,
            agent,
            approvals,
            audit,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    /// Validate a plan and build the state machine that will run it.
    ///
    /// The mission starts in `Pending`; nothing is written to the audit log
    /// until [`MissionStateMachine::run`] is awaited.
    pub fn prepare(
        &self,
        plan: Arc<ExecutionPlan>,
        human_oversight: bool,
        max_retries: u32,
    ) -> EngineResult<MissionStateMachine> {
        plan.validate()?;
        let mission = Mission::new(plan, human_oversight, max_retries);
        tracing::debug!(
            mission_id = %mission.mission_id,
            workflow_id = %mission.plan.workflow_id,
            steps = mission.plan.steps.len(),
            "Mission prepared"
        );
        Ok(MissionStateMachine::new(
            self.config.clone(),
            self.agent.clone(),
            self.approvals.clone(),
            self.audit.clone(),
            mission,
        ))
    }

    /// Run a plan to completion on the current task.
    pub async fn execute_mission(
        &self,
        plan: Arc<ExecutionPlan>,
        human_oversight: bool,
        max_retries: u32,
    ) -> EngineResult<Mission> {
        let machine = self.prepare(plan, human_oversight, max_retries)?;
        Ok(machine.run().await)
    }
}
