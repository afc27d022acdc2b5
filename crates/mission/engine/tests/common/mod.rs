//! Shared fixtures for the engine integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use mission_audit::{AuditLog, MemoryAuditLog};
use mission_engine::{
    ActionAgent, AgentError, ApprovalChannel, ApprovalDecision, ApprovalError, ApprovalRequest,
    EngineConfig, MissionOrchestrator, StepContext,
};
use mission_types::{
    ActionType, AuditEvent, AuditEventKind, Confidence, ExecutionPlan, ExecutionStep, PlanSource,
    RiskAssessment, RiskLevel, StepResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ----------------------------------------------------------------------------
// Plans
// ----------------------------------------------------------------------------

/// One phase worth of steps: all share `action`, so they group together.
pub struct PhaseSpec {
    pub action: ActionType,
    pub steps: usize,
    pub needs_approval: bool,
}

impl PhaseSpec {
    pub fn new(action: ActionType, steps: usize) -> Self {
        Self {
            action,
            steps,
            needs_approval: false,
        }
    }

    pub fn gated(mut self) -> Self {
        self.needs_approval = true;
        self
    }
}

pub fn plan_of(phases: &[PhaseSpec]) -> ExecutionPlan {
    let mut steps = Vec::new();
    for (p, phase) in phases.iter().enumerate() {
        for s in 0..phase.steps {
            steps.push(
                ExecutionStep::new(
                    format!("p{}-s{}", p, s),
                    format!("Step {} of phase {}", s, p),
                    phase.action,
                    Confidence::High,
                    10,
                )
                .with_approval(phase.needs_approval),
            );
        }
    }
    ExecutionPlan::new(
        "Scenario plan",
        "built for tests",
        steps,
        RiskAssessment::new(RiskLevel::Low),
        PlanSource::RuleBased,
    )
}

/// Navigate, extract, compose: three phases, nothing gated.
pub fn three_phase_plan() -> ExecutionPlan {
    plan_of(&[
        PhaseSpec::new(ActionType::Navigate, 2),
        PhaseSpec::new(ActionType::Extract, 1),
        PhaseSpec::new(ActionType::Type, 2),
    ])
}

pub fn orchestrator(
    config: EngineConfig,
    agent: Arc<dyn ActionAgent>,
    approvals: Arc<dyn ApprovalChannel>,
    audit: Arc<dyn AuditLog>,
) -> MissionOrchestrator {
    MissionOrchestrator::new(config, agent, approvals, audit)
}

pub fn memory_log() -> Arc<MemoryAuditLog> {
    Arc::new(MemoryAuditLog::new())
}

pub fn kinds(events: &[AuditEvent]) -> Vec<AuditEventKind> {
    events.iter().map(|e| e.kind).collect()
}

// ----------------------------------------------------------------------------
// Agents
// ----------------------------------------------------------------------------

/// Fails a step on every attempt up to its configured count, then succeeds.
#[derive(Default)]
pub struct FlakyAgent {
    failures: HashMap<String, u32>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<StepContext>>,
}

impl FlakyAgent {
    pub fn reliable() -> Self {
        Self::default()
    }

    pub fn failing(mut self, step_id: &str, attempts: u32) -> Self {
        self.failures.insert(step_id.to_string(), attempts);
        self
    }
}

#[async_trait]
impl ActionAgent for FlakyAgent {
    async fn execute_step(
        &self,
        step: &ExecutionStep,
        context: &StepContext,
    ) -> Result<StepResult, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(context.clone());
        let failures = self.failures.get(step.id.as_str()).copied().unwrap_or(0);
        if context.attempt <= failures {
            return Ok(StepResult::failure(format!("{} not found on page", step.id)));
        }
        Ok(StepResult::success().with_data(step.id.as_str(), serde_json::json!(context.attempt)))
    }
}

// ----------------------------------------------------------------------------
// Approvals
// ----------------------------------------------------------------------------

/// Answers every checkpoint the same way and counts the requests.
pub struct ScriptedApprover {
    approve: bool,
    pub requests: AtomicUsize,
}

impl ScriptedApprover {
    pub fn approving() -> Arc<Self> {
        Arc::new(Self {
            approve: true,
            requests: AtomicUsize::new(0),
        })
    }

    pub fn rejecting() -> Arc<Self> {
        Arc::new(Self {
            approve: false,
            requests: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ApprovalChannel for ScriptedApprover {
    async fn request_approval(
        &self,
        _request: ApprovalRequest,
    ) -> Result<ApprovalDecision, ApprovalError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.approve {
            Ok(ApprovalDecision::approve().by("reviewer"))
        } else {
            Ok(ApprovalDecision::reject("amount looks wrong").by("reviewer"))
        }
    }
}
