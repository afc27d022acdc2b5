//! Planner facade
//!
//! The single entry point for planning. Tries the reasoning backend when one
//! is configured and falls back to the rule-based planner on any failure.
//! Backend failures never reach the caller; every fallback is recorded in
//! the audit log under the job id before the plan is returned.

use crate::config::PlannerConfig;
use crate::error::{FallbackCause, PlanningError, PlanningResult, ReasoningError};
use crate::reasoning::ReasoningPlanner;
use crate::rule_based::RuleBasedPlanner;
use crate::transport::{HttpReasoningTransport, ReasoningTransport};
use mission_audit::{AuditLog, PlanStore};
use mission_risk::RiskModel;
use mission_types::{
    AuditAppend, AuditEventKind, ExecutionPlan, JobId, MissionId, ProcedureDefinition,
    TranscriptEvent, FALLBACK_MARKER,
};
use std::sync::Arc;

/// A plan together with the path that produced it
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    Reasoned(ExecutionPlan),
    Fallback {
        plan: ExecutionPlan,
        cause: FallbackCause,
        detail: String,
    },
}

impl PlanOutcome {
    pub fn plan(&self) -> &ExecutionPlan {
        match self {
            PlanOutcome::Reasoned(plan) => plan,
            PlanOutcome::Fallback { plan, .. } => plan,
        }
    }

    pub fn into_plan(self) -> ExecutionPlan {
        match self {
            PlanOutcome::Reasoned(plan) => plan,
            PlanOutcome::Fallback { plan, .. } => plan,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, PlanOutcome::Fallback { .. })
    }

    pub fn fallback_cause(&self) -> Option<FallbackCause> {
        match self {
            PlanOutcome::Reasoned(_) => None,
            PlanOutcome::Fallback { cause, .. } => Some(*cause),
        }
    }
}

/// Planning entry point
pub struct PlannerFacade {
    reasoning: Option<ReasoningPlanner>,
    rule_based: RuleBasedPlanner,
    audit: Option<Arc<dyn AuditLog>>,
    plans: Option<Arc<dyn PlanStore>>,
}

impl PlannerFacade {
    /// Build a facade that talks to the configured backend over HTTP.
    pub fn new(config: PlannerConfig) -> Self {
        Self::with_transport(config, Arc::new(HttpReasoningTransport::new()))
    }

    /// Build a facade with an explicit transport.
    pub fn with_transport(config: PlannerConfig, transport: Arc<dyn ReasoningTransport>) -> Self {
        let risk = RiskModel::new(config.risk.clone());
        let reasoning = config
            .reasoning
            .map(|backend| ReasoningPlanner::new(backend, transport, risk.clone()));
        Self {
            reasoning,
            rule_based: RuleBasedPlanner::new(risk, config.judgment_actions),
            audit: None,
            plans: None,
        }
    }

    pub fn with_audit_log(mut self, audit: Arc<dyn AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_plan_store(mut self, plans: Arc<dyn PlanStore>) -> Self {
        self.plans = Some(plans);
        self
    }

    pub fn reasoning_configured(&self) -> bool {
        self.reasoning.is_some()
    }

    /// Produce a validated plan for a procedure.
    ///
    /// Only an invalid procedure, a storage failure or an invalid fallback
    /// plan is reported as an error.
    pub async fn analyze_workflow(
        &self,
        procedure: &ProcedureDefinition,
        transcript: &[TranscriptEvent],
        job_id: &JobId,
    ) -> PlanningResult<PlanOutcome> {
        procedure.validate()?;

        let attempt = match &self.reasoning {
            Some(planner) => planner.plan(procedure, transcript, job_id).await,
            None => Err(ReasoningError::NotConfigured),
        };

        let outcome = match attempt {
            Ok(plan) => PlanOutcome::Reasoned(plan),
            Err(err) => self.fall_back(procedure, job_id, err).await?,
        };

        if let Some(plans) = &self.plans {
            plans.save_plan(outcome.plan()).await?;
        }
        Ok(outcome)
    }

    async fn fall_back(
        &self,
        procedure: &ProcedureDefinition,
        job_id: &JobId,
        reason: ReasoningError,
    ) -> PlanningResult<PlanOutcome> {
        let cause = reason.cause();
        let detail = reason.to_string();

        let mut plan = self.rule_based.plan(procedure, Some(job_id));
        plan.title = format!("{}{}", FALLBACK_MARKER, plan.title);

        if let Err(invalid) = plan.validate() {
            tracing::error!(
                job_id = %job_id,
                cause = %cause,
                error = %invalid,
                "Fallback plan failed validation"
            );
            return Err(PlanningError::BothPathsFailed {
                reasoning: reason,
                fallback: invalid,
            });
        }

        if matches!(reason, ReasoningError::NotConfigured) {
            tracing::info!(job_id = %job_id, "No reasoning backend configured; using rule-based plan");
        } else {
            tracing::warn!(
                job_id = %job_id,
                cause = %cause,
                error = %detail,
                "Reasoning path failed; using rule-based plan"
            );
        }

        if let Some(audit) = &self.audit {
            let event = AuditAppend::new(
                MissionId::from(job_id),
                AuditEventKind::FallbackInvoked,
                format!("{}: {} (workflow {})", cause, detail, plan.workflow_id),
            );
            if let Err(e) = audit.append(event).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record fallback");
                return Err(e.into());
            }
        }

        Ok(PlanOutcome::Fallback {
            plan,
            cause,
            detail,
        })
    }
}
