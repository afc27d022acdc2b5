//! Execution plans
//!
//! An [`ExecutionPlan`] is the immutable output of planning: an ordered list
//! of typed steps, a risk assessment and the set of step indices at which a
//! human must approve before execution continues. Plans are never edited in
//! place; adding an operator checkpoint yields a new plan with a new id.

use crate::{JobId, PlanValidationError, PlanValidationResult, StepId, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Title prefix marking a plan produced by the rule-based fallback.
pub const FALLBACK_MARKER: &str = "[FALLBACK] ";

// ── Step vocabulary ──────────────────────────────────────────────────

/// What kind of action a step performs
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    Type,
    Extract,
    Decide,
    Wait,
    Compose,
    Update,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::Type => "type",
            ActionType::Extract => "extract",
            ActionType::Decide => "decide",
            ActionType::Wait => "wait",
            ActionType::Compose => "compose",
            ActionType::Update => "update",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How sure the planner is that a step is correct
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    #[serde(alias = "high")]
    High,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "low")]
    Low,
}

/// Overall plan risk
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    #[serde(alias = "low")]
    Low,
    #[serde(alias = "medium")]
    Medium,
    #[serde(alias = "high")]
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::Medium => write!(f, "MEDIUM"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

// ── Steps ────────────────────────────────────────────────────────────

/// One executable step of a plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub id: StepId,
    pub name: String,
    pub description: String,
    pub action_type: ActionType,
    pub confidence: Confidence,
    /// Estimated duration in seconds
    pub estimated_duration: u64,
    pub reasoning: String,
    #[serde(default)]
    pub fallback_options: Vec<String>,
    pub requires_approval: bool,
}

impl ExecutionStep {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        action_type: ActionType,
        confidence: Confidence,
        estimated_duration: u64,
    ) -> Self {
        Self {
            id: StepId::new(id),
            name: name.into(),
            description: String::new(),
            action_type,
            confidence,
            estimated_duration,
            reasoning: String::new(),
            fallback_options: Vec::new(),
            requires_approval: confidence == Confidence::Low,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_fallback(mut self, option: impl Into<String>) -> Self {
        self.fallback_options.push(option.into());
        self
    }

    pub fn with_approval(mut self, requires_approval: bool) -> Self {
        self.requires_approval = requires_approval || self.confidence == Confidence::Low;
        self
    }
}

// ── Risk ─────────────────────────────────────────────────────────────

/// Risk summary attached to every plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk: RiskLevel,
    #[serde(default)]
    pub risk_factors: BTreeSet<String>,
    #[serde(default)]
    pub mitigation_strategies: BTreeSet<String>,
}

impl RiskAssessment {
    pub fn new(overall_risk: RiskLevel) -> Self {
        Self {
            overall_risk,
            risk_factors: BTreeSet::new(),
            mitigation_strategies: BTreeSet::new(),
        }
    }

    pub fn with_factor(mut self, factor: impl Into<String>) -> Self {
        self.risk_factors.insert(factor.into());
        self
    }

    pub fn with_mitigation(mut self, mitigation: impl Into<String>) -> Self {
        self.mitigation_strategies.insert(mitigation.into());
        self
    }
}

// ── Plan ─────────────────────────────────────────────────────────────

/// Which planning path produced a plan
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Reasoning,
    RuleBased,
}

/// Sum of step durations, saturating at `u64::MAX`.
pub fn total_duration(steps: &[ExecutionStep]) -> u64 {
    steps
        .iter()
        .fold(0u64, |total, s| total.saturating_add(s.estimated_duration))
}

/// An immutable, validated execution plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub workflow_id: WorkflowId,
    pub title: String,
    pub description: String,
    pub steps: Vec<ExecutionStep>,
    /// Total estimated duration in seconds; always the sum of the steps
    pub estimated_duration: u64,
    pub risk_assessment: RiskAssessment,
    /// Step indices at which execution pauses for human approval
    pub human_checkpoints: BTreeSet<usize>,
    /// Checkpoints inserted by an operator after planning
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub operator_checkpoints: BTreeSet<usize>,
    pub source: PlanSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    /// Build a plan from its steps. The duration is derived, never supplied.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<ExecutionStep>,
        risk_assessment: RiskAssessment,
        source: PlanSource,
    ) -> Self {
        let estimated_duration = total_duration(&steps);
        Self {
            workflow_id: WorkflowId::generate(),
            title: title.into(),
            description: description.into(),
            steps,
            estimated_duration,
            risk_assessment,
            human_checkpoints: BTreeSet::new(),
            operator_checkpoints: BTreeSet::new(),
            source,
            job_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_checkpoints(mut self, checkpoints: impl IntoIterator<Item = usize>) -> Self {
        self.human_checkpoints.extend(checkpoints);
        self
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    /// Derive a new plan with an extra operator checkpoint at `index`.
    ///
    /// The original plan is left untouched; the derived plan gets a fresh
    /// workflow id so audit records can tell the two apart.
    pub fn with_operator_checkpoint(&self, index: usize) -> PlanValidationResult<ExecutionPlan> {
        if index >= self.steps.len() {
            return Err(PlanValidationError::CheckpointOutOfRange {
                index,
                steps: self.steps.len(),
            });
        }
        let mut derived = self.clone();
        derived.workflow_id = WorkflowId::generate();
        derived.created_at = Utc::now();
        derived.human_checkpoints.insert(index);
        derived.operator_checkpoints.insert(index);
        Ok(derived)
    }

    /// Whether this plan came from the rule-based fallback.
    pub fn is_fallback(&self) -> bool {
        self.title.starts_with(FALLBACK_MARKER)
    }

    /// Sum of step durations in seconds.
    pub fn computed_duration(&self) -> u64 {
        total_duration(&self.steps)
    }

    /// Whether execution must stop for approval before step `index`.
    pub fn needs_approval_at(&self, index: usize) -> bool {
        self.human_checkpoints.contains(&index)
            || self.steps.get(index).is_some_and(|s| s.requires_approval)
    }

    /// Check every structural invariant a plan must hold.
    pub fn validate(&self) -> PlanValidationResult<()> {
        if self.title.trim().is_empty() {
            return Err(PlanValidationError::EmptyTitle);
        }
        if self.steps.is_empty() {
            return Err(PlanValidationError::NoSteps);
        }

        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.id.as_str().trim().is_empty() {
                return Err(PlanValidationError::EmptyStepId(index));
            }
            if !seen.insert(&step.id) {
                return Err(PlanValidationError::DuplicateStepId(step.id.clone()));
            }
            if step.confidence == Confidence::Low && !step.requires_approval {
                return Err(PlanValidationError::LowConfidenceWithoutApproval(
                    step.id.clone(),
                ));
            }
        }

        for &index in &self.human_checkpoints {
            let Some(step) = self.steps.get(index) else {
                return Err(PlanValidationError::CheckpointOutOfRange {
                    index,
                    steps: self.steps.len(),
                });
            };
            if !step.requires_approval && !self.operator_checkpoints.contains(&index) {
                return Err(PlanValidationError::CheckpointWithoutApproval(index));
            }
        }

        if let Some(&orphan) = self
            .operator_checkpoints
            .iter()
            .find(|i| !self.human_checkpoints.contains(i))
        {
            return Err(PlanValidationError::OrphanOperatorCheckpoint(orphan));
        }

        let computed = self.computed_duration();
        if computed != self.estimated_duration {
            return Err(PlanValidationError::DurationMismatch {
                declared: self.estimated_duration,
                computed,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> ExecutionPlan {
        let steps = vec![
            ExecutionStep::new("s1", "Open billing", ActionType::Navigate, Confidence::High, 5),
            ExecutionStep::new("s2", "Approve amount", ActionType::Decide, Confidence::Medium, 10)
                .with_approval(true),
            ExecutionStep::new("s3", "Submit", ActionType::Click, Confidence::High, 2),
        ];
        ExecutionPlan::new(
            "Pay invoice",
            "",
            steps,
            RiskAssessment::new(RiskLevel::Medium),
            PlanSource::RuleBased,
        )
        .with_checkpoints([1])
    }

    #[test]
    fn test_valid_plan() {
        let plan = plan();
        assert_eq!(plan.estimated_duration, 17);
        assert!(plan.validate().is_ok());
        assert!(plan.needs_approval_at(1));
        assert!(!plan.needs_approval_at(0));
    }

    #[test]
    fn test_checkpoint_must_require_approval() {
        let plan = plan().with_checkpoints([0]);
        assert_eq!(
            plan.validate(),
            Err(PlanValidationError::CheckpointWithoutApproval(0))
        );
    }

    #[test]
    fn test_checkpoint_out_of_range() {
        let plan = plan().with_checkpoints([7]);
        assert!(matches!(
            plan.validate(),
            Err(PlanValidationError::CheckpointOutOfRange { index: 7, steps: 3 })
        ));
    }

    #[test]
    fn test_low_confidence_forces_approval() {
        let step = ExecutionStep::new("s", "guess", ActionType::Click, Confidence::Low, 2)
            .with_approval(false);
        assert!(step.requires_approval);

        let mut plan = plan();
        plan.steps[0].confidence = Confidence::Low;
        assert!(matches!(
            plan.validate(),
            Err(PlanValidationError::LowConfidenceWithoutApproval(_))
        ));
    }

    #[test]
    fn test_duration_mismatch_detected() {
        let mut plan = plan();
        plan.estimated_duration = 1;
        assert_eq!(
            plan.validate(),
            Err(PlanValidationError::DurationMismatch {
                declared: 1,
                computed: 17
            })
        );
    }

    #[test]
    fn test_plan_without_steps_is_invalid() {
        let mut plan = plan();
        plan.steps.clear();
        plan.human_checkpoints.clear();
        plan.estimated_duration = 0;
        assert_eq!(plan.validate(), Err(PlanValidationError::NoSteps));
    }

    #[test]
    fn test_duration_saturates() {
        let steps = vec![
            ExecutionStep::new("a", "Wait", ActionType::Wait, Confidence::High, u64::MAX),
            ExecutionStep::new("b", "Wait", ActionType::Wait, Confidence::High, 5),
        ];
        let plan = ExecutionPlan::new(
            "Slow",
            "",
            steps,
            RiskAssessment::new(RiskLevel::Low),
            PlanSource::RuleBased,
        );
        assert_eq!(plan.estimated_duration, u64::MAX);
        assert_eq!(plan.computed_duration(), u64::MAX);
    }

    #[test]
    fn test_duplicate_step_id() {
        let mut plan = plan();
        plan.steps[2].id = StepId::new("s1");
        assert_eq!(
            plan.validate(),
            Err(PlanValidationError::DuplicateStepId(StepId::new("s1")))
        );
    }

    #[test]
    fn test_operator_checkpoint_derives_new_plan() {
        let original = plan();
        let derived = original.with_operator_checkpoint(2).unwrap();
        assert_ne!(derived.workflow_id, original.workflow_id);
        assert!(!original.human_checkpoints.contains(&2));
        assert!(derived.human_checkpoints.contains(&2));
        assert!(derived.validate().is_ok());
        assert!(original.with_operator_checkpoint(9).is_err());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(plan()).unwrap();
        assert_eq!(json["steps"][0]["action_type"], "navigate");
        assert_eq!(json["steps"][0]["confidence"], "HIGH");
        assert_eq!(json["risk_assessment"]["overall_risk"], "MEDIUM");
        assert_eq!(json["source"], "rule_based");
    }

    #[test]
    fn test_fallback_marker() {
        let mut plan = plan();
        assert!(!plan.is_fallback());
        plan.title = format!("{}{}", FALLBACK_MARKER, plan.title);
        assert!(plan.is_fallback());
    }
}
