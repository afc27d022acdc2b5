//! Grouping plan steps into phases
//!
//! Consecutive steps that share a semantic label form one phase. A phase is
//! the unit of approval, retry and audit.

use mission_types::text::{mentions_any, normalize};
use mission_types::{ActionType, ExecutionPlan, ExecutionStep, Phase, PhaseId};

const AUTH_WORDS: &[&str] = &["authenticate", "login", "log in", "sign in", "signin"];

/// Semantic label for a single step.
pub fn phase_label(step: &ExecutionStep) -> &'static str {
    let text = normalize(&step.name);
    if mentions_any(&text, AUTH_WORDS) {
        return "authenticate";
    }
    match step.action_type {
        ActionType::Navigate | ActionType::Click | ActionType::Wait => "navigate",
        ActionType::Type | ActionType::Compose => "compose",
        ActionType::Extract => "extract",
        ActionType::Decide => "decide",
        ActionType::Update => "update",
    }
}

/// Split a plan into ordered phases of consecutive same-label steps.
pub fn group_phases(plan: &ExecutionPlan) -> Vec<Phase> {
    let mut phases: Vec<Phase> = Vec::new();
    for (index, step) in plan.steps.iter().enumerate() {
        let label = phase_label(step);
        match phases.last_mut() {
            Some(current) if current.label == label => current.step_indices.push(index),
            _ => {
                let phase_index = phases.len();
                phases.push(Phase {
                    id: PhaseId::new(format!("p{:03}-{}", phase_index + 1, label)),
                    index: phase_index,
                    label: label.to_string(),
                    step_indices: vec![index],
                });
            }
        }
    }
    phases
}

#[cfg(test)]
mod tests {
    use super::*;
    use mission_types::{Confidence, PlanSource, RiskAssessment, RiskLevel};

    fn plan(steps: Vec<ExecutionStep>) -> ExecutionPlan {
        ExecutionPlan::new(
            "t",
            "",
            steps,
            RiskAssessment::new(RiskLevel::Low),
            PlanSource::RuleBased,
        )
    }

    fn step(id: &str, name: &str, action: ActionType) -> ExecutionStep {
        ExecutionStep::new(id, name, action, Confidence::High, 1)
    }

    #[test]
    fn test_login_steps_group_together() {
        let plan = plan(vec![
            step("a", "Open login page: CRM", ActionType::Navigate),
            step("b", "Authenticate: CRM", ActionType::Type),
            step("c", "Open accounts", ActionType::Navigate),
            step("d", "Click first row", ActionType::Click),
            step("e", "Extract balance", ActionType::Extract),
        ]);
        let phases = group_phases(&plan);
        let labels: Vec<_> = phases.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["authenticate", "navigate", "extract"]);
        assert_eq!(phases[0].step_indices, vec![0, 1]);
        assert_eq!(phases[1].step_indices, vec![2, 3]);
        assert_eq!(phases[2].id.as_str(), "p003-extract");
    }

    #[test]
    fn test_repeated_labels_form_separate_phases() {
        let plan = plan(vec![
            step("a", "Open inbox", ActionType::Navigate),
            step("b", "Decide", ActionType::Decide),
            step("c", "Open queue", ActionType::Navigate),
        ]);
        let phases = group_phases(&plan);
        assert_eq!(phases.len(), 3);
        assert_ne!(phases[0].id, phases[2].id);
    }

    #[test]
    fn test_every_step_in_exactly_one_phase() {
        let plan = plan(vec![
            step("a", "Type name", ActionType::Type),
            step("b", "Compose note", ActionType::Compose),
            step("c", "Wait", ActionType::Wait),
            step("d", "Update", ActionType::Update),
        ]);
        let covered: Vec<usize> = group_phases(&plan)
            .into_iter()
            .flat_map(|p| p.step_indices)
            .collect();
        assert_eq!(covered, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_plan_has_no_phases() {
        assert!(group_phases(&plan(Vec::new())).is_empty());
    }
}
