//! Deterministic rule-based planning
//!
//! Maps each procedure node to one or more steps through a fixed keyword
//! table. The same procedure always yields the same steps, checkpoints and
//! risk assessment; only the workflow id and creation time differ.

use mission_risk::RiskModel;
use mission_types::text::{mentions_any, normalize};
use mission_types::{
    ActionType, Confidence, ExecutionPlan, ExecutionStep, JobId, NodeKind, PlanSource,
    ProcedureDefinition, ProcedureNode,
};
use std::collections::BTreeSet;

// ── Keyword table ────────────────────────────────────────────────────

const AUTH_WORDS: &[&str] = &[
    "login",
    "log in",
    "sign in",
    "signin",
    "authenticate",
    "password",
    "credential",
    "credentials",
];
const MUTATION_WORDS: &[&str] = &[
    "update", "submit", "save", "delete", "send", "post", "approve", "pay", "transfer",
];
const COMPOSE_WORDS: &[&str] = &["write", "compose", "draft", "reply"];
const EXTRACT_WORDS: &[&str] = &[
    "read", "extract", "copy", "collect", "find", "look up", "lookup", "check",
];
const ENTRY_WORDS: &[&str] = &["type", "enter", "fill", "input"];
const CLICK_WORDS: &[&str] = &["click", "select", "press", "choose", "tap"];
const NAVIGATE_WORDS: &[&str] = &["open", "navigate", "go to", "visit", "launch", "browse"];

/// Class a task label falls into, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskClass {
    Authenticate,
    Mutate,
    Compose,
    Extract,
    Enter,
    Click,
    Navigate,
    Unrecognised,
}

fn classify(label: &str) -> TaskClass {
    let text = normalize(label);
    let table: [(&[&str], TaskClass); 7] = [
        (AUTH_WORDS, TaskClass::Authenticate),
        (MUTATION_WORDS, TaskClass::Mutate),
        (COMPOSE_WORDS, TaskClass::Compose),
        (EXTRACT_WORDS, TaskClass::Extract),
        (ENTRY_WORDS, TaskClass::Enter),
        (CLICK_WORDS, TaskClass::Click),
        (NAVIGATE_WORDS, TaskClass::Navigate),
    ];
    table
        .iter()
        .find(|entry| mentions_any(&text, entry.0))
        .map(|entry| entry.1)
        .unwrap_or(TaskClass::Unrecognised)
}

/// Default estimate for an action, in seconds.
pub fn default_duration(action: ActionType) -> u64 {
    match action {
        ActionType::Navigate => 5,
        ActionType::Click => 2,
        ActionType::Type => 4,
        ActionType::Extract => 8,
        ActionType::Decide => 10,
        ActionType::Wait => 30,
        ActionType::Compose => 20,
        ActionType::Update => 6,
    }
}

fn default_fallbacks(action: ActionType) -> &'static [&'static str] {
    match action {
        ActionType::Navigate => &[
            "Locate the page through the application's search",
            "Ask the operator for a direct link",
        ],
        ActionType::Click => &[
            "Locate the control by its visible label",
            "Reach the control with keyboard navigation",
        ],
        ActionType::Type => &["Paste the value instead of typing it"],
        ActionType::Extract => &[
            "Read the value from an export or report",
            "Ask the operator to read the value",
        ],
        ActionType::Decide => &["Escalate the decision to the operator"],
        ActionType::Wait => &["Poll until the expected state appears"],
        ActionType::Compose => &["Start from a saved template", "Ask the operator to draft the text"],
        ActionType::Update => &["Save as a draft for operator review"],
    }
}

// ── Planner ──────────────────────────────────────────────────────────

/// Deterministic planner used when the reasoning path is unavailable
#[derive(Debug, Clone)]
pub struct RuleBasedPlanner {
    risk: RiskModel,
    judgment_actions: BTreeSet<ActionType>,
}

/// A step before it has been numbered
struct Draft {
    suffix: &'static str,
    name: String,
    action: ActionType,
    confidence: Confidence,
    reasoning: String,
    fallbacks: Vec<String>,
}

impl Draft {
    fn new(
        suffix: &'static str,
        name: String,
        action: ActionType,
        confidence: Confidence,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            suffix,
            name,
            action,
            confidence,
            reasoning: reasoning.into(),
            fallbacks: default_fallbacks(action)
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RuleBasedPlanner {
    pub fn new(risk: RiskModel, judgment_actions: BTreeSet<ActionType>) -> Self {
        Self {
            risk,
            judgment_actions,
        }
    }

    /// Plan a procedure. Total: every procedure yields a plan.
    pub fn plan(&self, procedure: &ProcedureDefinition, job_id: Option<&JobId>) -> ExecutionPlan {
        let mut steps = Vec::new();
        for node in &procedure.nodes {
            let label = procedure.substitute(&node.label);
            let intent = node.intent.as_deref().map(|i| procedure.substitute(i));
            for draft in self.drafts_for(node, &label, intent.as_deref()) {
                let index = steps.len() + 1;
                let judgment = self.judgment_actions.contains(&draft.action);
                let mut step = ExecutionStep::new(
                    format!("step-{:02}-{}", index, draft.suffix),
                    draft.name,
                    draft.action,
                    draft.confidence,
                    default_duration(draft.action),
                )
                .with_description(intent.clone().unwrap_or_else(|| label.clone()))
                .with_reasoning(draft.reasoning)
                .with_approval(judgment);
                step.fallback_options = draft.fallbacks;
                steps.push(step);
            }
        }

        self.risk.enforce_approvals(&mut steps);

        let checkpoints: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, s)| self.judgment_actions.contains(&s.action_type))
            .map(|(i, _)| i)
            .collect();

        let risk_assessment = self.risk.assess(&steps);
        let title = procedure.substitute(&procedure.title);
        let description = if procedure.goal.trim().is_empty() {
            format!("Rule-based plan for {}", title)
        } else {
            procedure.substitute(&procedure.goal)
        };

        let mut plan = ExecutionPlan::new(
            title,
            description,
            steps,
            risk_assessment,
            PlanSource::RuleBased,
        )
        .with_checkpoints(checkpoints);
        if let Some(job) = job_id {
            plan = plan.with_job_id(job.clone());
        }

        tracing::debug!(
            workflow_id = %plan.workflow_id,
            steps = plan.steps.len(),
            checkpoints = plan.human_checkpoints.len(),
            "Rule-based plan built"
        );
        plan
    }

    fn drafts_for(&self, node: &ProcedureNode, label: &str, intent: Option<&str>) -> Vec<Draft> {
        match node.kind {
            NodeKind::Decision => vec![Draft::new(
                "decide",
                format!("Decide: {}", label),
                ActionType::Decide,
                Confidence::Medium,
                "Decision node: requires judgment",
            )],
            NodeKind::Loop => {
                let mut draft = Draft::new(
                    "decide",
                    format!("Repeat: {}", label),
                    ActionType::Decide,
                    Confidence::Medium,
                    "Loop node: iteration count depends on runtime data",
                );
                draft.fallbacks = loop_options(label, intent);
                vec![draft]
            }
            NodeKind::Wait => vec![Draft::new(
                "wait",
                format!("Wait: {}", label),
                ActionType::Wait,
                Confidence::High,
                "Wait node",
            )],
            NodeKind::Navigate => vec![Draft::new(
                "navigate",
                format!("Navigate: {}", label),
                ActionType::Navigate,
                Confidence::High,
                "Navigation node",
            )],
            NodeKind::Task | NodeKind::Other => task_drafts(label),
        }
    }
}

fn task_drafts(label: &str) -> Vec<Draft> {
    let single = |suffix, prefix: &str, action, confidence, reasoning: &str| {
        vec![Draft::new(
            suffix,
            format!("{}: {}", prefix, label),
            action,
            confidence,
            reasoning,
        )]
    };

    match classify(label) {
        TaskClass::Authenticate => vec![
            Draft::new(
                "navigate",
                format!("Open login page: {}", label),
                ActionType::Navigate,
                Confidence::High,
                "Authentication task: reach the login page first",
            ),
            Draft::new(
                "authenticate",
                format!("Authenticate: {}", label),
                ActionType::Type,
                Confidence::Medium,
                "Authentication task: credential entry may need operator help",
            ),
        ],
        TaskClass::Mutate => single(
            "update",
            "Update",
            ActionType::Update,
            Confidence::Medium,
            "Task changes application state",
        ),
        TaskClass::Compose => single(
            "compose",
            "Compose",
            ActionType::Compose,
            Confidence::Medium,
            "Task produces free text",
        ),
        TaskClass::Extract => single(
            "extract",
            "Extract",
            ActionType::Extract,
            Confidence::High,
            "Task reads information",
        ),
        TaskClass::Enter => single(
            "type",
            "Enter",
            ActionType::Type,
            Confidence::High,
            "Task enters data",
        ),
        TaskClass::Click => single(
            "click",
            "Click",
            ActionType::Click,
            Confidence::High,
            "Task activates a control",
        ),
        TaskClass::Navigate => single(
            "navigate",
            "Navigate",
            ActionType::Navigate,
            Confidence::High,
            "Task moves to another page or application",
        ),
        TaskClass::Unrecognised => single(
            "click",
            "Perform",
            ActionType::Click,
            Confidence::Low,
            "No keyword matched; action inferred as a click",
        ),
    }
}

/// Fallback options for a loop, taken from its stated intent.
fn loop_options(label: &str, intent: Option<&str>) -> Vec<String> {
    let mut options: Vec<String> = intent
        .unwrap_or("")
        .split(|c| c == ';' || c == '\n')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("Iterate: {}", s))
        .collect();
    if options.is_empty() {
        options.push(format!("Iterate: {}", label));
    }
    options.push("Process one item and ask the operator how to continue".to_string());
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use mission_types::RiskLevel;

    fn planner() -> RuleBasedPlanner {
        RuleBasedPlanner::new(
            RiskModel::default(),
            BTreeSet::from([ActionType::Decide, ActionType::Update]),
        )
    }

    fn node(id: &str, kind: NodeKind, label: &str) -> ProcedureNode {
        ProcedureNode::new(id, kind, label)
    }

    #[test]
    fn test_navigate_decide_navigate() {
        let procedure = ProcedureDefinition::new("Route request")
            .with_node(node("n1", NodeKind::Navigate, "Inbox"))
            .with_node(node("n2", NodeKind::Decision, "Is it urgent?"))
            .with_node(node("n3", NodeKind::Task, "Open the escalation queue"));
        let plan = planner().plan(&procedure, None);

        let actions: Vec<_> = plan.steps.iter().map(|s| s.action_type).collect();
        assert_eq!(
            actions,
            vec![ActionType::Navigate, ActionType::Decide, ActionType::Navigate]
        );
        assert_eq!(plan.human_checkpoints, BTreeSet::from([1]));
        assert_eq!(plan.risk_assessment.overall_risk, RiskLevel::Medium);
        assert_eq!(plan.estimated_duration, 5 + 10 + 5);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_keyword_classes() {
        let cases = [
            ("Sign in to the portal", vec![ActionType::Navigate, ActionType::Type]),
            ("Submit the expense form", vec![ActionType::Update]),
            ("Draft a reply to the customer", vec![ActionType::Compose]),
            ("Look up the order number", vec![ActionType::Extract]),
            ("Fill in the address", vec![ActionType::Type]),
            ("Press the green button", vec![ActionType::Click]),
            ("Go to settings", vec![ActionType::Navigate]),
            ("Frobnicate the widget", vec![ActionType::Click]),
        ];
        for (label, expected) in cases {
            let procedure =
                ProcedureDefinition::new("t").with_node(node("n", NodeKind::Task, label));
            let plan = planner().plan(&procedure, None);
            let actions: Vec<_> = plan.steps.iter().map(|s| s.action_type).collect();
            assert_eq!(actions, expected, "label: {}", label);
        }
    }

    #[test]
    fn test_unrecognised_task_is_low_confidence() {
        let procedure =
            ProcedureDefinition::new("t").with_node(node("n", NodeKind::Other, "Frobnicate"));
        let plan = planner().plan(&procedure, None);
        assert_eq!(plan.steps[0].confidence, Confidence::Low);
        assert!(plan.steps[0].requires_approval);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_loop_options_from_intent() {
        let procedure = ProcedureDefinition::new("t").with_node(
            node("n", NodeKind::Loop, "Each invoice")
                .with_intent("until the inbox is empty; skip paid invoices"),
        );
        let plan = planner().plan(&procedure, None);
        let step = &plan.steps[0];
        assert_eq!(step.action_type, ActionType::Decide);
        assert_eq!(
            step.fallback_options[..2],
            [
                "Iterate: until the inbox is empty".to_string(),
                "Iterate: skip paid invoices".to_string()
            ]
        );
    }

    #[test]
    fn test_variables_are_substituted() {
        let procedure = ProcedureDefinition::new("Pay {{vendor}}")
            .with_variable("vendor", "Acme")
            .with_node(node("n", NodeKind::Task, "Open {{vendor}} portal"));
        let plan = planner().plan(&procedure, Some(&JobId::new("job-7")));
        assert_eq!(plan.title, "Pay Acme");
        assert!(plan.steps[0].name.contains("Acme"));
        assert_eq!(plan.job_id, Some(JobId::new("job-7")));
    }

    #[test]
    fn test_deterministic() {
        let procedure = ProcedureDefinition::new("t")
            .with_node(node("a", NodeKind::Task, "Log in"))
            .with_node(node("b", NodeKind::Task, "Update the record"))
            .with_node(node("c", NodeKind::Wait, "Sync"));
        let one = planner().plan(&procedure, None);
        let two = planner().plan(&procedure, None);
        assert_eq!(one.steps, two.steps);
        assert_eq!(one.human_checkpoints, two.human_checkpoints);
        assert_eq!(one.risk_assessment, two.risk_assessment);
        assert_ne!(one.workflow_id, two.workflow_id);
    }
}
