//! Plan risk model
//!
//! Scores a list of execution steps and decides which of them must be
//! approved by a human before they run. Scoring follows a simple additive
//! model: a base score plus a penalty per risk factor present, clamped to
//! `[0, 1]` and bucketed into a [`RiskLevel`].

#![deny(unsafe_code)]

use mission_types::text::{mentions_any, normalize};
use mission_types::{
    total_duration, ActionType, Confidence, ExecutionStep, RiskAssessment, RiskLevel,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Risk model configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Action types whose effects cannot be undone
    #[serde(default = "default_irreversible_actions")]
    pub irreversible_actions: BTreeSet<ActionType>,
    /// Words in a click, type or compose step that mark it irreversible
    #[serde(default = "default_irreversible_keywords")]
    pub irreversible_keywords: Vec<String>,
    /// Score at or above which a plan is MEDIUM
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold: f64,
    /// Score at or above which a plan is HIGH
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    /// Steps beyond which a procedure counts as long
    #[serde(default = "default_long_procedure_steps")]
    pub long_procedure_steps: usize,
    /// Total seconds beyond which a procedure counts as long-running
    #[serde(default = "default_long_duration_secs")]
    pub long_duration_secs: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            irreversible_actions: default_irreversible_actions(),
            irreversible_keywords: default_irreversible_keywords(),
            medium_threshold: default_medium_threshold(),
            high_threshold: default_high_threshold(),
            long_procedure_steps: default_long_procedure_steps(),
            long_duration_secs: default_long_duration_secs(),
        }
    }
}

fn default_irreversible_actions() -> BTreeSet<ActionType> {
    BTreeSet::from([ActionType::Update])
}

fn default_irreversible_keywords() -> Vec<String> {
    [
        "delete", "remove", "submit", "send", "pay", "transfer", "purchase", "approve",
        "publish",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_medium_threshold() -> f64 {
    0.3
}

fn default_high_threshold() -> f64 {
    0.6
}

fn default_long_procedure_steps() -> usize {
    15
}

fn default_long_duration_secs() -> u64 {
    600
}

const BASE_SCORE: f64 = 0.1;
const DECISION_PENALTY: f64 = 0.25;
const IRREVERSIBLE_PENALTY: f64 = 0.3;
const LOW_CONFIDENCE_PENALTY: f64 = 0.2;
const UNCERTAIN_MAJORITY_PENALTY: f64 = 0.1;
const LONG_PROCEDURE_PENALTY: f64 = 0.1;
const LONG_DURATION_PENALTY: f64 = 0.1;

/// Scores plans and applies the approval policy
#[derive(Clone, Debug, Default)]
pub struct RiskModel {
    config: RiskConfig,
}

impl RiskModel {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Whether a step changes state in a way that cannot be undone.
    pub fn is_irreversible(&self, step: &ExecutionStep) -> bool {
        if self.config.irreversible_actions.contains(&step.action_type) {
            return true;
        }
        match step.action_type {
            ActionType::Click | ActionType::Type | ActionType::Compose | ActionType::Update => {
                let text = normalize(&format!("{} {}", step.name, step.description));
                mentions_any(&text, self.config.irreversible_keywords.as_slice())
            }
            _ => false,
        }
    }

    /// Whether policy demands approval for a step regardless of what the
    /// planner proposed.
    pub fn requires_approval(&self, step: &ExecutionStep) -> bool {
        step.confidence == Confidence::Low || self.is_irreversible(step)
    }

    /// Raise `requires_approval` wherever policy demands it. Never lowers it.
    pub fn enforce_approvals(&self, steps: &mut [ExecutionStep]) {
        for step in steps.iter_mut() {
            if !step.requires_approval && self.requires_approval(step) {
                tracing::debug!(step_id = %step.id, "Approval required by policy");
                step.requires_approval = true;
            }
        }
    }

    /// Raw risk score in `[0, 1]`.
    pub fn score(&self, steps: &[ExecutionStep]) -> f64 {
        self.evaluate(steps).0
    }

    /// Build a risk assessment for a list of steps.
    pub fn assess(&self, steps: &[ExecutionStep]) -> RiskAssessment {
        let (score, factors) = self.evaluate(steps);

        let level = if score >= self.config.high_threshold {
            RiskLevel::High
        } else if score >= self.config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let mut assessment = RiskAssessment::new(level);
        for (factor, mitigation) in factors {
            assessment = assessment.with_factor(factor).with_mitigation(mitigation);
        }
        assessment
    }

    fn evaluate(&self, steps: &[ExecutionStep]) -> (f64, Vec<(String, &'static str)>) {
        let mut score = BASE_SCORE;
        let mut factors = Vec::new();

        let decisions = steps
            .iter()
            .filter(|s| s.action_type == ActionType::Decide)
            .count();
        if decisions > 0 {
            score += DECISION_PENALTY;
            factors.push((
                format!("Judgment-dependent decision steps: {}", decisions),
                "Pause for human review at decision points",
            ));
        }

        let irreversible: Vec<&str> = steps
            .iter()
            .filter(|s| self.is_irreversible(s))
            .map(|s| s.id.as_str())
            .collect();
        if !irreversible.is_empty() {
            score += IRREVERSIBLE_PENALTY;
            factors.push((
                format!("Irreversible state changes: {}", irreversible.join(", ")),
                "Require explicit approval before irreversible changes",
            ));
        }

        let low = steps
            .iter()
            .filter(|s| s.confidence == Confidence::Low)
            .count();
        if low > 0 {
            score += LOW_CONFIDENCE_PENALTY;
            factors.push((
                format!("Low-confidence steps: {}", low),
                "Verify low-confidence steps against the recording before execution",
            ));
        }

        let uncertain = steps
            .iter()
            .filter(|s| s.confidence != Confidence::High)
            .count();
        if !steps.is_empty() && uncertain * 2 > steps.len() {
            score += UNCERTAIN_MAJORITY_PENALTY;
            factors.push((
                format!("Most steps below high confidence: {}/{}", uncertain, steps.len()),
                "Run with human oversight enabled",
            ));
        }

        if steps.len() > self.config.long_procedure_steps {
            score += LONG_PROCEDURE_PENALTY;
            factors.push((
                format!("Long procedure: {} steps", steps.len()),
                "Review progress at phase boundaries",
            ));
        }

        let duration = total_duration(steps);
        if duration > self.config.long_duration_secs {
            score += LONG_DURATION_PENALTY;
            factors.push((
                format!("Long-running procedure: {}s", duration),
                "Set a mission-level timeout",
            ));
        }

        (score.clamp(0.0, 1.0), factors)
    }
}
