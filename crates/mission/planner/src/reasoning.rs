//! Reasoning-backed planning
//!
//! Sends the procedure to the reasoning backend, then parses, validates and
//! normalises whatever comes back. The backend is untrusted: its output only
//! becomes a plan after it passes every structural check and the risk
//! model's approval policy has been applied on top.

use crate::config::ReasoningBackendConfig;
use crate::error::ReasoningError;
use crate::transport::{ReasoningRequest, ReasoningTransport};
use mission_risk::RiskModel;
use mission_types::{
    ActionType, Confidence, ExecutionPlan, ExecutionStep, JobId, PlanSource, ProcedureDefinition,
    RiskAssessment, StepId, TranscriptEvent,
};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

const MAX_LOG_CHARS: usize = 2000;

/// Longest single step a backend may propose, in seconds.
pub const MAX_STEP_DURATION_SECS: f64 = 86_400.0;

// ── Wire format ──────────────────────────────────────────────────────

/// Plan document as returned by the backend, before validation
#[derive(Debug, Clone, Deserialize)]
pub struct PlanPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<StepPayload>,
    #[serde(default)]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(default)]
    pub human_checkpoints: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepPayload {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub action_type: ActionType,
    pub confidence: Confidence,
    pub estimated_duration: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub fallback_options: Vec<String>,
    #[serde(default)]
    pub requires_approval: bool,
}

// ── Parsing ──────────────────────────────────────────────────────────

/// Parse a backend response: strictly first, then once more after repair.
pub fn parse_plan_payload(raw: &str) -> Result<PlanPayload, ReasoningError> {
    let strict_err = match serde_json::from_str::<PlanPayload>(raw.trim()) {
        Ok(payload) => return Ok(payload),
        Err(e) => e,
    };

    let repaired = repair_json(raw)
        .ok_or_else(|| ReasoningError::Parse(format!("no JSON object found ({})", strict_err)))?;
    tracing::debug!("Strict plan parse failed; retrying with repaired document");

    serde_json::from_str::<PlanPayload>(&repaired).map_err(|e| ReasoningError::Parse(e.to_string()))
}

/// Normalise typographic quotes and cut out the first balanced JSON object.
fn repair_json(raw: &str) -> Option<String> {
    let normalised: String = raw
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect();
    extract_json_object(&normalised).map(str::to_string)
}

/// The first balanced `{...}` in `text`, respecting string literals.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Validation and normalisation ─────────────────────────────────────

/// Turn a parsed payload into a validated plan.
///
/// Normalisation only ever tightens: approval flags are raised by the risk
/// policy and on every checkpointed step, and the total duration is always
/// recomputed from the steps.
pub fn payload_into_plan(
    payload: PlanPayload,
    risk: &RiskModel,
    job_id: &JobId,
) -> Result<ExecutionPlan, ReasoningError> {
    let invalid = |msg: String| ReasoningError::Validation(msg);

    if payload.title.trim().is_empty() {
        return Err(invalid("missing title".into()));
    }
    if payload.steps.is_empty() {
        return Err(invalid("plan has no steps".into()));
    }

    let mut seen = HashSet::new();
    let mut steps = Vec::with_capacity(payload.steps.len());
    for (index, raw) in payload.steps.into_iter().enumerate() {
        let id = raw.id.trim().to_string();
        if id.is_empty() {
            return Err(invalid(format!("step {} has no id", index)));
        }
        if !seen.insert(id.clone()) {
            return Err(invalid(format!("duplicate step id {}", id)));
        }
        if raw.name.trim().is_empty() {
            return Err(invalid(format!("step {} has no name", id)));
        }
        if !raw.estimated_duration.is_finite()
            || raw.estimated_duration < 0.0
            || raw.estimated_duration > MAX_STEP_DURATION_SECS
        {
            return Err(invalid(format!(
                "step {} has invalid duration {}",
                id, raw.estimated_duration
            )));
        }

        steps.push(ExecutionStep {
            id: StepId::new(id),
            name: raw.name,
            description: raw.description,
            action_type: raw.action_type,
            confidence: raw.confidence,
            estimated_duration: raw.estimated_duration.round() as u64,
            reasoning: raw.reasoning,
            fallback_options: raw.fallback_options,
            requires_approval: raw.requires_approval,
        });
    }

    let mut checkpoints = BTreeSet::new();
    for index in payload.human_checkpoints {
        let in_range = usize::try_from(index).ok().filter(|i| *i < steps.len());
        match in_range {
            Some(i) => {
                checkpoints.insert(i);
            }
            None => {
                return Err(invalid(format!(
                    "checkpoint {} outside 0..{}",
                    index,
                    steps.len()
                )))
            }
        }
    }

    risk.enforce_approvals(&mut steps);
    for &i in &checkpoints {
        steps[i].requires_approval = true;
    }

    let risk_assessment = payload
        .risk_assessment
        .unwrap_or_else(|| risk.assess(&steps));

    let plan = ExecutionPlan::new(
        payload.title.trim(),
        payload.description,
        steps,
        risk_assessment,
        PlanSource::Reasoning,
    )
    .with_checkpoints(checkpoints)
    .with_job_id(job_id.clone());

    plan.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(plan)
}

// ── Planner ──────────────────────────────────────────────────────────

/// Plans through the reasoning backend
pub struct ReasoningPlanner {
    backend: ReasoningBackendConfig,
    transport: Arc<dyn ReasoningTransport>,
    risk: RiskModel,
}

impl ReasoningPlanner {
    pub fn new(
        backend: ReasoningBackendConfig,
        transport: Arc<dyn ReasoningTransport>,
        risk: RiskModel,
    ) -> Self {
        Self {
            backend,
            transport,
            risk,
        }
    }

    pub fn backend(&self) -> &ReasoningBackendConfig {
        &self.backend
    }

    pub async fn plan(
        &self,
        procedure: &ProcedureDefinition,
        transcript: &[TranscriptEvent],
        job_id: &JobId,
    ) -> Result<ExecutionPlan, ReasoningError> {
        if self.backend.credential().is_none() {
            return Err(ReasoningError::MissingCredential);
        }

        let request = ReasoningRequest::new(procedure, transcript, job_id)
            .with_model(self.backend.model.clone());
        tracing::info!(
            job_id = %job_id,
            endpoint = %self.backend.endpoint,
            nodes = procedure.nodes.len(),
            transcript_events = transcript.len(),
            "Planning request prepared"
        );

        let raw = tokio::time::timeout(
            self.backend.timeout(),
            self.transport.generate(&self.backend, &request),
        )
        .await
        .map_err(|_| ReasoningError::Timeout(self.backend.timeout_secs))??;

        if tracing::enabled!(tracing::Level::DEBUG) {
            let preview: String = raw.chars().take(MAX_LOG_CHARS).collect();
            tracing::debug!(job_id = %job_id, output = %preview, "Reasoning backend output");
        }

        let payload = parse_plan_payload(&raw)?;
        let plan = payload_into_plan(payload, &self.risk, job_id)?;
        tracing::info!(
            job_id = %job_id,
            workflow_id = %plan.workflow_id,
            steps = plan.steps.len(),
            risk = %plan.risk_assessment.overall_risk,
            "Reasoning plan accepted"
        );
        Ok(plan)
    }
}
