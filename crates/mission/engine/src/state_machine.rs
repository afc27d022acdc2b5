//! Mission state machine
//!
//! Drives one mission through its phases:
//!
//! ```text
//! Pending -> Running -> [AwaitingApproval -> Running] -> ... -> Completed
//!                                 \-> Failed (rejected, timed out)
//!           Running -> Failed (retries exhausted, audit unavailable)
//!           Running | AwaitingApproval -> Cancelled
//! ```
//!
//! Every state change is written to the audit log before the machine moves
//! on. A phase is retried as a whole, from its first step.

use crate::agent::{ActionAgent, StepContext};
use crate::approval::{ApprovalChannel, ApprovalDecision, ApprovalRequest};
use crate::cancel::{cancelled, CancellationHandle};
use crate::config::EngineConfig;
use crate::error::ApprovalError;
use crate::phases::group_phases;
use chrono::Utc;
use mission_audit::AuditLog;
use mission_types::{
    AuditAppend, AuditEvent, AuditEventKind, CheckpointDecision, CheckpointRecord,
    ExecutionPlan, Mission, MissionFailure, MissionFailureReason, MissionId, MissionStatus, Phase,
    PhaseOutcome, PhaseStatus, StepId, StepOutcome, StepResult,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Instant;

// ── Shared view ──────────────────────────────────────────────────────

/// Read-only view of a mission while it runs
#[derive(Clone)]
pub struct MissionWatch {
    inner: Arc<RwLock<Mission>>,
}

impl MissionWatch {
    pub fn snapshot(&self) -> Mission {
        self.inner.read().clone()
    }

    pub fn status(&self) -> MissionStatus {
        self.inner.read().status
    }

    pub fn mission_id(&self) -> MissionId {
        self.inner.read().mission_id.clone()
    }
}

// ── Internal control flow ────────────────────────────────────────────

/// Why the phase loop stopped early
enum Halt {
    Failed(MissionFailureReason, String),
    Cancelled(String),
}

/// What came back from the approval gate
enum GateResult {
    Decided(ApprovalDecision),
    TimedOut,
    Unavailable(ApprovalError),
    Cancelled,
}

/// First failing step of a phase attempt
struct StepFailure {
    step_id: StepId,
    error: String,
}

// ── State machine ────────────────────────────────────────────────────

/// Executes one mission. Consumed by [`MissionStateMachine::run`].
pub struct MissionStateMachine {
    config: EngineConfig,
    agent: Arc<dyn ActionAgent>,
    approvals: Arc<dyn ApprovalChannel>,
    audit: Arc<dyn AuditLog>,
    plan: Arc<ExecutionPlan>,
    mission: Arc<RwLock<Mission>>,
    cancel: CancellationHandle,
    cancel_rx: watch::Receiver<bool>,
    /// Data extracted by completed phases, visible to later steps
    variables: BTreeMap<String, Value>,
}

impl MissionStateMachine {
    pub(crate) fn new(
        config: EngineConfig,
        agent: Arc<dyn ActionAgent>,
        approvals: Arc<dyn ApprovalChannel>,
        audit: Arc<dyn AuditLog>,
        mission: Mission,
    ) -> Self {
        let cancel = CancellationHandle::new();
        let cancel_rx = cancel.subscribe();
        Self {
            config,
            agent,
            approvals,
            audit,
            plan: mission.plan.clone(),
            mission: Arc::new(RwLock::new(mission)),
            cancel,
            cancel_rx,
            variables: BTreeMap::new(),
        }
    }

    pub fn mission_id(&self) -> MissionId {
        self.mission.read().mission_id.clone()
    }

    pub fn watch(&self) -> MissionWatch {
        MissionWatch {
            inner: self.mission.clone(),
        }
    }

    pub fn cancellation(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Run the mission to a terminal state and return its final form.
    pub async fn run(mut self) -> Mission {
        let phases = group_phases(&self.plan);
        let deadline = self.config.mission_timeout().map(|t| Instant::now() + t);
        let mission_id = self.mission_id();

        self.update(|m| {
            m.phases = phases.clone();
            m.started_at = Some(Utc::now());
        });
        self.set_status(MissionStatus::Running);

        tracing::info!(
            mission_id = %mission_id,
            workflow_id = %self.plan.workflow_id,
            phases = phases.len(),
            human_oversight = self.human_oversight(),
            "Mission started"
        );

        match self.run_phases(&phases, deadline).await {
            Ok(()) => {
                self.finish(MissionStatus::Completed, None);
                tracing::info!(mission_id = %mission_id, "Mission completed");
            }
            Err(Halt::Failed(reason, detail)) => {
                tracing::warn!(
                    mission_id = %mission_id,
                    reason = %reason,
                    detail = %detail,
                    "Mission failed"
                );
                self.finish(
                    MissionStatus::Failed,
                    Some(MissionFailure { reason, detail }),
                );
            }
            Err(Halt::Cancelled(detail)) => {
                tracing::info!(mission_id = %mission_id, "Mission cancelled");
                self.finish(
                    MissionStatus::Cancelled,
                    Some(MissionFailure {
                        reason: MissionFailureReason::Cancelled,
                        detail,
                    }),
                );
            }
        }

        self.mission.read().clone()
    }

    /// The first `started` event also names the job and a fallback plan, so
    /// the mission's own trail links back to planning.
    fn started_detail(&self, phase: &Phase, first: bool) -> String {
        let mut detail = format!("phase {}", phase.label);
        if first {
            if let Some(job_id) = &self.plan.job_id {
                detail.push_str(&format!("; job {}", job_id));
            }
            if self.plan.is_fallback() {
                detail.push_str("; rule-based fallback plan");
            }
        }
        detail
    }

    async fn run_phases(&mut self, phases: &[Phase], deadline: Option<Instant>) -> Result<(), Halt> {
        for (index, phase) in phases.iter().enumerate() {
            self.check_boundary(phase, deadline).await?;

            self.record(self.append(
                AuditEventKind::Started,
                phase,
                self.started_detail(phase, index == 0),
            ))
            .await?;

            if self.needs_approval(phase) {
                self.approval_gate(phase).await?;
            }

            self.execute_phase(phase).await?;
        }
        Ok(())
    }

    // ── Boundaries ───────────────────────────────────────────────────

    async fn check_boundary(&mut self, next: &Phase, deadline: Option<Instant>) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            let detail = format!("cancelled before phase {}", next.id);
            self.record(AuditAppend::new(
                self.mission_id(),
                AuditEventKind::Cancelled,
                detail.clone(),
            ))
            .await?;
            return Err(Halt::Cancelled(detail));
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                let detail = format!(
                    "execution_failed: mission timeout of {}s exceeded before phase {}",
                    self.config.mission_timeout_secs.unwrap_or_default(),
                    next.id
                );
                self.record(AuditAppend::new(
                    self.mission_id(),
                    AuditEventKind::Failed,
                    detail.clone(),
                ))
                .await?;
                return Err(Halt::Failed(MissionFailureReason::ExecutionFailed, detail));
            }
        }
        Ok(())
    }

    // ── Approval ─────────────────────────────────────────────────────

    fn needs_approval(&self, phase: &Phase) -> bool {
        self.human_oversight() && phase.step_indices.iter().any(|&i| self.plan.needs_approval_at(i))
    }

    async fn approval_gate(&mut self, phase: &Phase) -> Result<(), Halt> {
        let steps: Vec<_> = phase.steps(&self.plan).cloned().collect();
        let step_ids: Vec<&str> = steps.iter().map(|s| s.id.as_str()).collect();

        self.set_status(MissionStatus::AwaitingApproval);
        self.record(self.append(
            AuditEventKind::CheckpointRequested,
            phase,
            format!("approval required for steps {}", step_ids.join(", ")),
        ))
        .await?;
        self.push_checkpoint(phase, CheckpointDecision::Requested, None, None);

        let request = ApprovalRequest {
            mission_id: self.mission_id(),
            workflow_id: self.plan.workflow_id.clone(),
            phase_id: phase.id.clone(),
            phase_label: phase.label.clone(),
            steps,
            requested_at: Utc::now(),
        };
        tracing::info!(
            mission_id = %request.mission_id,
            phase_id = %phase.id,
            "Awaiting approval"
        );

        let approvals = self.approvals.clone();
        let timeout = self.config.approval_timeout();
        let mut cancel_rx = self.cancel_rx.clone();
        let result = tokio::select! {
            biased;
            _ = cancelled(&mut cancel_rx) => GateResult::Cancelled,
            answer = tokio::time::timeout(timeout, approvals.request_approval(request)) => {
                match answer {
                    Err(_) => GateResult::TimedOut,
                    Ok(Err(e)) => GateResult::Unavailable(e),
                    Ok(Ok(decision)) => GateResult::Decided(decision),
                }
            }
        };

        match result {
            GateResult::Decided(decision) if decision.approved => {
                self.record(self.append(
                    AuditEventKind::CheckpointApproved,
                    phase,
                    describe_decision("approved", &decision),
                ))
                .await?;
                self.push_checkpoint(
                    phase,
                    CheckpointDecision::Approved,
                    decision.reviewer,
                    decision.note,
                );
                self.set_status(MissionStatus::Running);
                Ok(())
            }
            GateResult::Decided(decision) => {
                let detail = describe_decision("human_rejected", &decision);
                self.record(self.append(AuditEventKind::CheckpointRejected, phase, detail.clone()))
                    .await?;
                self.push_checkpoint(
                    phase,
                    CheckpointDecision::Rejected,
                    decision.reviewer,
                    decision.note,
                );
                self.stop_at_gate(phase, MissionFailureReason::HumanRejected, detail)
                    .await
            }
            GateResult::TimedOut => {
                let detail = format!(
                    "approval_timeout: no decision within {}s",
                    self.config.approval_timeout_secs
                );
                self.record(self.append(AuditEventKind::CheckpointRejected, phase, detail.clone()))
                    .await?;
                self.push_checkpoint(phase, CheckpointDecision::TimedOut, None, None);
                self.stop_at_gate(phase, MissionFailureReason::ApprovalTimeout, detail)
                    .await
            }
            GateResult::Unavailable(e) => {
                let detail = format!("approval_timeout: {}", e);
                self.record(self.append(AuditEventKind::CheckpointRejected, phase, detail.clone()))
                    .await?;
                self.push_checkpoint(phase, CheckpointDecision::TimedOut, None, Some(e.to_string()));
                self.stop_at_gate(phase, MissionFailureReason::ApprovalTimeout, detail)
                    .await
            }
            GateResult::Cancelled => {
                let detail = format!("cancelled while awaiting approval for {}", phase.id);
                self.record(self.append(AuditEventKind::Cancelled, phase, detail.clone()))
                    .await?;
                Err(Halt::Cancelled(detail))
            }
        }
    }

    /// Close out a phase that never got past its gate.
    async fn stop_at_gate(
        &mut self,
        phase: &Phase,
        reason: MissionFailureReason,
        detail: String,
    ) -> Result<(), Halt> {
        self.record(self.append(AuditEventKind::Failed, phase, detail.clone()))
            .await?;
        self.store_outcome(PhaseOutcome {
            phase_id: phase.id.clone(),
            status: PhaseStatus::Rejected,
            attempts: 0,
            step_results: Vec::new(),
            extracted_data: BTreeMap::new(),
        });
        Err(Halt::Failed(reason, detail))
    }

    // ── Execution ────────────────────────────────────────────────────

    async fn execute_phase(&mut self, phase: &Phase) -> Result<(), Halt> {
        let max_retries = self.max_retries();
        let mut step_results = Vec::new();
        let mut retries = 0u32;
        let mut attempt = 1u32;

        loop {
            let (results, outcome) = self.attempt_phase(phase, attempt).await;
            step_results.extend(results);

            match outcome {
                Ok(extracted) => {
                    self.record(self.append(
                        AuditEventKind::Succeeded,
                        phase,
                        format!(
                            "{} steps completed on attempt {}",
                            phase.step_indices.len(),
                            attempt
                        ),
                    ))
                    .await?;
                    self.variables.extend(extracted.clone());
                    self.store_outcome(PhaseOutcome {
                        phase_id: phase.id.clone(),
                        status: PhaseStatus::Succeeded,
                        attempts: attempt,
                        step_results,
                        extracted_data: extracted,
                    });
                    return Ok(());
                }
                Err(failure) if retries < max_retries => {
                    retries += 1;
                    tracing::warn!(
                        mission_id = %self.mission_id(),
                        phase_id = %phase.id,
                        step_id = %failure.step_id,
                        attempt,
                        error = %failure.error,
                        "Phase attempt failed; retrying"
                    );
                    self.record(
                        self.append(
                            AuditEventKind::Retried,
                            phase,
                            format!("attempt {} failed: {}", attempt, failure.error),
                        )
                        .with_step(failure.step_id),
                    )
                    .await?;
                    attempt += 1;
                }
                Err(failure) => {
                    let detail = format!(
                        "execution_failed: step {} failed after {} attempts: {}",
                        failure.step_id, attempt, failure.error
                    );
                    self.record(
                        self.append(AuditEventKind::Failed, phase, detail.clone())
                            .with_step(failure.step_id),
                    )
                    .await?;
                    self.store_outcome(PhaseOutcome {
                        phase_id: phase.id.clone(),
                        status: PhaseStatus::Failed,
                        attempts: attempt,
                        step_results,
                        extracted_data: BTreeMap::new(),
                    });
                    return Err(Halt::Failed(MissionFailureReason::ExecutionFailed, detail));
                }
            }
        }
    }

    /// Run every step of a phase once, stopping at the first failure.
    async fn attempt_phase(
        &self,
        phase: &Phase,
        attempt: u32,
    ) -> (
        Vec<StepOutcome>,
        Result<BTreeMap<String, Value>, StepFailure>,
    ) {
        let mission_id = self.mission_id();
        let mut results = Vec::new();
        let mut extracted = BTreeMap::new();

        for &index in &phase.step_indices {
            let Some(step) = self.plan.steps.get(index) else {
                continue;
            };
            let mut variables = self.variables.clone();
            variables.extend(extracted.clone());
            let context = StepContext {
                mission_id: mission_id.clone(),
                phase_id: phase.id.clone(),
                step_index: index,
                attempt,
                variables,
            };

            let started = std::time::Instant::now();
            let result = match tokio::time::timeout(
                self.config.step_timeout(),
                self.agent.execute_step(step, &context),
            )
            .await
            {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => StepResult::failure(e.to_string()),
                Err(_) => StepResult::failure(format!(
                    "step timed out after {}s",
                    self.config.step_timeout_secs
                )),
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            tracing::debug!(
                mission_id = %mission_id,
                step_id = %step.id,
                attempt,
                success = result.success,
                duration_ms,
                "Step finished"
            );

            let failure = (!result.success).then(|| StepFailure {
                step_id: step.id.clone(),
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "step reported failure without detail".to_string()),
            });
            if let Some(data) = &result.extracted_data {
                extracted.extend(data.clone());
            }
            results.push(StepOutcome {
                step_id: step.id.clone(),
                attempt,
                result,
                duration_ms,
            });

            if let Some(failure) = failure {
                return (results, Err(failure));
            }
        }
        (results, Ok(extracted))
    }

    // ── Bookkeeping ──────────────────────────────────────────────────

    fn human_oversight(&self) -> bool {
        self.mission.read().human_oversight
    }

    fn max_retries(&self) -> u32 {
        self.mission.read().max_retries
    }

    fn append(&self, kind: AuditEventKind, phase: &Phase, detail: String) -> AuditAppend {
        AuditAppend::new(self.mission_id(), kind, detail).with_phase(phase.id.clone())
    }

    /// Durably record an event, then mirror it into the mission's trail.
    async fn record(&self, append: AuditAppend) -> Result<AuditEvent, Halt> {
        let kind = append.kind;
        match self.audit.append(append).await {
            Ok(event) => {
                self.update(|m| m.audit_trail.push(event.clone()));
                Ok(event)
            }
            Err(e) => {
                tracing::error!(
                    mission_id = %self.mission_id(),
                    kind = %kind,
                    error = %e,
                    "Audit append failed; stopping mission"
                );
                Err(Halt::Failed(
                    MissionFailureReason::AuditUnavailable,
                    format!("audit_unavailable: {}", e),
                ))
            }
        }
    }

    fn update(&self, f: impl FnOnce(&mut Mission)) {
        f(&mut *self.mission.write());
    }

    fn set_status(&self, next: MissionStatus) {
        let mut mission = self.mission.write();
        if mission.status == next {
            return;
        }
        if !mission.status.can_transition_to(next) {
            tracing::error!(
                mission_id = %mission.mission_id,
                from = %mission.status,
                to = %next,
                "Illegal mission transition ignored"
            );
            return;
        }
        mission.status = next;
    }

    fn finish(&self, status: MissionStatus, failure: Option<MissionFailure>) {
        self.set_status(status);
        self.update(|m| {
            m.failure = failure;
            m.finished_at = Some(Utc::now());
        });
    }

    fn push_checkpoint(
        &self,
        phase: &Phase,
        decision: CheckpointDecision,
        reviewer: Option<String>,
        note: Option<String>,
    ) {
        self.update(|m| {
            m.checkpoints.push(CheckpointRecord {
                phase_id: phase.id.clone(),
                decision,
                reviewer,
                note,
                at: Utc::now(),
            })
        });
    }

    fn store_outcome(&self, outcome: PhaseOutcome) {
        self.update(|m| {
            m.results.insert(outcome.phase_id.clone(), outcome);
        });
    }
}

fn describe_decision(prefix: &str, decision: &ApprovalDecision) -> String {
    let mut detail = prefix.to_string();
    if let Some(reviewer) = &decision.reviewer {
        detail.push_str(&format!(" by {}", reviewer));
    }
    if let Some(note) = &decision.note {
        detail.push_str(&format!(": {}", note));
    }
    detail
}
