//! Mission service
//!
//! Plans a procedure and launches the resulting mission on its own task.
//! The returned [`MissionHandle`] exposes status snapshots, the live audit
//! feed and cancellation while the mission runs.

use crate::cancel::CancellationHandle;
use crate::error::{EngineError, EngineResult};
use crate::orchestrator::MissionOrchestrator;
use crate::state_machine::MissionWatch;
use mission_planner::{FallbackCause, PlanOutcome, PlannerFacade};
use mission_types::{
    AuditEvent, ExecutionPlan, JobId, Mission, MissionId, MissionStatus, ProcedureDefinition,
    TranscriptEvent,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Everything needed to plan and run one mission
#[derive(Debug, Clone)]
pub struct MissionRequest {
    pub procedure: ProcedureDefinition,
    pub transcript: Vec<TranscriptEvent>,
    /// Correlation id; generated when absent
    pub job_id: Option<JobId>,
    /// Overrides the engine default
    pub human_oversight: Option<bool>,
    /// Overrides the engine default
    pub max_retries: Option<u32>,
}

impl MissionRequest {
    pub fn new(procedure: ProcedureDefinition) -> Self {
        Self {
            procedure,
            transcript: Vec::new(),
            job_id: None,
            human_oversight: None,
            max_retries: None,
        }
    }

    pub fn with_transcript(mut self, transcript: Vec<TranscriptEvent>) -> Self {
        self.transcript = transcript;
        self
    }

    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn with_oversight(mut self, human_oversight: bool) -> Self {
        self.human_oversight = Some(human_oversight);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

pub struct MissionService {
    planner: Arc<PlannerFacade>,
    orchestrator: MissionOrchestrator,
}

impl MissionService {
    pub fn new(planner: Arc<PlannerFacade>, orchestrator: MissionOrchestrator) -> Self {
        Self {
            planner,
            orchestrator,
        }
    }

    pub fn orchestrator(&self) -> &MissionOrchestrator {
        &self.orchestrator
    }

    /// Plan without executing.
    pub async fn plan(&self, request: &MissionRequest) -> EngineResult<(JobId, PlanOutcome)> {
        let job_id = request.job_id.clone().unwrap_or_else(JobId::generate);
        let outcome = self
            .planner
            .analyze_workflow(&request.procedure, &request.transcript, &job_id)
            .await?;
        Ok((job_id, outcome))
    }

    /// Plan the request and start the mission in the background.
    pub async fn submit(&self, request: MissionRequest) -> EngineResult<MissionHandle> {
        let (job_id, outcome) = self.plan(&request).await?;
        let fallback = outcome.fallback_cause();
        let plan = Arc::new(outcome.into_plan());

        let defaults = self.orchestrator.config();
        let machine = self.orchestrator.prepare(
            plan.clone(),
            request.human_oversight.unwrap_or(defaults.human_oversight),
            request.max_retries.unwrap_or(defaults.max_retries),
        )?;

        let mission_id = machine.mission_id();
        let events = MissionEvents {
            mission_id: mission_id.clone(),
            receiver: self.orchestrator.audit_log().subscribe(),
        };
        let watch = machine.watch();
        let cancel = machine.cancellation();

        tracing::info!(
            mission_id = %mission_id,
            job_id = %job_id,
            workflow_id = %plan.workflow_id,
            fallback = fallback.is_some(),
            "Mission submitted"
        );

        let task = tokio::spawn(machine.run());
        Ok(MissionHandle {
            mission_id,
            job_id,
            plan,
            fallback,
            watch,
            cancel,
            events: Some(events),
            task,
        })
    }

    /// Plan, run and wait for the final mission.
    pub async fn run(&self, request: MissionRequest) -> EngineResult<Mission> {
        self.submit(request).await?.wait().await
    }
}

/// A submitted mission
pub struct MissionHandle {
    mission_id: MissionId,
    job_id: JobId,
    plan: Arc<ExecutionPlan>,
    fallback: Option<FallbackCause>,
    watch: MissionWatch,
    cancel: CancellationHandle,
    events: Option<MissionEvents>,
    task: JoinHandle<Mission>,
}

impl MissionHandle {
    pub fn mission_id(&self) -> &MissionId {
        &self.mission_id
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn plan(&self) -> &Arc<ExecutionPlan> {
        &self.plan
    }

    /// Set when the plan came from the rule-based path.
    pub fn fallback_cause(&self) -> Option<FallbackCause> {
        self.fallback
    }

    pub fn status(&self) -> MissionStatus {
        self.watch.status()
    }

    pub fn snapshot(&self) -> Mission {
        self.watch.snapshot()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation(&self) -> CancellationHandle {
        self.cancel.clone()
    }

    /// Take the live event feed. Subscribed before the mission started, so
    /// no event of this mission is missed. Returns `None` after the first call.
    pub fn take_events(&mut self) -> Option<MissionEvents> {
        self.events.take()
    }

    pub async fn wait(self) -> EngineResult<Mission> {
        self.task
            .await
            .map_err(|e| EngineError::Join(e.to_string()))
    }
}

/// Audit events of one mission, as they are appended
pub struct MissionEvents {
    mission_id: MissionId,
    receiver: broadcast::Receiver<AuditEvent>,
}

impl MissionEvents {
    /// Next event for this mission, or `None` once the log is gone.
    ///
    /// A lagging subscriber skips what it missed; the stored trail stays
    /// authoritative.
    pub async fn next(&mut self) -> Option<AuditEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.mission_id == self.mission_id => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        mission_id = %self.mission_id,
                        skipped,
                        "Event subscriber lagged"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
