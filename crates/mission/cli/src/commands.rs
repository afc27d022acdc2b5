//! Command handlers

use crate::config::{AuditConfig, MissionConfig};
use crate::output::{self, OutputFormat};
use anyhow::{bail, Context};
use clap::Subcommand;
use mission_audit::{AuditLog, FileAuditLog, FilePlanStore, MemoryAuditLog, MemoryPlanStore, PlanStore};
use mission_engine::{
    ApprovalChannel, ApprovalDecision, AutoApprove, ChannelApproval, DryRunAgent, MissionOrchestrator,
    MissionRequest, MissionService, PendingApproval,
};
use mission_planner::{PlanOutcome, PlannerFacade};
use mission_types::{JobId, MissionId, ProcedureDefinition, TranscriptEvent, WorkflowId};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Subcommand)]
pub enum Commands {
    /// Produce an execution plan for a recorded procedure
    Plan {
        /// Procedure definition (JSON)
        procedure: PathBuf,

        /// Recorded transcript (JSON array of events)
        #[arg(short, long)]
        transcript: Option<PathBuf>,

        /// Correlation id for audit records
        #[arg(long)]
        job_id: Option<String>,

        /// Add an operator checkpoint before the step at this index
        #[arg(long = "checkpoint")]
        checkpoints: Vec<usize>,
    },

    /// Plan and execute a procedure with the dry-run agent
    Run {
        procedure: PathBuf,

        #[arg(short, long)]
        transcript: Option<PathBuf>,

        #[arg(long)]
        job_id: Option<String>,

        /// Skip approval checkpoints
        #[arg(long)]
        no_oversight: bool,

        /// Retry budget per phase
        #[arg(long)]
        max_retries: Option<u32>,

        /// Approve every checkpoint without prompting
        #[arg(long)]
        yes: bool,
    },

    /// Show or verify a mission's audit trail
    Audit {
        /// Mission id (or job id, for fallback records)
        mission: String,

        /// Recompute the hash chain
        #[arg(long)]
        verify: bool,
    },

    /// List stored plans, or show one
    Plans {
        workflow: Option<String>,
    },

    /// Show the effective configuration
    Config,
}

/// Storage shared by all commands
pub struct Stores {
    pub audit: Arc<dyn AuditLog>,
    pub plans: Arc<dyn PlanStore>,
}

impl Stores {
    pub async fn open(config: &AuditConfig) -> anyhow::Result<Self> {
        Ok(match config {
            AuditConfig::Memory => Self {
                audit: Arc::new(MemoryAuditLog::new()),
                plans: Arc::new(MemoryPlanStore::new()),
            },
            AuditConfig::File { dir } => Self {
                audit: Arc::new(
                    FileAuditLog::open(dir.join("audit"))
                        .await
                        .with_context(|| format!("opening audit log in {}", dir.display()))?,
                ),
                plans: Arc::new(FilePlanStore::open(dir.join("plans")).await?),
            },
        })
    }
}

pub async fn execute(
    command: Commands,
    config: &MissionConfig,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Commands::Config = command {
        let mut shown = config.clone();
        if let Some(backend) = shown.planner.reasoning.as_mut() {
            if backend.api_key.is_some() {
                backend.api_key = Some("<redacted>".to_string());
            }
        }
        return output::print_json(&shown);
    }

    let stores = Stores::open(&config.audit).await?;
    let planner = Arc::new(
        PlannerFacade::new(config.planner.clone())
            .with_audit_log(stores.audit.clone())
            .with_plan_store(stores.plans.clone()),
    );

    match command {
        Commands::Plan {
            procedure,
            transcript,
            job_id,
            checkpoints,
        } => {
            let procedure = read_procedure(&procedure)?;
            let transcript = read_transcript(transcript.as_deref())?;
            let job_id = job_id.map(JobId::new).unwrap_or_else(JobId::generate);

            let mut outcome = planner
                .analyze_workflow(&procedure, &transcript, &job_id)
                .await?;
            for index in checkpoints {
                let derived = outcome.plan().with_operator_checkpoint(index)?;
                stores.plans.save_plan(&derived).await?;
                outcome = match outcome {
                    PlanOutcome::Reasoned(_) => PlanOutcome::Reasoned(derived),
                    PlanOutcome::Fallback { cause, detail, .. } => PlanOutcome::Fallback {
                        plan: derived,
                        cause,
                        detail,
                    },
                };
            }

            match format {
                OutputFormat::Json => output::print_json(outcome.plan()),
                OutputFormat::Text => {
                    output::print_plan(&outcome);
                    Ok(())
                }
            }
        }

        Commands::Run {
            procedure,
            transcript,
            job_id,
            no_oversight,
            max_retries,
            yes,
        } => {
            let mut request = MissionRequest::new(read_procedure(&procedure)?)
                .with_transcript(read_transcript(transcript.as_deref())?);
            if let Some(job_id) = job_id {
                request = request.with_job_id(JobId::new(job_id));
            }
            if no_oversight {
                request = request.with_oversight(false);
            }
            if let Some(max_retries) = max_retries {
                request = request.with_max_retries(max_retries);
            }

            let approvals: Arc<dyn ApprovalChannel> = if yes {
                Arc::new(AutoApprove)
            } else {
                let (channel, inbox) = ChannelApproval::new(1);
                tokio::spawn(prompt_for_approvals(inbox));
                Arc::new(channel)
            };
            let orchestrator = MissionOrchestrator::new(
                config.engine.clone(),
                Arc::new(DryRunAgent),
                approvals,
                stores.audit.clone(),
            );
            let service = MissionService::new(planner, orchestrator);

            let mut handle = service.submit(request).await?;
            if matches!(format, OutputFormat::Text) {
                if let Some(cause) = handle.fallback_cause() {
                    output::print_warning(&format!("Using rule-based plan ({})", cause));
                }
                output::print_info(&format!(
                    "Mission {} started ({} steps)",
                    handle.mission_id(),
                    handle.plan().steps.len()
                ));
            }

            let printed = Arc::new(AtomicU64::new(0));
            let printer = handle.take_events().map(|mut events| {
                let printed = printed.clone();
                tokio::spawn(async move {
                    while let Some(event) = events.next().await {
                        if matches!(format, OutputFormat::Text) {
                            output::print_event_line(&event);
                        }
                        printed.store(event.sequence, Ordering::SeqCst);
                    }
                })
            });

            let mission = handle.wait().await?;
            if let Some(printer) = printer {
                printer.abort();
                let _ = printer.await;
            }

            match format {
                OutputFormat::Json => output::print_json(&mission)?,
                OutputFormat::Text => {
                    let seen = printed.load(Ordering::SeqCst);
                    for event in mission.audit_trail.iter().filter(|e| e.sequence > seen) {
                        output::print_event_line(event);
                    }
                    output::print_mission(&mission);
                }
            }
            if mission.failure.is_some() {
                bail!("mission {} did not complete", mission.mission_id);
            }
            Ok(())
        }

        Commands::Audit { mission, verify } => {
            let mission_id = MissionId::new(mission);
            let events = stores.audit.events_for(&mission_id).await?;
            match format {
                OutputFormat::Json => output::print_json(&events)?,
                OutputFormat::Text => output::print_events(&events),
            }
            if verify {
                let verification = stores.audit.verify(&mission_id).await?;
                match format {
                    OutputFormat::Json => output::print_json(&verification)?,
                    OutputFormat::Text => output::print_verification(&verification),
                }
                if !verification.valid {
                    bail!("audit chain for {} failed verification", mission_id);
                }
            }
            Ok(())
        }

        Commands::Plans { workflow } => match workflow {
            Some(id) => {
                let plan = stores
                    .plans
                    .load_plan(&WorkflowId::new(id.clone()))
                    .await?
                    .with_context(|| format!("no stored plan {}", id))?;
                output::print_json(&plan)
            }
            None => {
                let ids = stores.plans.list_plans().await?;
                if ids.is_empty() {
                    output::print_info("No stored plans");
                }
                for id in ids {
                    println!("{}", id);
                }
                Ok(())
            }
        },

        Commands::Config => Ok(()),
    }
}

/// Answer checkpoints from the terminal.
async fn prompt_for_approvals(mut inbox: mpsc::Receiver<PendingApproval>) {
    while let Some(pending) = inbox.recv().await {
        let request = &pending.request;
        output::print_warning(&format!(
            "Checkpoint for phase {} of mission {}",
            request.phase_id, request.mission_id
        ));
        for step in &request.steps {
            println!("    {} [{}] {}", step.id, step.action_type, step.name);
        }

        let prompt = format!("Approve phase '{}'?", request.phase_label);
        let approved = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
                .unwrap_or(false)
        })
        .await
        .unwrap_or(false);

        let decision = if approved {
            ApprovalDecision::approve().by("operator")
        } else {
            ApprovalDecision::reject("declined at terminal").by("operator")
        };
        if !pending.respond(decision) {
            output::print_error("Mission stopped waiting before the answer arrived");
        }
    }
}

fn read_procedure(path: &Path) -> anyhow::Result<ProcedureDefinition> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading procedure {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing procedure {}", path.display()))
}

fn read_transcript(path: Option<&Path>) -> anyhow::Result<Vec<TranscriptEvent>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading transcript {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing transcript {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_procedure_accepts_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procedure.json");
        std::fs::write(
            &path,
            r#"{"title": "Pay invoice", "nodes": [
                {"id": "n1", "type": "action", "label": "Open invoices"},
                {"id": "n2", "type": "condition", "label": "Amount matches?"}
            ]}"#,
        )
        .unwrap();

        let procedure = read_procedure(&path).unwrap();
        assert_eq!(procedure.nodes.len(), 2);
        assert!(read_transcript(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_stores_share_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = AuditConfig::File {
            dir: dir.path().to_path_buf(),
        };
        let stores = Stores::open(&config).await.unwrap();
        assert!(stores.plans.list_plans().await.unwrap().is_empty());
        assert!(dir.path().join("audit").is_dir());
        assert!(dir.path().join("plans").is_dir());
    }
}
