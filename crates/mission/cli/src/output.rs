//! Output formatting

use colored::*;
use mission_audit::ChainVerification;
use mission_planner::PlanOutcome;
use mission_types::{AuditEvent, Mission, MissionStatus};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text and tables
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

pub fn print_json<T: Serialize>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Step")]
    id: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Secs")]
    duration: u64,
    #[tabled(rename = "Gate")]
    gate: String,
    #[tabled(rename = "Name")]
    name: String,
}

pub fn print_plan(outcome: &PlanOutcome) {
    let plan = outcome.plan();
    println!("{} {}", "Plan:".bold(), plan.title);
    println!("  Workflow: {}", plan.workflow_id);
    println!("  Risk:     {}", plan.risk_assessment.overall_risk);
    println!("  Duration: {}s", plan.estimated_duration);
    if let PlanOutcome::Fallback { cause, detail, .. } = outcome {
        print_warning(&format!("Rule-based fallback ({}): {}", cause, detail));
    }

    let rows: Vec<StepRow> = plan
        .steps
        .iter()
        .enumerate()
        .map(|(index, step)| StepRow {
            index,
            id: step.id.to_string(),
            action: step.action_type.to_string(),
            confidence: format!("{:?}", step.confidence),
            duration: step.estimated_duration,
            gate: if plan.needs_approval_at(index) {
                "approve".to_string()
            } else {
                String::new()
            },
            name: step.name.clone(),
        })
        .collect();
    println!("{}", Table::new(rows));

    for factor in &plan.risk_assessment.risk_factors {
        println!("  {} {}", "risk:".yellow(), factor);
    }
    for mitigation in &plan.risk_assessment.mitigation_strategies {
        println!("  {} {}", "mitigate:".cyan(), mitigation);
    }
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Seq")]
    sequence: u64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

pub fn print_events(events: &[AuditEvent]) {
    if events.is_empty() {
        println!("{}", "No events".dimmed());
        return;
    }
    let rows: Vec<EventRow> = events
        .iter()
        .map(|e| EventRow {
            sequence: e.sequence,
            time: e.timestamp.format("%H:%M:%S%.3f").to_string(),
            kind: e.kind.to_string(),
            phase: e.phase_id.as_ref().map(|p| p.to_string()).unwrap_or_default(),
            detail: e.detail.clone(),
        })
        .collect();
    println!("{}", Table::new(rows));
}

pub fn print_event_line(event: &AuditEvent) {
    let time = event.timestamp.format("%H:%M:%S");
    let phase = event.phase_id.as_ref().map(|p| p.as_str()).unwrap_or("-");
    println!(
        "{} {:<22} {:<20} {}",
        time.to_string().dimmed(),
        event.kind.to_string().bold(),
        phase,
        event.detail
    );
}

pub fn print_verification(verification: &ChainVerification) {
    if verification.valid {
        print_success(&format!(
            "Chain intact: {} events for {}",
            verification.events, verification.mission_id
        ));
    } else {
        print_error(&format!(
            "Chain broken at sequence {}: {}",
            verification
                .broken_at
                .map(|s| s.to_string())
                .unwrap_or_else(|| "?".into()),
            verification.reason.as_deref().unwrap_or("unknown")
        ));
    }
}

pub fn print_mission(mission: &Mission) {
    let status = match mission.status {
        MissionStatus::Completed => mission.status.to_string().green(),
        MissionStatus::Failed => mission.status.to_string().red(),
        _ => mission.status.to_string().yellow(),
    };
    println!("{} {} {}", "Mission".bold(), mission.mission_id, status);
    if let Some(failure) = &mission.failure {
        println!("  Reason: {} ({})", failure.reason, failure.detail);
    }
    println!(
        "  Phases: {}/{} completed",
        mission
            .results
            .values()
            .filter(|r| r.status == mission_types::PhaseStatus::Succeeded)
            .count(),
        mission.phases.len()
    );
    let data = mission.extracted_data();
    if !data.is_empty() {
        println!("  Extracted:");
        for (key, value) in data {
            println!("    {} = {}", key, value);
        }
    }
}
