//! missionctl - mission planning and execution from the command line
//!
//! - `plan`: turn a recorded procedure into an execution plan
//! - `run`: plan and execute it, answering checkpoints at the terminal
//! - `audit`: inspect and verify a mission's hash-chained trail
//! - `plans`: browse stored plans

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod output;

use commands::Commands;
use config::MissionConfig;
use mission_planner::ReasoningBackendConfig;

#[derive(Parser)]
#[command(name = "missionctl")]
#[command(about = "Plan, run and audit missions built from recorded procedures", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MISSION_CONFIG")]
    config: Option<String>,

    /// Reasoning backend endpoint; overrides the configuration file
    #[arg(long, env = "MISSION_REASONING_ENDPOINT")]
    reasoning_endpoint: Option<String>,

    /// Reasoning backend credential
    #[arg(long, env = "MISSION_REASONING_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    output: output::OutputFormat,

    /// Log level
    #[arg(long, env = "MISSION_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "MISSION_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = MissionConfig::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // Override with CLI args
    if let Some(endpoint) = cli.reasoning_endpoint {
        let backend = config
            .planner
            .reasoning
            .get_or_insert_with(|| ReasoningBackendConfig::new(endpoint.clone()));
        backend.endpoint = endpoint;
    }
    if let Some(api_key) = cli.api_key {
        match config.planner.reasoning.as_mut() {
            Some(backend) => backend.api_key = Some(api_key),
            None => tracing::warn!("API key given without a reasoning endpoint; ignoring"),
        }
    }

    tracing::debug!(
        reasoning = config.planner.reasoning.is_some(),
        audit = ?config.audit,
        "Configuration loaded"
    );

    commands::execute(cli.command, &config, cli.output).await
}
