//! Configuration for missionctl

use mission_engine::EngineConfig;
use mission_planner::PlannerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionConfig {
    /// Planning: reasoning backend, judgment points, risk thresholds
    #[serde(default)]
    pub planner: PlannerConfig,

    /// Execution: timeouts, oversight and retry defaults
    #[serde(default)]
    pub engine: EngineConfig,

    /// Where audit events and plans are kept
    #[serde(default)]
    pub audit: AuditConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Audit storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuditConfig {
    /// Lost when the process exits
    #[default]
    Memory,

    /// JSON lines per mission under `<dir>/audit`, plans under `<dir>/plans`
    File { dir: PathBuf },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl MissionConfig {
    /// Load defaults, then the optional file, then `MISSION__*` variables.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&MissionConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // MISSION__ENGINE__MAX_RETRIES=3, MISSION__AUDIT__TYPE=file, ...
        builder = builder.add_source(
            config::Environment::with_prefix("MISSION")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
