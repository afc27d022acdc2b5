//! Engine configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Execution settings shared by every mission an orchestrator runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long a checkpoint waits for a decision before the mission fails
    #[serde(default = "default_approval_timeout")]
    pub approval_timeout_secs: u64,

    /// Upper bound on a single agent call
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Optional bound on a whole mission, checked between phases
    #[serde(default)]
    pub mission_timeout_secs: Option<u64>,

    /// Default oversight setting for submitted missions
    #[serde(default = "default_true")]
    pub human_oversight: bool,

    /// Default retry budget per phase
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            approval_timeout_secs: default_approval_timeout(),
            step_timeout_secs: default_step_timeout(),
            mission_timeout_secs: None,
            human_oversight: true,
            max_retries: default_max_retries(),
        }
    }
}

impl EngineConfig {
    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn mission_timeout(&self) -> Option<Duration> {
        self.mission_timeout_secs.map(Duration::from_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_approval_timeout() -> u64 {
    900
}

fn default_step_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}
