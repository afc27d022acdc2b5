//! Planner configuration

use mission_risk::RiskConfig;
use mission_types::ActionType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Reasoning backend; planning goes straight to the rule-based path when absent
    #[serde(default)]
    pub reasoning: Option<ReasoningBackendConfig>,

    /// Action types at which rule-based plans pause for human judgment
    #[serde(default = "default_judgment_actions")]
    pub judgment_actions: BTreeSet<ActionType>,

    /// Risk model settings
    #[serde(default)]
    pub risk: RiskConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            reasoning: None,
            judgment_actions: default_judgment_actions(),
            risk: RiskConfig::default(),
        }
    }
}

/// Connection settings for the reasoning backend
#[derive(Clone, Serialize, Deserialize)]
pub struct ReasoningBackendConfig {
    /// Endpoint accepting a planning request and returning a plan document
    pub endpoint: String,

    /// Bearer credential
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model name forwarded to the backend
    #[serde(default)]
    pub model: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ReasoningBackendConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            model: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The credential, if one is set and non-blank.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl std::fmt::Debug for ReasoningBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasoningBackendConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

fn default_judgment_actions() -> BTreeSet<ActionType> {
    BTreeSet::from([ActionType::Decide, ActionType::Update])
}

fn default_timeout_secs() -> u64 {
    30
}
