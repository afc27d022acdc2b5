//! Action agents
//!
//! An [`ActionAgent`] performs one step against a live application session.
//! The engine never touches the application itself.

use crate::error::AgentError;
use async_trait::async_trait;
use mission_types::{ExecutionStep, MissionId, PhaseId, StepResult};
use serde_json::Value;
use std::collections::BTreeMap;

/// What an agent knows about the step it is asked to run
#[derive(Debug, Clone)]
pub struct StepContext {
    pub mission_id: MissionId,
    pub phase_id: PhaseId,
    pub step_index: usize,
    /// 1-based attempt number of the enclosing phase
    pub attempt: u32,
    /// Data extracted by earlier steps of this mission
    pub variables: BTreeMap<String, Value>,
}

/// Executes a single plan step.
#[async_trait]
pub trait ActionAgent: Send + Sync {
    async fn execute_step(
        &self,
        step: &ExecutionStep,
        context: &StepContext,
    ) -> Result<StepResult, AgentError>;
}

/// Agent that reports success for every step without acting.
#[derive(Debug, Clone, Default)]
pub struct DryRunAgent;

#[async_trait]
impl ActionAgent for DryRunAgent {
    async fn execute_step(
        &self,
        step: &ExecutionStep,
        context: &StepContext,
    ) -> Result<StepResult, AgentError> {
        tracing::info!(
            mission_id = %context.mission_id,
            phase_id = %context.phase_id,
            step_id = %step.id,
            action = %step.action_type,
            "Dry run: {}",
            step.name
        );
        Ok(StepResult::success().with_data(
            format!("{}.dry_run", step.id),
            Value::Bool(true),
        ))
    }
}

/// Wraps an agent so at most one step runs at a time.
///
/// Use one per application session when several missions share an agent.
pub struct SerializedAgent<A> {
    inner: A,
    gate: tokio::sync::Mutex<()>,
}

impl<A: ActionAgent> SerializedAgent<A> {
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

#[async_trait]
impl<A: ActionAgent> ActionAgent for SerializedAgent<A> {
    async fn execute_step(
        &self,
        step: &ExecutionStep,
        context: &StepContext,
    ) -> Result<StepResult, AgentError> {
        let _session = self.gate.lock().await;
        self.inner.execute_step(step, context).await
    }
}
