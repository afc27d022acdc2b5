//! Recorded procedures: the input to planning
//!
//! A procedure is an ordered graph of nodes captured from a human
//! demonstrating a task. An optional transcript of the recorded interaction
//! events travels alongside it as supporting evidence.

use crate::ProcedureError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ── Procedure ────────────────────────────────────────────────────────

/// A recorded procedure, as produced by the capture tooling
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDefinition {
    pub title: String,
    /// What the procedure is meant to accomplish
    #[serde(default)]
    pub goal: String,
    pub nodes: Vec<ProcedureNode>,
    /// Named values substituted into `{{name}}` placeholders in node labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

impl ProcedureDefinition {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            goal: String::new(),
            nodes: Vec::new(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_goal(mut self, goal: impl Into<String>) -> Self {
        self.goal = goal.into();
        self
    }

    pub fn with_node(mut self, node: ProcedureNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Check that the procedure is well-formed enough to plan from.
    pub fn validate(&self) -> Result<(), ProcedureError> {
        if self.title.trim().is_empty() {
            return Err(ProcedureError::EmptyTitle);
        }
        if self.nodes.is_empty() {
            return Err(ProcedureError::NoNodes);
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ProcedureError::DuplicateNode(node.id.clone()));
            }
            if node.label.trim().is_empty() {
                return Err(ProcedureError::EmptyLabel(node.id.clone()));
            }
        }
        Ok(())
    }

    /// Replace `{{name}}` placeholders with the procedure's variables.
    /// Unknown placeholders are left as written.
    pub fn substitute(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (name, value) in &self.variables {
            out = out.replace(&format!("{{{{{}}}}}", name), value);
        }
        out
    }
}

/// A single node in a recorded procedure
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcedureNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    /// The operator's stated intent for this node, if captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl ProcedureNode {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            intent: None,
        }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }
}

/// Kind tag of a procedure node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[serde(alias = "action")]
    Task,
    Navigate,
    #[serde(alias = "condition", alias = "branch")]
    Decision,
    Loop,
    Wait,
    /// Any tag the planner does not recognise. Planned as a task.
    #[serde(other)]
    Other,
}

// ── Transcript ───────────────────────────────────────────────────────

/// One recorded interaction event
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub kind: TranscriptEventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Application or surface in focus when the event was recorded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    /// Element metadata for the interaction target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetElement>,
    /// Typed text or navigation URL, depending on kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_state: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptEventKind {
    Navigate,
    Click,
    Type,
    Read,
    SwitchContext,
    #[serde(other)]
    Other,
}

/// Metadata describing the element an event acted on
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetElement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProcedureDefinition {
        ProcedureDefinition::new("Pay invoice")
            .with_node(ProcedureNode::new("n1", NodeKind::Task, "Open billing"))
            .with_node(ProcedureNode::new("n2", NodeKind::Decision, "Amount ok?"))
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_duplicates() {
        assert_eq!(
            ProcedureDefinition::new("  ").validate(),
            Err(ProcedureError::EmptyTitle)
        );
        assert_eq!(
            ProcedureDefinition::new("x").validate(),
            Err(ProcedureError::NoNodes)
        );
        let dup = sample().with_node(ProcedureNode::new("n1", NodeKind::Wait, "again"));
        assert_eq!(
            dup.validate(),
            Err(ProcedureError::DuplicateNode("n1".into()))
        );
    }

    #[test]
    fn test_substitute_variables() {
        let proc = sample().with_variable("vendor", "Acme");
        assert_eq!(proc.substitute("Pay {{vendor}} now"), "Pay Acme now");
        assert_eq!(proc.substitute("Keep {{missing}}"), "Keep {{missing}}");
    }

    #[test]
    fn test_node_kind_parsing() {
        let node: ProcedureNode =
            serde_json::from_str(r#"{"id":"a","type":"condition","label":"x"}"#).unwrap();
        assert_eq!(node.kind, NodeKind::Decision);
        let node: ProcedureNode =
            serde_json::from_str(r#"{"id":"a","type":"screenshot","label":"x"}"#).unwrap();
        assert_eq!(node.kind, NodeKind::Other);
    }
}
