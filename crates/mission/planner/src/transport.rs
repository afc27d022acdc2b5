//! Reasoning backend transport

use crate::config::ReasoningBackendConfig;
use crate::error::ReasoningError;
use async_trait::async_trait;
use mission_types::{JobId, ProcedureDefinition, TranscriptEvent};
use serde::Serialize;

/// Response-shape instructions sent with every planning request.
pub const PLAN_INSTRUCTIONS: &str = "\
Return exactly one JSON object describing an execution plan for the procedure. \
Fields: title (string), description (string), steps (array), estimated_duration \
(seconds), risk_assessment ({overall_risk: LOW|MEDIUM|HIGH, risk_factors: [string], \
mitigation_strategies: [string]}), human_checkpoints (array of step indices). \
Each step: id, name, description, action_type (navigate|click|type|extract|decide|\
wait|compose|update), confidence (HIGH|MEDIUM|LOW), estimated_duration (seconds), \
reasoning, fallback_options ([string]), requires_approval (bool). \
Mark any irreversible or uncertain step as requiring approval.";

/// Body of a planning request
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningRequest {
    pub procedure_definition: ProcedureDefinition,
    pub transcript: Vec<TranscriptEvent>,
    pub job_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub instructions: &'static str,
}

impl ReasoningRequest {
    pub fn new(
        procedure: &ProcedureDefinition,
        transcript: &[TranscriptEvent],
        job_id: &JobId,
    ) -> Self {
        Self {
            procedure_definition: procedure.clone(),
            transcript: transcript.to_vec(),
            job_id: job_id.clone(),
            model: None,
            instructions: PLAN_INSTRUCTIONS,
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// Sends a planning request and returns the raw response text.
#[async_trait]
pub trait ReasoningTransport: Send + Sync {
    async fn generate(
        &self,
        backend: &ReasoningBackendConfig,
        request: &ReasoningRequest,
    ) -> Result<String, ReasoningError>;
}

/// Longest response body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP transport: POSTs the request as JSON with bearer authentication.
#[derive(Debug, Clone, Default)]
pub struct HttpReasoningTransport {
    client: reqwest::Client,
}

impl HttpReasoningTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReasoningTransport for HttpReasoningTransport {
    async fn generate(
        &self,
        backend: &ReasoningBackendConfig,
        request: &ReasoningRequest,
    ) -> Result<String, ReasoningError> {
        let mut builder = self.client.post(&backend.endpoint).json(request);
        if let Some(key) = backend.credential() {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ReasoningError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::HttpStatus {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        response
            .text()
            .await
            .map_err(|e| ReasoningError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mission_types::{NodeKind, ProcedureNode};

    #[test]
    fn test_request_shape() {
        let procedure = ProcedureDefinition::new("Export report")
            .with_node(ProcedureNode::new("n1", NodeKind::Task, "Open reports"));
        let request = ReasoningRequest::new(&procedure, &[], &JobId::new("job-1"));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["job_id"], "job-1");
        assert_eq!(json["procedure_definition"]["title"], "Export report");
        assert!(json["transcript"].as_array().unwrap().is_empty());
        assert!(json.get("model").is_none());
    }

    #[test]
    fn test_transcript_evidence_reaches_backend() {
        let event: TranscriptEvent = serde_json::from_str(
            r#"{"kind": "click", "timestamp": "2024-01-01T00:00:00Z",
                "application": "Gmail", "before_state": "inbox list",
                "after_state": "message open",
                "target": {"role": "link", "name": "Invoice #42"}}"#,
        )
        .unwrap();
        let procedure = ProcedureDefinition::new("Read invoice")
            .with_node(ProcedureNode::new("n1", NodeKind::Task, "Open the invoice email"));
        let request = ReasoningRequest::new(&procedure, &[event], &JobId::new("job-1"));
        let json = serde_json::to_value(&request).unwrap();

        let sent = &json["transcript"][0];
        assert_eq!(sent["kind"], "click");
        assert_eq!(sent["application"], "Gmail");
        assert_eq!(sent["before_state"], "inbox list");
        assert_eq!(sent["after_state"], "message open");
        assert_eq!(sent["target"]["name"], "Invoice #42");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let transport = HttpReasoningTransport::new();
        let backend = ReasoningBackendConfig::new("http://127.0.0.1:9/plan");
        let procedure = ProcedureDefinition::new("x")
            .with_node(ProcedureNode::new("n1", NodeKind::Task, "Open"));
        let request = ReasoningRequest::new(&procedure, &[], &JobId::new("job"));

        let err = transport.generate(&backend, &request).await.unwrap_err();
        assert!(matches!(err, ReasoningError::Transport(_)));
    }
}
