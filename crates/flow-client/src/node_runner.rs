//! Executes single nodes on the backend for debug sessions

use async_trait::async_trait;
use flow_editor::{FlowError, NodeKind, NodeRunReport, NodeRunRequest, NodeRunner};
use reqwest::Method;

use crate::constants::endpoints;
use crate::error::{ClientError, Result};
use crate::http::ApiClient;

/// [`NodeRunner`] that posts each node to the backend
///
/// The backend answers with a bare report (no envelope). AI dialog nodes
/// go to their own endpoint; everything else shares the generic one.
#[derive(Debug, Clone)]
pub struct HttpNodeRunner {
    client: ApiClient,
}

impl HttpNodeRunner {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn endpoint_for(node_type: &str) -> &'static str {
        if node_type == NodeKind::AiDialog.as_str() {
            endpoints::EXECUTE_AI_DIALOG
        } else {
            endpoints::EXECUTE_NODE
        }
    }

    /// Run one node, keeping client-side error detail
    pub async fn execute(&self, request: &NodeRunRequest) -> Result<NodeRunReport> {
        let endpoint = Self::endpoint_for(&request.node_type);
        log::debug!("Executing node {} via {}", request.node_id, endpoint);

        let builder = self
            .client
            .request_with_timeout(Method::POST, endpoint, self.client.config().node_timeout())
            .json(request);
        let response = self.client.send_checked(builder).await?;
        let body = response.text().await?;
        let report: NodeRunReport = serde_json::from_str(&body)
            .map_err(|e| ClientError::Decode(format!("node report: {}", e)))?;

        if !report.success {
            log::warn!(
                "Node {} failed on backend: {}",
                request.node_id,
                report.error.as_deref().unwrap_or("no error message")
            );
        }
        Ok(report)
    }
}

#[async_trait]
impl NodeRunner for HttpNodeRunner {
    async fn run_node(&self, request: NodeRunRequest) -> flow_editor::Result<NodeRunReport> {
        self.execute(&request)
            .await
            .map_err(|e| FlowError::Execution(format!("{}: {}", request.node_id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use flow_editor::{DebugSession, FlowBuilder, NullEventSink, SessionState, StepOutcome};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn runner_for(server: &MockServer, node_timeout_ms: u64) -> HttpNodeRunner {
        let mut config = ClientConfig::new(server.uri());
        config.node_timeout_ms = node_timeout_ms;
        HttpNodeRunner::new(ApiClient::new(config).unwrap())
    }

    fn request(node_type: &str) -> NodeRunRequest {
        NodeRunRequest {
            node_type: node_type.to_string(),
            node_id: "n1".to_string(),
            node_data: serde_json::Map::new(),
            input: json!({"text": "hi"}),
            context: json!({}),
        }
    }

    #[tokio::test]
    async fn test_ai_dialog_uses_dedicated_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nodes/ai-dialog/execute"))
            .and(body_partial_json(json!({"nodeType": "aiDialogNode", "nodeId": "n1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "output": "hello there", "duration": 12
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = runner_for(&server, 1_000)
            .run_node(request("aiDialogNode"))
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.output, json!("hello there"));
        assert_eq!(report.duration_ms, Some(12));
    }

    #[tokio::test]
    async fn test_backend_failure_is_a_report_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nodes/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false, "error": "syntax error"
            })))
            .mount(&server)
            .await;

        let report = runner_for(&server, 1_000)
            .run_node(request("codeNode"))
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("syntax error"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(500))
                    .set_body_json(json!({"success": true})),
            )
            .mount(&server)
            .await;

        let runner = runner_for(&server, 50);
        let err = runner.execute(&request("codeNode")).await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)));

        let err = runner.run_node(request("codeNode")).await.unwrap_err();
        assert!(matches!(err, FlowError::Execution(_)));
    }

    #[tokio::test]
    async fn test_drives_debug_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/nodes/execute"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "output": {"ok": true}
            })))
            .mount(&server)
            .await;

        let graph = FlowBuilder::new("flow", "Two steps")
            .add_node("start", "startNode", (0.0, 0.0))
            .add_node("end", "endNode", (200.0, 0.0))
            .chain(&["start", "end"])
            .build()
            .unwrap();
        let runner = runner_for(&server, 1_000);
        let mut session = DebugSession::from_graph(&graph, Arc::new(NullEventSink));

        let outcome = session.run_to_breakpoint(&graph, &runner).await.unwrap();
        assert!(matches!(outcome, StepOutcome::Finished(SessionState::Completed)));
        assert_eq!(session.output_of("end"), Some(&json!({"ok": true})));
    }
}
