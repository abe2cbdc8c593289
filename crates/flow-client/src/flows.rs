//! Flow persistence and execution over the backend REST API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flow_editor::{FlowEdge, FlowEditor, FlowGraph, FlowNode, GraphSnapshot};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::constants::{defaults, endpoints};
use crate::error::Result;
use crate::http::{endpoint_path, ApiClient};

/// One row of the flow list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A stored flow with its graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl FlowRecord {
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::new(self.nodes.clone(), self.edges.clone())
    }
}

/// Body of a create or update call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<FlowNode>,
    pub edges: Vec<FlowEdge>,
}

impl FlowDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Capture the current state of a graph
    pub fn from_graph(graph: &FlowGraph) -> Self {
        let snapshot = graph.snapshot();
        Self {
            name: graph.name.clone(),
            description: None,
            nodes: snapshot.nodes,
            edges: snapshot.edges,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Paging and search for the flow list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowQuery {
    /// 1-based
    pub page: u32,
    pub page_size: u32,
    pub keyword: Option<String>,
}

impl Default for FlowQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: defaults::PAGE_SIZE,
            keyword: None,
        }
    }
}

impl FlowQuery {
    pub fn search(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
    }

    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.max(1).to_string()),
            ("pageSize", self.page_size.max(1).to_string()),
        ];
        if let Some(keyword) = self.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            pairs.push(("keyword", keyword.trim().to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPage {
    pub items: Vec<FlowSummary>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub page_size: u32,
}

/// What the backend reports after running a whole flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowRunResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub output: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Persistence and execution provider for flows
#[async_trait]
pub trait FlowApi: Send + Sync {
    async fn list_flows(&self, query: &FlowQuery) -> Result<FlowPage>;

    async fn get_flow(&self, id: &str) -> Result<FlowRecord>;

    async fn create_flow(&self, draft: &FlowDraft) -> Result<FlowRecord>;

    async fn update_flow(&self, id: &str, draft: &FlowDraft) -> Result<FlowRecord>;

    /// Deleting an id the backend no longer has is reported as an `Api` error
    async fn delete_flow(&self, id: &str) -> Result<()>;

    /// Server-side duplicate; returns the new record
    async fn copy_flow(&self, id: &str) -> Result<FlowRecord>;

    async fn run_flow(&self, id: &str, input: serde_json::Value) -> Result<FlowRunResult>;
}

/// [`FlowApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpFlowApi {
    client: ApiClient,
}

impl HttpFlowApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn flow_path(id: &str, action: Option<&str>) -> Result<String> {
        match action {
            Some(action) => endpoint_path(endpoints::FLOWS, &[id, action]),
            None => endpoint_path(endpoints::FLOWS, &[id]),
        }
    }
}

#[async_trait]
impl FlowApi for HttpFlowApi {
    async fn list_flows(&self, query: &FlowQuery) -> Result<FlowPage> {
        self.client.get(endpoints::FLOWS, &query.to_pairs()).await
    }

    async fn get_flow(&self, id: &str) -> Result<FlowRecord> {
        self.client.get(&Self::flow_path(id, None)?, &[]).await
    }

    async fn create_flow(&self, draft: &FlowDraft) -> Result<FlowRecord> {
        let record: FlowRecord = self
            .client
            .send_json(Method::POST, endpoints::FLOWS, draft)
            .await?;
        log::info!("Created flow {} ({})", record.id, record.name);
        Ok(record)
    }

    async fn update_flow(&self, id: &str, draft: &FlowDraft) -> Result<FlowRecord> {
        self.client
            .send_json(Method::PUT, &Self::flow_path(id, None)?, draft)
            .await
    }

    async fn delete_flow(&self, id: &str) -> Result<()> {
        self.client
            .send_unit(Method::DELETE, &Self::flow_path(id, None)?)
            .await?;
        log::info!("Deleted flow {}", id);
        Ok(())
    }

    async fn copy_flow(&self, id: &str) -> Result<FlowRecord> {
        let path = Self::flow_path(id, Some("copy"))?;
        self.client
            .send_json(Method::POST, &path, &serde_json::json!({}))
            .await
    }

    async fn run_flow(&self, id: &str, input: serde_json::Value) -> Result<FlowRunResult> {
        let path = Self::flow_path(id, Some("run"))?;
        let body = serde_json::json!({ "input": input });
        self.client.send_json(Method::POST, &path, &body).await
    }
}

/// Fetch a flow and load it into the editor, resetting its history
///
/// The editor is untouched when the fetch or the graph checks fail.
pub async fn open_flow(api: &dyn FlowApi, id: &str, editor: &mut FlowEditor) -> Result<FlowRecord> {
    let record = api.get_flow(id).await?;
    editor.load_graph(record.id.clone(), record.name.clone(), record.snapshot())?;
    Ok(record)
}

/// Persist the editor's current graph under its own id
pub async fn save_flow(api: &dyn FlowApi, editor: &FlowEditor) -> Result<FlowRecord> {
    let graph = editor.graph();
    let draft = FlowDraft::from_graph(graph);
    let record = api.update_flow(&graph.id, &draft).await?;
    log::debug!(
        "Saved flow {} ({} nodes, {} edges)",
        record.id,
        draft.nodes.len(),
        draft.edges.len()
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::ClientError;
    use flow_editor::{EditorConfig, NodeKind, NullEventSink, Position};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> HttpFlowApi {
        let _ = env_logger::builder().is_test(true).try_init();
        HttpFlowApi::new(ApiClient::new(ClientConfig::new(server.uri())).unwrap())
    }

    fn ok(data: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "statusCode": 200, "message": "ok", "data": data
        }))
    }

    fn stored_flow() -> serde_json::Value {
        json!({
            "id": "flow-1",
            "name": "Greeting",
            "nodes": [
                {"id": "start", "type": "startNode", "position": {"x": 0.0, "y": 0.0}, "data": {}},
                {"id": "end", "type": "endNode", "position": {"x": 300.0, "y": 0.0}, "data": {}}
            ],
            "edges": [{"id": "e1", "source": "start", "target": "end"}],
            "updatedAt": "2024-05-01T10:00:00Z"
        })
    }

    fn editor() -> FlowEditor {
        FlowEditor::new(EditorConfig::default(), Arc::new(NullEventSink)).unwrap()
    }

    #[tokio::test]
    async fn test_list_flows_sends_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/flows"))
            .and(query_param("page", "2"))
            .and(query_param("keyword", "greet"))
            .respond_with(ok(json!({
                "items": [{"id": "flow-1", "name": "Greeting"}],
                "total": 21, "page": 2, "pageSize": 20
            })))
            .mount(&server)
            .await;

        let query = FlowQuery {
            page: 2,
            ..FlowQuery::search(" greet ")
        };
        let page = api_for(&server).list_flows(&query).await.unwrap();
        assert_eq!(page.total, 21);
        assert_eq!(page.items[0].name, "Greeting");
    }

    #[tokio::test]
    async fn test_open_flow_loads_editor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/flows/flow-1"))
            .respond_with(ok(stored_flow()))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let mut editor = editor();
        let record = open_flow(&api, "flow-1", &mut editor).await.unwrap();

        assert!(record.updated_at.is_some());
        assert_eq!(editor.graph().id, "flow-1");
        assert_eq!(editor.graph().nodes().len(), 2);
        assert_eq!(editor.graph().edges().len(), 1);
        assert!(!editor.can_undo());
    }

    #[tokio::test]
    async fn test_open_flow_failure_leaves_editor_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let mut editor = editor();
        editor
            .create_node(NodeKind::Start, Position::new(0.0, 0.0), None)
            .unwrap();

        let err = open_flow(&api, "flow-1", &mut editor).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(editor.graph().nodes().len(), 1);
        assert!(editor.can_undo());
    }

    #[tokio::test]
    async fn test_open_flow_with_dangling_edge_is_editor_error() {
        let server = MockServer::start().await;
        let mut broken = stored_flow();
        broken["edges"] = json!([{"id": "e1", "source": "start", "target": "ghost"}]);
        Mock::given(method("GET"))
            .respond_with(ok(broken))
            .mount(&server)
            .await;

        let mut editor = editor();
        let err = open_flow(&api_for(&server), "flow-1", &mut editor)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Editor(_)));
        assert!(editor.graph().is_empty());
    }

    #[tokio::test]
    async fn test_save_flow_puts_current_graph() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/flows/flow-1"))
            .respond_with(ok(stored_flow()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/flows/flow-1"))
            .and(body_partial_json(json!({"name": "Greeting"})))
            .respond_with(ok(stored_flow()))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let mut editor = editor();
        open_flow(&api, "flow-1", &mut editor).await.unwrap();
        let record = save_flow(&api, &editor).await.unwrap();
        assert_eq!(record.id, "flow-1");
    }

    #[tokio::test]
    async fn test_copy_delete_and_run() {
        let server = MockServer::start().await;
        let mut copy = stored_flow();
        copy["id"] = json!("flow-2");
        Mock::given(method("POST"))
            .and(path("/api/flows/flow-1/copy"))
            .respond_with(ok(copy))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/flows/flow-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "statusCode": 200, "message": "deleted"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/flows/flow-1/run"))
            .and(body_partial_json(json!({"input": {"question": "hi"}})))
            .respond_with(ok(json!({
                "runId": "r1", "status": "completed", "output": {"text": "hello"}
            })))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let copied = api.copy_flow("flow-1").await.unwrap();
        assert_eq!(copied.id, "flow-2");
        api.delete_flow("flow-2").await.unwrap();

        let run = api
            .run_flow("flow-1", json!({"question": "hi"}))
            .await
            .unwrap();
        assert_eq!(run.status, "completed");
        assert_eq!(run.output["text"], "hello");
    }

    #[tokio::test]
    async fn test_envelope_failure_on_create() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/flows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false, "statusCode": 409, "message": "name taken"
            })))
            .mount(&server)
            .await;

        let err = api_for(&server)
            .create_flow(&FlowDraft::new("Greeting"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status_code: 409, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_ids_with_reserved_characters_stay_one_segment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/flows/team%2Fa%3Fb/run"))
            .respond_with(ok(json!({"status": "completed"})))
            .expect(1)
            .mount(&server)
            .await;

        let run = api_for(&server)
            .run_flow("team/a?b", json!(null))
            .await
            .unwrap();
        assert_eq!(run.status, "completed");
    }
}
