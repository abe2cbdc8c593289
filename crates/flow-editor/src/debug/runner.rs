//! Seam to the backend that actually executes nodes

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ConfigMap, NodeId};

/// Everything the backend needs to run one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRunRequest {
    pub node_type: String,
    pub node_id: NodeId,
    pub node_data: ConfigMap,
    /// Output of the upstream node(s), or the flow input for a root
    pub input: serde_json::Value,
    /// Session variables and the outputs of nodes already run
    pub context: serde_json::Value,
}

/// What the backend reported for one node run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeRunReport {
    pub success: bool,
    pub output: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds
    #[serde(rename = "duration", skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl NodeRunReport {
    pub fn succeeded(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Executes single nodes on behalf of a debug session
///
/// A returned `Err` means the node could not be run at all (network,
/// timeout); a node that ran and failed comes back as a report with
/// `success == false`.
#[async_trait]
pub trait NodeRunner: Send + Sync {
    async fn run_node(&self, request: NodeRunRequest) -> Result<NodeRunReport>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_reads_backend_shape() {
        let report: NodeRunReport = serde_json::from_value(json!({
            "success": true,
            "output": {"text": "hi"},
            "markdownOutput": "**hi**",
            "duration": 42
        }))
        .unwrap();
        assert!(report.success);
        assert_eq!(report.duration_ms, Some(42));
        assert_eq!(report.markdown_output.as_deref(), Some("**hi**"));
        assert!(report.error.is_none());
    }

    #[test]
    fn test_request_wire_names() {
        let request = NodeRunRequest {
            node_type: "codeNode".into(),
            node_id: "n1".into(),
            node_data: ConfigMap::new(),
            input: json!(null),
            context: json!({}),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["nodeType"], "codeNode");
        assert_eq!(json["nodeData"], json!({}));
    }
}
