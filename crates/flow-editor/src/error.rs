//! Error types for the flow editor

use thiserror::Error;

/// Result type alias using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;

/// Errors that can occur while editing or debugging a flow
#[derive(Debug, Error)]
pub enum FlowError {
    /// An operation referenced an id absent from the graph
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Id collision on creation
    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    /// Malformed edge, self-loop, invalid property value or illegal transition
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A breakpoint condition or watch expression failed to evaluate
    #[error("Expression '{expression}' failed: {message}")]
    ExpressionEvaluation { expression: String, message: String },

    /// Externally executed node failed to report back
    #[error("Node execution failed: {0}")]
    Execution(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),
}

impl FlowError {
    /// Node id absent from the graph
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Node",
            id: id.into(),
        }
    }

    /// Edge id absent from the graph
    pub fn edge_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "Edge",
            id: id.into(),
        }
    }

    /// Create a validation error with a message
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an expression evaluation error
    pub fn expression(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExpressionEvaluation {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_and_id() {
        let err = FlowError::node_not_found("n1");
        assert_eq!(err.to_string(), "Node not found: n1");

        let err = FlowError::DuplicateId {
            kind: "Edge",
            id: "e1".to_string(),
        };
        assert_eq!(err.to_string(), "Duplicate Edge id: e1");
    }
}
