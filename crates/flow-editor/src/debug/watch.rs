//! Watched expressions
//!
//! A failed refresh keeps the last good value and records the error, so the
//! view can show a stale value next to the message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::expression::{self, ExpressionContext};
use crate::error::{FlowError, Result};
use crate::types::NodeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchVariable {
    pub id: String,
    pub expression: String,
    pub value: Value,
    /// Type name of `value`
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Only refreshed while this node is current
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WatchVariable {
    fn applies_to(&self, current_node: Option<&str>) -> bool {
        match &self.node_id {
            None => true,
            Some(node) => current_node == Some(node.as_str()),
        }
    }

    fn refresh(&mut self, context: &ExpressionContext) {
        match expression::evaluate(&self.expression, context) {
            Ok(value) => {
                self.value_type = expression::type_tag(&value).to_string();
                self.value = value;
                self.error = None;
            }
            Err(e) => {
                log::warn!("Watch '{}' failed: {}", self.expression, e);
                self.error = Some(e.to_string());
            }
        }
        self.last_updated = Some(Utc::now());
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchList {
    watches: Vec<WatchVariable>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watch an expression, optionally scoped to one node
    pub fn add(&mut self, expression: &str, node_id: Option<NodeId>) -> Result<String> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(FlowError::invalid("watch expression is empty"));
        }
        let id = format!("watch-{}", uuid::Uuid::new_v4());
        self.watches.push(WatchVariable {
            id: id.clone(),
            expression: trimmed.to_string(),
            value: Value::Null,
            value_type: expression::type_tag(&Value::Null).to_string(),
            last_updated: None,
            node_id,
            error: None,
        });
        Ok(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.watches.len();
        self.watches.retain(|w| w.id != id);
        self.watches.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&WatchVariable> {
        self.watches.iter().find(|w| w.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchVariable> {
        self.watches.iter()
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }

    pub fn clear(&mut self) {
        self.watches.clear();
    }

    /// Re-evaluate one watch on demand
    ///
    /// Evaluation failures are stored on the watch, not returned.
    pub fn refresh(&mut self, id: &str, context: &ExpressionContext) -> Result<&WatchVariable> {
        let watch = self
            .watches
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or_else(|| FlowError::NotFound {
                kind: "Watch",
                id: id.to_string(),
            })?;
        watch.refresh(context);
        Ok(watch)
    }

    /// Re-evaluate every watch that applies while `current_node` is current
    ///
    /// Returns how many watches were refreshed.
    pub fn refresh_all(
        &mut self,
        context: &ExpressionContext,
        current_node: Option<&str>,
    ) -> usize {
        let mut refreshed = 0;
        for watch in self
            .watches
            .iter_mut()
            .filter(|w| w.applies_to(current_node))
        {
            watch.refresh(context);
            refreshed += 1;
        }
        refreshed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(output: Value) -> ExpressionContext {
        ExpressionContext::new()
            .with("output", output)
            .with("variables", json!({ "count": 4 }))
    }

    #[test]
    fn test_refresh_sets_value_and_type() {
        let mut watches = WatchList::new();
        let id = watches.add("variables.count * 2", None).unwrap();

        let watch = watches.refresh(&id, &ctx(json!(null))).unwrap();
        assert_eq!(watch.value, json!(8));
        assert_eq!(watch.value_type, "number");
        assert!(watch.last_updated.is_some());
        assert!(watch.error.is_none());
    }

    #[test]
    fn test_failure_keeps_last_value() {
        let mut watches = WatchList::new();
        let id = watches.add("output.text", None).unwrap();

        watches.refresh(&id, &ctx(json!({ "text": "hello" }))).unwrap();
        let watch = watches.refresh(&id, &ctx(json!(42))).unwrap();

        assert_eq!(watch.value, json!("hello"));
        assert_eq!(watch.value_type, "string");
        assert!(watch.error.is_some());

        // A later success clears the error
        let watch = watches.refresh(&id, &ctx(json!({ "text": "again" }))).unwrap();
        assert_eq!(watch.value, json!("again"));
        assert!(watch.error.is_none());
    }

    #[test]
    fn test_refresh_all_respects_node_scope() {
        let mut watches = WatchList::new();
        let global = watches.add("variables.count", None).unwrap();
        let scoped = watches
            .add("output", Some("n2".to_string()))
            .unwrap();

        assert_eq!(watches.refresh_all(&ctx(json!("first")), Some("n1")), 1);
        assert_eq!(watches.get(&global).unwrap().value, json!(4));
        assert!(watches.get(&scoped).unwrap().last_updated.is_none());

        assert_eq!(watches.refresh_all(&ctx(json!("second")), Some("n2")), 2);
        assert_eq!(watches.get(&scoped).unwrap().value, json!("second"));
    }

    #[test]
    fn test_add_remove_and_unknown_id() {
        let mut watches = WatchList::new();
        assert!(watches.add("  ", None).is_err());

        let id = watches.add("output", None).unwrap();
        assert_eq!(watches.len(), 1);
        assert!(watches.remove(&id));
        assert!(watches.is_empty());
        assert!(matches!(
            watches.refresh(&id, &ExpressionContext::new()),
            Err(FlowError::NotFound { kind: "Watch", .. })
        ));
    }

    #[test]
    fn test_wire_format_uses_type_key() {
        let mut watches = WatchList::new();
        let id = watches.add("output", Some("n1".to_string())).unwrap();
        let json = serde_json::to_value(watches.get(&id).unwrap()).unwrap();
        assert_eq!(json["type"], "null");
        assert_eq!(json["nodeId"], "n1");
        assert!(json.get("error").is_none());
    }
}
