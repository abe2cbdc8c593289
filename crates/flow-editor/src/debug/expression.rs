//! Expression evaluation for breakpoint conditions and watches
//!
//! Expressions use `evalexpr` syntax against a JSON context. Nested values
//! are flattened into dotted identifiers (`output.items.0.name`), and arrays
//! and strings also expose `<path>.length`. An expression that is just a
//! path resolves straight to the JSON value, so objects can be watched too.

use evalexpr::{ContextWithMutableVariables, HashMapContext, Value as ExprValue};
use serde_json::{Map, Value};

use crate::constants::expressions::MAX_CONTEXT_DEPTH;
use crate::error::{FlowError, Result};

/// Run-time data an expression is evaluated against
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionContext {
    root: Map<String, Value>,
}

impl ExpressionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level entry
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.root.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.root.get(key)
    }

    /// Look up a dotted path; numeric segments index arrays
    pub fn resolve_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    fn to_evalexpr(&self) -> Result<HashMapContext> {
        let mut context = HashMapContext::new();
        for (key, value) in &self.root {
            flatten_into(&mut context, key, value, 0)?;
        }
        Ok(context)
    }
}

impl From<Map<String, Value>> for ExpressionContext {
    fn from(root: Map<String, Value>) -> Self {
        Self { root }
    }
}

/// Evaluate an expression to a JSON value
pub fn evaluate(expression: &str, context: &ExpressionContext) -> Result<Value> {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(FlowError::expression(expression, "expression is empty"));
    }

    if is_path(expression) {
        if let Some(value) = context.resolve_path(expression) {
            return Ok(value.clone());
        }
    }

    let evalexpr_context = context.to_evalexpr()?;
    let value = evalexpr::eval_with_context(expression, &evalexpr_context)
        .map_err(|e| FlowError::expression(expression, e.to_string()))?;
    Ok(to_json(value))
}

/// Evaluate an expression and reduce it to a boolean
pub fn evaluate_condition(expression: &str, context: &ExpressionContext) -> Result<bool> {
    evaluate(expression, context).map(|value| is_truthy(&value))
}

/// Truthiness used for breakpoint conditions
///
/// `null`, `false`, `0`, `""`, `[]` and `{}` are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Short type name shown next to a watched value
pub fn type_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_path(expression: &str) -> bool {
    let starts_ok = expression
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false);
    starts_ok
        && expression
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && expression != "true"
        && expression != "false"
}

fn is_identifier_segment(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn set(context: &mut HashMapContext, identifier: String, value: ExprValue) -> Result<()> {
    context
        .set_value(identifier.clone(), value)
        .map_err(|e| FlowError::expression(identifier, e.to_string()))
}

fn flatten_into(
    context: &mut HashMapContext,
    path: &str,
    value: &Value,
    depth: usize,
) -> Result<()> {
    if depth > MAX_CONTEXT_DEPTH {
        return Ok(());
    }

    match value {
        Value::Null => set(context, path.to_string(), ExprValue::Empty)?,
        Value::Bool(b) => set(context, path.to_string(), ExprValue::Boolean(*b))?,
        Value::Number(n) => {
            let converted = match n.as_i64() {
                Some(i) => ExprValue::Int(i),
                None => ExprValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            };
            set(context, path.to_string(), converted)?;
        }
        Value::String(s) => {
            set(context, path.to_string(), ExprValue::String(s.clone()))?;
            let length = ExprValue::Int(s.chars().count() as i64);
            set(context, format!("{}.length", path), length)?;
        }
        Value::Array(items) => {
            let length = ExprValue::Int(items.len() as i64);
            set(context, format!("{}.length", path), length)?;
            for (index, item) in items.iter().enumerate() {
                flatten_into(context, &format!("{}.{}", path, index), item, depth + 1)?;
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                if !is_identifier_segment(key) {
                    log::debug!(
                        "Skipping key '{}' under '{}' in expression context",
                        key,
                        path
                    );
                    continue;
                }
                flatten_into(context, &format!("{}.{}", path, key), item, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn to_json(value: ExprValue) -> Value {
    match value {
        ExprValue::String(s) => Value::String(s),
        ExprValue::Int(i) => Value::from(i),
        ExprValue::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ExprValue::Boolean(b) => Value::Bool(b),
        ExprValue::Tuple(items) => Value::Array(items.into_iter().map(to_json).collect()),
        _ => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ExpressionContext {
        ExpressionContext::new()
            .with("input", json!({ "query": "weather", "retries": 2 }))
            .with(
                "output",
                json!({ "items": [{ "name": "a" }, { "name": "b" }], "score": 0.75 }),
            )
            .with("variables", json!({ "city": "Oslo" }))
    }

    #[test]
    fn test_bare_path_returns_json() {
        let ctx = context();
        assert_eq!(evaluate("input.query", &ctx).unwrap(), json!("weather"));
        assert_eq!(evaluate("output.items.1.name", &ctx).unwrap(), json!("b"));
        assert_eq!(
            evaluate("variables", &ctx).unwrap(),
            json!({ "city": "Oslo" })
        );
    }

    #[test]
    fn test_comparisons_and_length() {
        let ctx = context();
        assert_eq!(evaluate("output.items.length", &ctx).unwrap(), json!(2));
        assert!(evaluate_condition("output.items.length > 1", &ctx).unwrap());
        assert!(evaluate_condition("output.score >= 0.5 && input.retries < 3", &ctx).unwrap());
        assert!(evaluate_condition("variables.city == \"Oslo\"", &ctx).unwrap());
        assert!(!evaluate_condition("input.query.length > 10", &ctx).unwrap());
    }

    #[test]
    fn test_arithmetic_result() {
        let ctx = context();
        assert_eq!(evaluate("input.retries * 2 + 1", &ctx).unwrap(), json!(5));
    }

    #[test]
    fn test_failures_are_errors() {
        let ctx = context();
        assert!(matches!(
            evaluate("output.missing > 1", &ctx),
            Err(FlowError::ExpressionEvaluation { .. })
        ));
        assert!(evaluate("(1 +", &ctx).is_err());
        assert!(evaluate("   ", &ctx).is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!([])));
        assert!(is_truthy(&json!(0.1)));
        assert!(is_truthy(&json!({ "a": 1 })));
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(type_tag(&json!(1)), "number");
        assert_eq!(type_tag(&json!([1])), "array");
        assert_eq!(type_tag(&json!(null)), "null");
    }
}
