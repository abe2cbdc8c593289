//! Breakpoints attached to nodes
//!
//! A breakpoint hits when execution reaches its node and the condition is
//! absent or truthy. A condition that fails to evaluate never aborts the run:
//! it is reported in the check result and treated as not matching.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::expression::{self, ExpressionContext};
use crate::error::{FlowError, Result};
use crate::graph::FlowGraph;
use crate::types::NodeId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    pub id: String,
    pub node_id: NodeId,
    /// Expression that must be truthy for the breakpoint to hit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub enabled: bool,
    pub hit_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A condition that could not be evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionFailure {
    pub breakpoint_id: String,
    pub message: String,
}

/// Outcome of reaching a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BreakpointCheck {
    /// Breakpoints that hit, with their updated hit counts
    pub hits: Vec<Breakpoint>,
    pub errors: Vec<ConditionFailure>,
}

impl BreakpointCheck {
    pub fn should_pause(&self) -> bool {
        !self.hits.is_empty()
    }
}

/// All breakpoints of a debug session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakpointSet {
    breakpoints: Vec<Breakpoint>,
}

fn normalize(condition: Option<String>) -> Option<String> {
    condition
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

fn not_found(id: &str) -> FlowError {
    FlowError::NotFound {
        kind: "Breakpoint",
        id: id.to_string(),
    }
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a breakpoint to a node of `graph`
    ///
    /// A blank condition is stored as no condition.
    pub fn add(
        &mut self,
        graph: &FlowGraph,
        node_id: &str,
        condition: Option<String>,
    ) -> Result<String> {
        if !graph.contains_node(node_id) {
            return Err(FlowError::node_not_found(node_id));
        }
        let breakpoint = Breakpoint {
            id: format!("bp-{}", uuid::Uuid::new_v4()),
            node_id: node_id.to_string(),
            condition: normalize(condition),
            enabled: true,
            hit_count: 0,
            created_at: Utc::now(),
        };
        let id = breakpoint.id.clone();
        log::debug!("Breakpoint '{}' on node '{}'", id, node_id);
        self.breakpoints.push(breakpoint);
        Ok(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|b| b.id != id);
        self.breakpoints.len() != before
    }

    /// Remove every breakpoint on a node (e.g. after the node is deleted)
    pub fn remove_for_node(&mut self, node_id: &str) -> usize {
        let before = self.breakpoints.len();
        self.breakpoints.retain(|b| b.node_id != node_id);
        before - self.breakpoints.len()
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        self.get_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Flip a breakpoint on or off, returning the new state
    pub fn toggle(&mut self, id: &str) -> Result<bool> {
        let breakpoint = self.get_mut(id)?;
        breakpoint.enabled = !breakpoint.enabled;
        Ok(breakpoint.enabled)
    }

    pub fn set_condition(&mut self, id: &str, condition: Option<String>) -> Result<()> {
        self.get_mut(id)?.condition = normalize(condition);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.breakpoints.clear();
    }

    pub fn reset_hits(&mut self) {
        for breakpoint in &mut self.breakpoints {
            breakpoint.hit_count = 0;
        }
    }

    pub fn get(&self, id: &str) -> Option<&Breakpoint> {
        self.breakpoints.iter().find(|b| b.id == id)
    }

    pub fn for_node(&self, node_id: &str) -> Vec<&Breakpoint> {
        self.breakpoints
            .iter()
            .filter(|b| b.node_id == node_id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Evaluate the enabled breakpoints of a node that execution reached
    pub fn check(&mut self, node_id: &str, context: &ExpressionContext) -> BreakpointCheck {
        let mut result = BreakpointCheck::default();

        for breakpoint in self
            .breakpoints
            .iter_mut()
            .filter(|b| b.enabled && b.node_id == node_id)
        {
            let matched = match &breakpoint.condition {
                None => true,
                Some(condition) => match expression::evaluate_condition(condition, context) {
                    Ok(matched) => matched,
                    Err(e) => {
                        log::warn!(
                            "Breakpoint '{}' condition failed, not pausing: {}",
                            breakpoint.id,
                            e
                        );
                        result.errors.push(ConditionFailure {
                            breakpoint_id: breakpoint.id.clone(),
                            message: e.to_string(),
                        });
                        false
                    }
                },
            };

            if matched {
                breakpoint.hit_count += 1;
                result.hits.push(breakpoint.clone());
            }
        }

        result
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Breakpoint> {
        self.breakpoints
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| not_found(id))
    }
}
