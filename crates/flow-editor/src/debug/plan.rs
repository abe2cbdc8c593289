//! Execution plan for step-through debugging
//!
//! One step per node, in dependency order where the graph allows it. The
//! plan only tracks status and timing reported by the backend; it never
//! interprets node output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::graph::FlowGraph;
use crate::types::NodeId;

/// Status of one plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Waiting on dependencies
    Pending,
    /// All dependencies settled
    Ready,
    Running,
    /// Node asked the user for input
    WaitingInput,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Whether the step will not change again until the plan is reset
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }

    /// Whether downstream steps may proceed past this one
    pub fn unblocks_dependents(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }
}

/// One node's slot in the plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    pub node_id: NodeId,
    pub node_type: String,
    pub label: String,
    /// Nodes that feed this one
    pub dependencies: Vec<NodeId>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStep {
    fn clear_run_data(&mut self) {
        self.status = StepStatus::Pending;
        self.started_at = None;
        self.completed_at = None;
        self.duration_ms = None;
        self.output = None;
        self.markdown_output = None;
        self.error = None;
    }
}

/// Ordered steps for one run of a flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    steps: Vec<ExecutionStep>,
}

impl ExecutionPlan {
    /// Build a plan from the current graph
    ///
    /// Steps are ordered topologically, ties broken by graph order. Nodes on
    /// or behind a cycle can never become ready; they are appended in graph
    /// order.
    pub fn from_graph(graph: &FlowGraph) -> Self {
        let mut placed: Vec<&str> = Vec::with_capacity(graph.nodes().len());
        loop {
            let next = graph.nodes().iter().find(|node| {
                !placed.contains(&node.id.as_str())
                    && graph
                        .incoming_edges(&node.id)
                        .all(|e| placed.contains(&e.source.as_str()))
            });
            match next {
                Some(node) => placed.push(&node.id),
                None => break,
            }
        }
        for node in graph.nodes() {
            if !placed.contains(&node.id.as_str()) {
                placed.push(&node.id);
            }
        }

        let steps = placed
            .into_iter()
            .filter_map(|id| graph.node(id))
            .map(|node| ExecutionStep {
                node_id: node.id.clone(),
                node_type: node.kind.to_string(),
                label: node.label().unwrap_or(node.kind.as_str()).to_string(),
                dependencies: graph.dependencies(&node.id),
                status: StepStatus::Pending,
                started_at: None,
                completed_at: None,
                duration_ms: None,
                output: None,
                markdown_output: None,
                error: None,
            })
            .collect();

        let mut plan = Self { steps };
        plan.refresh_ready();
        plan
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn step(&self, node_id: &str) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.node_id == node_id)
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Promote pending steps whose dependencies have all settled
    ///
    /// Returns the IDs of steps that became ready.
    pub fn refresh_ready(&mut self) -> Vec<NodeId> {
        let mut promoted = Vec::new();
        for i in 0..self.steps.len() {
            if self.steps[i].status != StepStatus::Pending {
                continue;
            }
            let settled = self.steps[i].dependencies.iter().all(|dep| {
                self.step(dep)
                    .map(|s| s.status.unblocks_dependents())
                    .unwrap_or(true)
            });
            if settled {
                self.steps[i].status = StepStatus::Ready;
                promoted.push(self.steps[i].node_id.clone());
            }
        }
        promoted
    }

    /// The first ready step in plan order
    pub fn next_ready(&self) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.status == StepStatus::Ready)
    }

    pub fn mark_running(&mut self, node_id: &str) -> Result<()> {
        let step = self.transition(
            node_id,
            &[StepStatus::Ready, StepStatus::WaitingInput],
            StepStatus::Running,
        )?;
        if step.started_at.is_none() {
            step.started_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Park a running step until the user supplies input
    ///
    /// `DebugSession` never parks a step itself. This is for hosts that run
    /// interactive nodes outside the session; `mark_running` picks the step
    /// up again.
    pub fn mark_waiting_input(&mut self, node_id: &str) -> Result<()> {
        self.transition(node_id, &[StepStatus::Running], StepStatus::WaitingInput)?;
        Ok(())
    }

    /// Record a successful run
    ///
    /// When the backend reports no duration, it is taken from the step's
    /// own timestamps.
    pub fn mark_completed(
        &mut self,
        node_id: &str,
        output: serde_json::Value,
        markdown_output: Option<String>,
        duration_ms: Option<u64>,
    ) -> Result<()> {
        let step = self.transition(
            node_id,
            &[StepStatus::Running, StepStatus::WaitingInput],
            StepStatus::Completed,
        )?;
        let now = Utc::now();
        step.completed_at = Some(now);
        step.duration_ms = duration_ms.or_else(|| {
            step.started_at
                .map(|start| (now - start).num_milliseconds().max(0) as u64)
        });
        step.output = Some(output);
        step.markdown_output = markdown_output;
        step.error = None;
        self.refresh_ready();
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        node_id: &str,
        error: impl Into<String>,
        duration_ms: Option<u64>,
    ) -> Result<()> {
        let step = self.transition(
            node_id,
            &[
                StepStatus::Ready,
                StepStatus::Running,
                StepStatus::WaitingInput,
            ],
            StepStatus::Failed,
        )?;
        step.completed_at = Some(Utc::now());
        step.duration_ms = duration_ms;
        step.error = Some(error.into());
        Ok(())
    }

    /// Skip a step that has not started; its dependents may proceed
    pub fn mark_skipped(&mut self, node_id: &str) -> Result<()> {
        self.transition(
            node_id,
            &[StepStatus::Pending, StepStatus::Ready],
            StepStatus::Skipped,
        )?;
        self.refresh_ready();
        Ok(())
    }

    /// Return every step to pending, dropping recorded results
    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.clear_run_data();
        }
        self.refresh_ready();
    }

    /// Fraction of steps in a terminal state; an empty plan is complete
    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 1.0;
        }
        let done = self.steps.iter().filter(|s| s.status.is_terminal()).count();
        done as f64 / self.steps.len() as f64
    }

    pub fn is_finished(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_terminal())
    }

    pub fn has_failures(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }

    fn transition(
        &mut self,
        node_id: &str,
        from: &[StepStatus],
        to: StepStatus,
    ) -> Result<&mut ExecutionStep> {
        let step = self
            .steps
            .iter_mut()
            .find(|s| s.node_id == node_id)
            .ok_or_else(|| FlowError::node_not_found(node_id))?;
        if !from.contains(&step.status) {
            return Err(FlowError::invalid(format!(
                "step '{}' cannot move from {:?} to {:?}",
                node_id, step.status, to
            )));
        }
        log::debug!("Step '{}': {:?} -> {:?}", node_id, step.status, to);
        step.status = to;
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionPolicy;
    use crate::types::{ConnectionSpec, FlowNode, NodeKind, Position};
    use serde_json::json;

    /// start -> a -> end, start -> b -> end
    fn diamond() -> FlowGraph {
        let mut graph = FlowGraph::new("flow", "Diamond");
        for (id, kind) in [
            ("end", NodeKind::End),
            ("a", NodeKind::Code),
            ("b", NodeKind::Template),
            ("start", NodeKind::Start),
        ] {
            graph
                .add_node(FlowNode::new(id, kind, Position::default()))
                .unwrap();
        }
        for (s, t) in [("start", "a"), ("start", "b"), ("a", "end"), ("b", "end")] {
            graph.connect(ConnectionSpec::new(s, t)).unwrap();
        }
        graph
    }

    fn order(plan: &ExecutionPlan) -> Vec<&str> {
        plan.steps().iter().map(|s| s.node_id.as_str()).collect()
    }

    #[test]
    fn test_topological_order_with_graph_order_ties() {
        let plan = ExecutionPlan::from_graph(&diamond());
        assert_eq!(order(&plan), vec!["start", "a", "b", "end"]);
        assert_eq!(
            plan.step("end").unwrap().dependencies,
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(plan.step("end").unwrap().label, "endNode");
    }

    #[test]
    fn test_only_roots_start_ready() {
        let plan = ExecutionPlan::from_graph(&diamond());
        assert_eq!(plan.next_ready().unwrap().node_id, "start");
        assert_eq!(plan.step("a").unwrap().status, StepStatus::Pending);
    }

    #[test]
    fn test_completion_unblocks_dependents() {
        let mut plan = ExecutionPlan::from_graph(&diamond());
        plan.mark_running("start").unwrap();
        plan.mark_completed("start", json!({"ok": true}), None, Some(12))
            .unwrap();

        assert_eq!(plan.step("a").unwrap().status, StepStatus::Ready);
        assert_eq!(plan.step("b").unwrap().status, StepStatus::Ready);
        assert_eq!(plan.step("end").unwrap().status, StepStatus::Pending);
        assert_eq!(plan.step("start").unwrap().duration_ms, Some(12));
        assert_eq!(plan.progress(), 0.25);
    }

    #[test]
    fn test_skip_unblocks_and_failure_blocks() {
        let mut plan = ExecutionPlan::from_graph(&diamond());
        plan.mark_running("start").unwrap();
        plan.mark_completed("start", json!(null), None, None).unwrap();
        assert!(plan.step("start").unwrap().duration_ms.is_some());

        plan.mark_skipped("a").unwrap();
        plan.mark_running("b").unwrap();
        plan.mark_failed("b", "boom", Some(3)).unwrap();

        assert_eq!(plan.step("end").unwrap().status, StepStatus::Pending);
        assert!(plan.next_ready().is_none());
        assert!(plan.has_failures());
        assert!(!plan.is_finished());
    }

    #[test]
    fn test_illegal_transitions() {
        let mut plan = ExecutionPlan::from_graph(&diamond());
        assert!(plan.mark_running("end").is_err());
        assert!(plan
            .mark_completed("start", json!(null), None, None)
            .is_err());
        assert!(matches!(
            plan.mark_running("ghost"),
            Err(FlowError::NotFound { .. })
        ));
        plan.mark_running("start").unwrap();
        plan.mark_waiting_input("start").unwrap();
        plan.mark_running("start").unwrap();
        assert!(plan.mark_skipped("start").is_err());
    }

    #[test]
    fn test_reset_clears_results() {
        let mut plan = ExecutionPlan::from_graph(&diamond());
        plan.mark_running("start").unwrap();
        plan.mark_completed("start", json!("x"), Some("**x**".into()), None)
            .unwrap();

        plan.reset();
        let start = plan.step("start").unwrap();
        assert_eq!(start.status, StepStatus::Ready);
        assert!(start.output.is_none());
        assert!(start.markdown_output.is_none());
        assert_eq!(plan.progress(), 0.0);
    }

    #[test]
    fn test_cycle_nodes_appended_and_never_ready() {
        let mut graph = FlowGraph::new("flow", "Cycle").with_policy(ConnectionPolicy {
            allow_self_loops: true,
            allow_duplicate_edges: false,
        });
        for id in ["x", "root", "y"] {
            graph
                .add_node(FlowNode::new(id, NodeKind::Code, Position::default()))
                .unwrap();
        }
        graph.connect(ConnectionSpec::new("x", "y")).unwrap();
        graph.connect(ConnectionSpec::new("y", "x")).unwrap();

        let plan = ExecutionPlan::from_graph(&graph);
        assert_eq!(order(&plan), vec!["root", "x", "y"]);
        assert_eq!(plan.next_ready().unwrap().node_id, "root");
        assert_eq!(plan.step("x").unwrap().status, StepStatus::Pending);
    }

    #[test]
    fn test_empty_plan_is_finished() {
        let plan = ExecutionPlan::from_graph(&FlowGraph::new("flow", "Empty"));
        assert!(plan.is_empty());
        assert!(plan.is_finished());
        assert_eq!(plan.progress(), 1.0);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_value(StepStatus::WaitingInput).unwrap(),
            json!("waiting_input")
        );
    }
}
