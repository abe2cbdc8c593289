//! Step-through debug session
//!
//! A `DebugSession` drives one run of a flow through a [`NodeRunner`], one
//! ready step at a time. After each node completes, watches are refreshed
//! and the node's breakpoints are checked against its input and output; a
//! hit pauses the session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::breakpoints::BreakpointSet;
use super::expression::ExpressionContext;
use super::plan::{ExecutionPlan, StepStatus};
use super::runner::{NodeRunRequest, NodeRunner};
use super::watch::WatchList;
use crate::error::{FlowError, Result};
use crate::events::{EditorEvent, EventSink};
use crate::graph::FlowGraph;
use crate::types::NodeId;

/// Run state of a debug session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// What a call to [`DebugSession::step`] did
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The node ran and no breakpoint hit
    Executed { node_id: NodeId },
    /// The node ran and one or more breakpoints hit
    Paused {
        node_id: NodeId,
        breakpoint_ids: Vec<String>,
    },
    /// The node could not be run or reported failure
    Failed { node_id: NodeId, error: String },
    /// Nothing left to run; carries the final state
    Finished(SessionState),
}

pub struct DebugSession {
    plan: ExecutionPlan,
    breakpoints: BreakpointSet,
    watches: WatchList,
    state: SessionState,
    /// Flow input handed to root nodes
    input: Value,
    variables: Map<String, Value>,
    /// Outputs of nodes already run, by node ID
    outputs: Map<String, Value>,
    events: Arc<dyn EventSink>,
}

impl DebugSession {
    pub fn new(plan: ExecutionPlan, events: Arc<dyn EventSink>) -> Self {
        Self {
            plan,
            breakpoints: BreakpointSet::new(),
            watches: WatchList::new(),
            state: SessionState::Idle,
            input: Value::Null,
            variables: Map::new(),
            outputs: Map::new(),
            events,
        }
    }

    pub fn from_graph(graph: &FlowGraph, events: Arc<dyn EventSink>) -> Self {
        Self::new(ExecutionPlan::from_graph(graph), events)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    pub fn breakpoints_mut(&mut self) -> &mut BreakpointSet {
        &mut self.breakpoints
    }

    pub fn watches(&self) -> &WatchList {
        &self.watches
    }

    pub fn watches_mut(&mut self) -> &mut WatchList {
        &mut self.watches
    }

    /// Set the input handed to nodes without upstream connections
    pub fn set_input(&mut self, input: Value) {
        self.input = input;
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn output_of(&self, node_id: &str) -> Option<&Value> {
        self.outputs.get(node_id)
    }

    /// Evaluation context as seen from `node_id`
    ///
    /// `input` is the single upstream output, an object of upstream outputs
    /// keyed by node ID when there are several, or the flow input for a
    /// root. `output` is the node's own output once it has run.
    pub fn context_for(&self, node_id: &str) -> ExpressionContext {
        ExpressionContext::new()
            .with("input", self.input_for(node_id))
            .with(
                "output",
                self.outputs.get(node_id).cloned().unwrap_or(Value::Null),
            )
            .with("variables", Value::Object(self.variables.clone()))
            .with("nodes", Value::Object(self.outputs.clone()))
    }

    /// Re-evaluate watches against the most recently completed node
    pub fn refresh_watches(&mut self) -> usize {
        let current = self
            .plan
            .steps()
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .max_by_key(|s| s.completed_at)
            .map(|s| s.node_id.clone());
        let context = match &current {
            Some(node_id) => self.context_for(node_id),
            None => ExpressionContext::new()
                .with("input", self.input.clone())
                .with("variables", Value::Object(self.variables.clone())),
        };
        self.watches.refresh_all(&context, current.as_deref())
    }

    /// Run the next ready node
    pub async fn step(
        &mut self,
        graph: &FlowGraph,
        runner: &dyn NodeRunner,
    ) -> Result<StepOutcome> {
        let outcome = self.run_next(graph, runner).await?;
        if let StepOutcome::Executed { .. } = outcome {
            let next = if self.plan.is_finished() {
                SessionState::Completed
            } else {
                SessionState::Paused
            };
            self.set_state(next);
        }
        Ok(outcome)
    }

    /// Run until a breakpoint hits, a node fails or the plan is finished
    pub async fn run_to_breakpoint(
        &mut self,
        graph: &FlowGraph,
        runner: &dyn NodeRunner,
    ) -> Result<StepOutcome> {
        loop {
            match self.run_next(graph, runner).await? {
                StepOutcome::Executed { .. } => continue,
                outcome => return Ok(outcome),
            }
        }
    }

    /// Continue a paused session
    pub async fn resume(
        &mut self,
        graph: &FlowGraph,
        runner: &dyn NodeRunner,
    ) -> Result<StepOutcome> {
        if self.state != SessionState::Paused {
            return Err(FlowError::invalid(format!(
                "cannot resume a session that is {:?}",
                self.state
            )));
        }
        self.run_to_breakpoint(graph, runner).await
    }

    /// Discard run results, keeping breakpoints, watches and variables
    pub fn reset(&mut self) {
        self.plan.reset();
        self.outputs.clear();
        self.set_state(SessionState::Idle);
    }

    /// Replace the plan after the graph changed, then reset
    pub fn rebuild(&mut self, graph: &FlowGraph) {
        self.plan = ExecutionPlan::from_graph(graph);
        let known: Vec<NodeId> = self
            .plan
            .steps()
            .iter()
            .map(|s| s.node_id.clone())
            .collect();
        let stale: Vec<NodeId> = self
            .breakpoints
            .iter()
            .filter(|b| !known.contains(&b.node_id))
            .map(|b| b.node_id.clone())
            .collect();
        for node_id in stale {
            self.breakpoints.remove_for_node(&node_id);
        }
        self.reset();
    }

    async fn run_next(
        &mut self,
        graph: &FlowGraph,
        runner: &dyn NodeRunner,
    ) -> Result<StepOutcome> {
        if self.state.is_terminal() {
            return Ok(StepOutcome::Finished(self.state));
        }

        self.plan.refresh_ready();
        let Some(node_id) = self.plan.next_ready().map(|s| s.node_id.clone()) else {
            return Ok(StepOutcome::Finished(self.finish()));
        };

        self.set_state(SessionState::Running);
        self.plan.mark_running(&node_id)?;
        self.emit_status(&node_id, StepStatus::Running);

        let request = match graph.node(&node_id) {
            Some(node) => NodeRunRequest {
                node_type: node.kind.to_string(),
                node_id: node_id.clone(),
                node_data: node.data.clone(),
                input: self.input_for(&node_id),
                context: json!({
                    "variables": self.variables,
                    "nodes": self.outputs,
                }),
            },
            None => {
                let error = format!("node '{}' is no longer in the graph", node_id);
                return self.fail_step(node_id, error, None);
            }
        };

        log::debug!("Running node '{}' ({})", node_id, request.node_type);
        let report = match runner.run_node(request).await {
            Ok(report) => report,
            Err(e) => return self.fail_step(node_id, e.to_string(), None),
        };
        if !report.success {
            let error = report
                .error
                .unwrap_or_else(|| "node reported failure".to_string());
            return self.fail_step(node_id, error, report.duration_ms);
        }

        self.outputs.insert(node_id.clone(), report.output.clone());
        self.plan.mark_completed(
            &node_id,
            report.output,
            report.markdown_output,
            report.duration_ms,
        )?;
        self.emit_status(&node_id, StepStatus::Completed);

        let context = self.context_for(&node_id);
        self.watches.refresh_all(&context, Some(&node_id));

        let check = self.breakpoints.check(&node_id, &context);
        for failure in &check.errors {
            self.emit(EditorEvent::warning(format!(
                "Breakpoint condition failed: {}",
                failure.message
            )));
        }
        if check.should_pause() {
            for hit in &check.hits {
                log::info!("Breakpoint '{}' hit on node '{}'", hit.id, node_id);
                self.emit(EditorEvent::BreakpointHit {
                    breakpoint_id: hit.id.clone(),
                    node_id: node_id.clone(),
                    hit_count: hit.hit_count,
                });
            }
            self.set_state(SessionState::Paused);
            return Ok(StepOutcome::Paused {
                node_id,
                breakpoint_ids: check.hits.into_iter().map(|b| b.id).collect(),
            });
        }

        Ok(StepOutcome::Executed { node_id })
    }

    /// Settle the session once no step is ready
    ///
    /// Steps left pending at this point sit behind a cycle or a failure.
    fn finish(&mut self) -> SessionState {
        let state = if self.plan.is_finished() && !self.plan.has_failures() {
            SessionState::Completed
        } else {
            let stuck = self
                .plan
                .steps()
                .iter()
                .filter(|s| !s.status.is_terminal())
                .count();
            if stuck > 0 {
                self.emit(EditorEvent::warning(format!(
                    "{} step(s) can never run",
                    stuck
                )));
            }
            SessionState::Failed
        };
        self.set_state(state);
        state
    }

    fn fail_step(
        &mut self,
        node_id: NodeId,
        error: String,
        duration_ms: Option<u64>,
    ) -> Result<StepOutcome> {
        log::warn!("Node '{}' failed: {}", node_id, error);
        self.plan.mark_failed(&node_id, error.clone(), duration_ms)?;
        self.emit_status(&node_id, StepStatus::Failed);
        self.set_state(SessionState::Failed);
        Ok(StepOutcome::Failed { node_id, error })
    }

    fn input_for(&self, node_id: &str) -> Value {
        let deps = self
            .plan
            .step(node_id)
            .map(|s| s.dependencies.as_slice())
            .unwrap_or_default();
        match deps {
            [] => self.input.clone(),
            [single] => self.outputs.get(single).cloned().unwrap_or(Value::Null),
            many => Value::Object(
                many.iter()
                    .filter_map(|dep| self.outputs.get(dep).map(|v| (dep.clone(), v.clone())))
                    .collect(),
            ),
        }
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            log::info!("Debug session {:?} -> {:?}", self.state, state);
            self.state = state;
            self.emit(EditorEvent::SessionStateChanged { state });
        }
    }

    fn emit_status(&self, node_id: &str, status: StepStatus) {
        self.emit(EditorEvent::StepStatusChanged {
            node_id: node_id.to_string(),
            status,
        });
    }

    fn emit(&self, event: EditorEvent) {
        if let Err(e) = self.events.send(event) {
            log::warn!("Failed to deliver debug event: {}", e);
        }
    }
}
