//! Step-through debugging over a backend-executed run
//!
//! - [`plan`]: one step per node with status and timing
//! - [`breakpoints`] and [`watch`]: user-defined pause conditions and
//!   watched expressions, evaluated by [`expression`]
//! - [`session`]: drives a run through a [`NodeRunner`]

pub mod breakpoints;
pub mod expression;
pub mod plan;
pub mod runner;
pub mod session;
pub mod watch;

pub use breakpoints::{Breakpoint, BreakpointCheck, BreakpointSet, ConditionFailure};
pub use expression::{evaluate, evaluate_condition, ExpressionContext};
pub use plan::{ExecutionPlan, ExecutionStep, StepStatus};
pub use runner::{NodeRunReport, NodeRunRequest, NodeRunner};
pub use session::{DebugSession, SessionState, StepOutcome};
pub use watch::{WatchList, WatchVariable};
