//! Praxis is a runtime for language-model agents that plan, execute, and
//! repair multi-step work.
//!
//! Three subsystems make up the core:
//!
//! - **The agent loop** ([`agent`]): a reasoning cycle around a
//!   [`CompletionModel`](model::CompletionModel) that dispatches tool calls
//!   in parallel and terminates through a pluggable
//!   [`Extractor`](agent::Extractor). Agents implement [`Tool`](tool::Tool),
//!   so agents compose as tools.
//! - **The plan executor** ([`executor`]): a deterministic scheduler over a
//!   [`Plan`](plan::Plan) DAG with judge-gated steps, retry-with-feedback,
//!   sub-plan delegation with escalation, and incremental replanning that
//!   preserves the outputs of unchanged steps.
//! - **The session ledger** ([`session`], [`context`]): append-only records
//!   of every model call, tool call, and state transition, serializable so
//!   runs are observable and resumable.
//!
//! Model transports, concrete tools, and configuration loading live
//! outside this crate; the runtime consumes them through the [`model`] and
//! [`tool`] interfaces.

// Core data model
pub mod arguments;
pub mod error;
pub mod json_utils;
pub mod message;
pub mod output;

// External interfaces
pub mod model;
pub mod tool;

// Ledgers
pub mod context;
pub mod session;

// Planning and execution
pub mod agent;
pub mod executor;
pub mod judge;
pub mod plan;
pub mod planner;

// Prompt templates
pub mod prompts;

pub mod prelude;

// Re-export the types most hosts touch.
pub use agent::{Agent, AgentBuilder, AgentConfig, AgentRun};
pub use arguments::Arguments;
pub use context::ExecutionContext;
pub use error::{AgentError, ExecutorError, PlanError, Result, ToolError};
pub use executor::{ExecutionReport, PlanExecutor};
pub use judge::{Judge, JudgeResult, Verdict};
pub use output::ToolOutput;
pub use plan::{Plan, PlanDiff, PlanStep};
pub use planner::{PlanInput, Planner};
pub use session::Session;
pub use tool::{Tool, ToolBox};
