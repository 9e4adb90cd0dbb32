//! Convenience re-exports for host applications and tests.
//!
//! ```rust,ignore
//! use praxis::prelude::*;
//! ```

pub use crate::agent::{
    Agent, AgentBuilder, AgentConfig, AgentRun, DefaultExtractor, Extraction, Extractor,
    JsonRetryExtractor, ToolErrorPolicy, identity_parser,
};
pub use crate::arguments::Arguments;
pub use crate::context::{DataEntry, DataOp, ExecutionContext, Node, NodeKind};
pub use crate::error::{AgentError, ExecutorError, PlanError, Result, ToolError};
pub use crate::executor::{
    Attempt, DependencyOutput, ExecutionFailure, ExecutionReport, ExecutorConfig,
    PlanExecutor, PlanTransition, StepExecution,
};
pub use crate::judge::{EscalationInput, Judge, JudgeInput, JudgeResult, Verdict};
pub use crate::message::{Message, MessageRole, ToolCall};
pub use crate::model::{
    CompletionModel, CompletionRequest, CompletionResponse, GenerateConfig, TokenUsage,
    ToolDescriptor, mock::MockModel,
};
pub use crate::output::ToolOutput;
pub use crate::plan::{Plan, PlanDiff, PlanStep, StepChange, StepDelta, compute_step_delta};
pub use crate::planner::{PlanInput, Planner};
pub use crate::session::{Session, Step, StepResponse, StepStats};
pub use crate::tool::{
    BoxedTool, FunctionTool, Parameter, ParameterKind, Tool, ToolBox, parameters_schema,
};
