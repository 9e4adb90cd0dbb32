//! Error types for the praxis runtime.
//!
//! Each layer owns a small error enum; `Result<T>` aliases the agent-level
//! error since that is what most call sites propagate.

use thiserror::Error;

/// A type alias for `Result<T, AgentError>`.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors raised by tool lookup, argument validation, and execution.
///
/// Tool execution itself is total: a failing tool reports through an
/// errored [`ToolOutput`](crate::output::ToolOutput) carrying one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolError {
    /// No tool with this name is registered.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Arguments did not match the tool's declared parameters.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The tool ran and reported a failure.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A declared parameter validator rejected a value.
    #[error("validation failed for '{parameter}': {message}")]
    Validation {
        /// Name of the offending parameter.
        parameter: String,
        /// What the validator reported.
        message: String,
    },
}

/// The main error type for agent operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Error from the completion model.
    #[error("model error: {message}")]
    Model {
        /// The underlying error message.
        message: String,
    },

    /// The model called a tool that is not in the agent's registry.
    ///
    /// Reported before any tool in the batch is dispatched.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// The response parser rejected the model's output.
    #[error("parsing error: {message}; output: {output}")]
    Parsing {
        /// The output that failed to parse.
        output: String,
        /// The parsing error message.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The iteration budget was exhausted.
    #[error("reached maximum iterations ({iterations}/{max_iterations})")]
    MaxIterations {
        /// Iterations completed.
        iterations: usize,
        /// The configured cap.
        max_iterations: usize,
    },

    /// A cancellation signal was observed at a suspension point.
    #[error("execution was cancelled")]
    Cancelled,

    /// The configured deadline passed at a suspension point.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration issue.
        message: String,
    },

    /// The extractor aborted the run.
    #[error("extraction error: {message}")]
    Extraction {
        /// What the extractor reported.
        message: String,
    },

    /// A tool failed and the error policy surfaced it.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl AgentError {
    /// Create a new model error.
    #[must_use]
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }

    /// Create a new parsing error.
    #[must_use]
    pub fn parsing(output: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parsing {
            output: output.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new extraction error.
    #[must_use]
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction {
            message: message.into(),
        }
    }

    /// Create a new max-iterations error.
    #[must_use]
    pub const fn max_iterations(iterations: usize, max_iterations: usize) -> Self {
        Self::MaxIterations {
            iterations,
            max_iterations,
        }
    }
}

/// Structural violations detected by plan validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A step has an empty id.
    #[error("plan contains a step with an empty id")]
    EmptyStepId,

    /// Two steps share an id.
    #[error("duplicate step id: {id}")]
    DuplicateStepId {
        /// The colliding id.
        id: String,
    },

    /// A dependency references a step that is not in the plan.
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency {
        /// The declaring step.
        step: String,
        /// The missing dependency id.
        dependency: String,
    },

    /// A step depends on itself.
    #[error("step '{id}' depends on itself")]
    SelfDependency {
        /// The offending step id.
        id: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected at step '{id}'")]
    DependencyCycle {
        /// A step on the cycle.
        id: String,
    },

    /// Nested sub-plans include a plan in its own ancestry.
    #[error("circular sub-plan reference: plan '{plan_id}' includes itself")]
    CircularSubPlan {
        /// The repeated plan id.
        plan_id: String,
    },
}

/// Errors raised by plan execution and planning.
///
/// The planner shares this taxonomy: a model that never produces
/// parseable plan JSON surfaces as [`Agent`](Self::Agent), a structurally
/// invalid plan as [`InvalidPlan`](Self::InvalidPlan).
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The plan failed structural validation before execution.
    #[error("invalid plan: {0}")]
    InvalidPlan(#[from] PlanError),

    /// A step exhausted its attempts with a failing verdict.
    #[error("step '{step_id}' failed: {justification}")]
    StepFailed {
        /// The failed step.
        step_id: String,
        /// The judge's justification for the final failure.
        justification: String,
    },

    /// No step is ready although the plan is not complete.
    #[error("no executable steps available")]
    NoExecutableSteps,

    /// The replan budget was exhausted.
    #[error("replan limit reached ({limit})")]
    ReplanLimit {
        /// The configured cap.
        limit: usize,
    },

    /// The judge could not produce a valid verdict for a step.
    #[error("judge failed for step '{step_id}': {message}")]
    JudgeFailed {
        /// The step under judgment.
        step_id: String,
        /// The underlying failure.
        message: String,
    },

    /// A replan verdict was returned but no planner is configured.
    #[error("replan requested but no planner is configured")]
    PlannerUnavailable,

    /// A step-runner, judge, or planner agent run failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Internal signal: a sub-plan requests a rebuild at the parent level.
    ///
    /// Consumed by the immediate parent executor level; never user-visible.
    #[error("escalated: {feedback}")]
    Escalated {
        /// The escalation judge's feedback.
        feedback: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tool_message_is_stable() {
        let err = AgentError::UnknownTool("unknown".into());
        assert_eq!(err.to_string(), "unknown tool: unknown");
    }

    #[test]
    fn escalated_message_carries_prefix() {
        let err = ExecutorError::Escalated {
            feedback: "rebuild upstream".into(),
        };
        assert_eq!(err.to_string(), "escalated: rebuild upstream");
    }

    #[test]
    fn tool_error_serde_roundtrip() {
        let err = ToolError::Validation {
            parameter: "count".into(),
            message: "must be positive".into(),
        };
        let json = serde_json::to_string(&err).expect("serialize");
        let parsed: ToolError = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, err);
    }

    #[test]
    fn max_iterations_display() {
        let err = AgentError::max_iterations(3, 3);
        assert_eq!(err.to_string(), "reached maximum iterations (3/3)");
    }
}
