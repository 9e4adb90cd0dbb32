//! Agent configuration types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AgentError;
use crate::output::ToolOutput;

/// Transform applied to errored tool outputs under
/// [`ToolErrorPolicy::Handler`].
pub type ToolErrorHandler =
    Arc<dyn Fn(ToolOutput) -> Result<ToolOutput, AgentError> + Send + Sync>;

/// How the agent loop treats errored tool outputs within one iteration.
#[derive(Clone, Default)]
pub enum ToolErrorPolicy {
    /// Return the first errored output (in call order) as the iteration's
    /// error; remaining results are discarded.
    StopOnFirstError,
    /// Append the error as a synthesized tool-result message so the model
    /// sees the failure and can react.
    #[default]
    PassToModel,
    /// Delegate to a handler that either substitutes a successful output
    /// or surfaces its own error.
    Handler(ToolErrorHandler),
}

impl fmt::Debug for ToolErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopOnFirstError => f.write_str("StopOnFirstError"),
            Self::PassToModel => f.write_str("PassToModel"),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Configuration for an agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum reasoning iterations per run (default: 10).
    pub max_iterations: usize,
    /// Wall-clock budget for a run, checked at suspension points.
    pub timeout: Option<Duration>,
    /// Cap on concurrently executing tool calls within one iteration
    /// (default: 4). The effective pool size is
    /// `min(tool_worker_cap, number of calls)`.
    pub tool_worker_cap: usize,
    /// How errored tool outputs are handled.
    pub tool_error_policy: ToolErrorPolicy,
    /// Sampling temperature forwarded to the model.
    pub temperature: Option<f32>,
    /// Max tokens forwarded to the model.
    pub max_tokens: Option<u32>,
}

impl AgentConfig {
    /// Default maximum number of iterations.
    pub const DEFAULT_MAX_ITERATIONS: usize = 10;
    /// Default tool worker cap.
    pub const DEFAULT_TOOL_WORKER_CAP: usize = 4;

    /// Create a new config with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            timeout: None,
            tool_worker_cap: Self::DEFAULT_TOOL_WORKER_CAP,
            tool_error_policy: ToolErrorPolicy::PassToModel,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AgentConfig::new();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.tool_worker_cap, 4);
        assert!(config.timeout.is_none());
        assert!(matches!(
            config.tool_error_policy,
            ToolErrorPolicy::PassToModel
        ));
    }
}
