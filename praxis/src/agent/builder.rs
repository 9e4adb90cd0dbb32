//! Agent builder for constructing agents with a fluent API.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::arguments::Arguments;
use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::model::CompletionModel;
use crate::session::Session;
use crate::tool::{BoxedTool, Parameter, Tool, ToolBox};

use super::config::{AgentConfig, ToolErrorPolicy};
use super::extractor::{DefaultExtractor, Extractor, ResponseParser, identity_parser};
use super::{Agent, PrepareInput};

/// Builder for [`Agent`].
///
/// # Example
///
/// ```rust,ignore
/// let agent = Agent::builder()
///     .name("assistant")
///     .model(model)
///     .tool(my_tool)
///     .max_iterations(10)
///     .build();
/// ```
#[derive(Default)]
pub struct AgentBuilder {
    name: Option<String>,
    description: Option<String>,
    parameters: Vec<Parameter>,
    model: Option<Arc<dyn CompletionModel>>,
    tools: ToolBox,
    prepare_input: Option<PrepareInput>,
    parser: Option<ResponseParser>,
    extractor: Option<Arc<dyn Extractor>>,
    retry_on_parse_failure: bool,
    config: AgentConfig,
}

impl std::fmt::Debug for AgentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentBuilder")
            .field("name", &self.name)
            .field("has_model", &self.model.is_some())
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl AgentBuilder {
    /// Create a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the agent's name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the agent's description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declare a parameter of the agent's own tool surface.
    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Set the completion model.
    #[must_use]
    pub fn model(mut self, model: impl CompletionModel + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    /// Set an already-shared completion model.
    #[must_use]
    pub fn shared_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Add a tool to the agent.
    #[must_use]
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.add(tool);
        self
    }

    /// Add a shared tool (an agent registered as a tool, for instance).
    #[must_use]
    pub fn shared_tool(mut self, tool: BoxedTool) -> Self {
        self.tools.add_shared(tool);
        self
    }

    /// Replace the whole toolbox.
    #[must_use]
    pub fn tools(mut self, tools: ToolBox) -> Self {
        self.tools = tools;
        self
    }

    /// Set the maximum number of iterations.
    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Set the wall-clock budget for a run.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set the cap on concurrently executing tool calls.
    #[must_use]
    pub const fn tool_worker_cap(mut self, cap: usize) -> Self {
        self.config.tool_worker_cap = cap;
        self
    }

    /// Set the tool error policy.
    #[must_use]
    pub fn tool_error_policy(mut self, policy: ToolErrorPolicy) -> Self {
        self.config.tool_error_policy = policy;
        self
    }

    /// Set the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Set the max tokens per completion.
    #[must_use]
    pub const fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Set how the initial message list is built on a fresh session.
    #[must_use]
    pub fn prepare_input(
        mut self,
        prepare: impl Fn(&Arguments, &Session) -> Result<Vec<Message>> + Send + Sync + 'static,
    ) -> Self {
        self.prepare_input = Some(Arc::new(prepare));
        self
    }

    /// Set the response parser used by the default extractor.
    #[must_use]
    pub fn parser(mut self, parser: ResponseParser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Feed parse failures back to the model instead of terminating.
    #[must_use]
    pub const fn retry_on_parse_failure(mut self) -> Self {
        self.retry_on_parse_failure = true;
        self
    }

    /// Replace the extractor entirely; overrides the parser wiring.
    #[must_use]
    pub fn extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Build the agent.
    ///
    /// # Panics
    ///
    /// Panics on invalid configuration (no model, zero iterations). Use
    /// [`try_build`](Self::try_build) for a fallible alternative.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(self) -> Agent {
        self.try_build().expect("agent configuration is invalid")
    }

    /// Try to build the agent, failing on invalid configuration.
    pub fn try_build(self) -> Result<Agent> {
        let model = self
            .model
            .ok_or_else(|| AgentError::configuration("Model is required"))?;
        if self.config.max_iterations == 0 {
            return Err(AgentError::configuration(
                "max_iterations must be at least 1",
            ));
        }

        let name = self.name.unwrap_or_else(|| "agent".to_string());
        let prepare_input = self.prepare_input.unwrap_or_else(default_prepare_input);

        let extractor = match self.extractor {
            Some(extractor) => extractor,
            None => {
                let parser = self.parser.unwrap_or_else(identity_parser);
                let default = DefaultExtractor::new(parser);
                let default = if self.retry_on_parse_failure {
                    default.retry_on_parse_failure()
                } else {
                    default
                };
                Arc::new(default)
            }
        };

        Ok(Agent {
            id: format!("agent_{}", Uuid::new_v4().simple()),
            name,
            description: self.description.unwrap_or_default(),
            parameters: self.parameters,
            model,
            tools: self.tools,
            prepare_input,
            extractor,
            config: self.config,
        })
    }
}

/// Default input preparation: the `task` argument becomes a user message;
/// with no `task`, the whole bag is rendered as JSON.
fn default_prepare_input() -> PrepareInput {
    Arc::new(|args: &Arguments, _session: &Session| {
        let content = args
            .get_str("task")
            .map_or_else(|| args.to_value().to_string(), ToString::to_string);
        Ok(vec![Message::user(content)])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock::MockModel;

    #[test]
    fn try_build_requires_model() {
        let result = Agent::builder().name("x").try_build();
        assert!(matches!(result, Err(AgentError::Configuration { .. })));
    }

    #[test]
    fn try_build_rejects_zero_iterations() {
        let result = Agent::builder()
            .model(MockModel::new())
            .max_iterations(0)
            .try_build();
        assert!(matches!(result, Err(AgentError::Configuration { .. })));
    }

    #[test]
    fn defaults_are_applied() {
        let agent = Agent::builder().model(MockModel::new()).build();
        assert_eq!(agent.name(), "agent");
        assert!(agent.id.starts_with("agent_"));
        assert_eq!(agent.config().max_iterations, 10);
    }

    #[test]
    fn default_prepare_input_uses_task() {
        let prepare = default_prepare_input();
        let args = Arguments::new().with("task", "do the thing");
        let messages = prepare(&args, &Session::new()).expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "do the thing");
    }

    #[test]
    fn default_prepare_input_falls_back_to_json() {
        let prepare = default_prepare_input();
        let args = Arguments::new().with("topic", "executors");
        let messages = prepare(&args, &Session::new()).expect("messages");
        assert_eq!(messages[0].content, r#"{"topic":"executors"}"#);
    }
}
