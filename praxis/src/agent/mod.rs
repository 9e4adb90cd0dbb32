//! The agent loop: a cooperative reasoning cycle around a completion model.
//!
//! An [`Agent`] drives a conversation with its model, dispatches the tool
//! calls the model requests (in parallel, bounded by a worker cap), and
//! lets an [`Extractor`] decide when the run is done and what it returns.
//!
//! Agents implement [`Tool`](crate::tool::Tool), so an agent can be
//! registered in another agent's toolbox and composed like any other tool.
//!
//! # Example
//!
//! ```rust,ignore
//! let agent = Agent::builder()
//!     .name("researcher")
//!     .model(model)
//!     .tool(search_tool)
//!     .max_iterations(8)
//!     .build();
//!
//! let run = agent.run(&ctx, Arguments::new().with("task", "find X")).await?;
//! println!("{}", run.output);
//! ```

mod builder;
mod config;
mod extractor;
mod run;

pub use builder::AgentBuilder;
pub use config::{AgentConfig, ToolErrorHandler, ToolErrorPolicy};
pub use extractor::{
    DefaultExtractor, Extraction, Extractor, JsonRetryExtractor, ResponseParser, identity_parser,
};

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::arguments::Arguments;
use crate::context::ExecutionContext;
use crate::error::{AgentError, Result, ToolError};
use crate::message::Message;
use crate::model::{CompletionModel, TokenUsage};
use crate::output::ToolOutput;
use crate::session::Session;
use crate::tool::{Parameter, Tool, ToolBox};

/// Builds the initial message list for a fresh session.
pub type PrepareInput =
    Arc<dyn Fn(&Arguments, &Session) -> Result<Vec<Message>> + Send + Sync>;

/// The result of a completed agent run.
#[derive(Debug)]
pub struct AgentRun {
    /// The agent's final output: the parsed result, or the raw assistant
    /// text when parsing was skipped or failed non-fatally.
    pub output: Value,
    /// The full session ledger of the run.
    pub session: Session,
    /// Non-fatal observations collected along the way.
    pub warnings: Vec<String>,
    /// Token usage summed over the session.
    pub usage: TokenUsage,
}

impl AgentRun {
    /// The output rendered as text.
    #[must_use]
    pub fn output_text(&self) -> String {
        match &self.output {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// An LLM agent: a model, a toolbox, and the policies that drive the loop.
pub struct Agent {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) parameters: Vec<Parameter>,
    pub(crate) model: Arc<dyn CompletionModel>,
    pub(crate) tools: ToolBox,
    pub(crate) prepare_input: PrepareInput,
    pub(crate) extractor: Arc<dyn Extractor>,
    pub(crate) config: AgentConfig,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("model", &self.model.model_id())
            .field("tools", &self.tools.names())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Create a new agent builder.
    #[must_use]
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// The agent's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The agent's description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The agent's toolbox.
    #[must_use]
    pub const fn tools(&self) -> &ToolBox {
        &self.tools
    }

    /// The agent's configuration.
    #[must_use]
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run the agent on a fresh session.
    pub async fn run(&self, ctx: &ExecutionContext, args: Arguments) -> Result<AgentRun> {
        self.resume(ctx, Session::new(), args).await
    }

    /// Continue a previously recorded session.
    ///
    /// A non-empty session replays its flattened conversation instead of
    /// calling `prepare_input`, so a deserialized session picks up exactly
    /// where it left off.
    pub async fn resume(
        &self,
        ctx: &ExecutionContext,
        mut session: Session,
        args: Arguments,
    ) -> Result<AgentRun> {
        let (output, warnings) = self.drive(ctx, &mut session, &args).await?;
        let usage = session.total_usage();
        Ok(AgentRun {
            output,
            session,
            warnings,
            usage,
        })
    }
}

#[async_trait]
impl Tool for Agent {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Vec<Parameter> {
        self.parameters.clone()
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Arguments) -> ToolOutput {
        match self.run(ctx, args).await {
            Ok(run) => ToolOutput::ok_value(run.output),
            Err(AgentError::Tool(e)) => ToolOutput::err(e),
            Err(e) => ToolOutput::err(ToolError::Execution(e.to_string())),
        }
    }
}
