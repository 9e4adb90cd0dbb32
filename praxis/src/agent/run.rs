//! The agent execution loop.
//!
//! One iteration: build the conversation, call the model, dispatch any
//! requested tool calls in parallel (bounded, order-preserving), then ask
//! the extractor whether the run is done. Everything the loop does is
//! recorded on the [`Session`] and in the [`ExecutionContext`] tree.

use std::time::Instant;

use futures::StreamExt;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::arguments::Arguments;
use crate::context::{ExecutionContext, NodeKind};
use crate::error::{AgentError, Result};
use crate::message::{Message, ToolCall};
use crate::model::{CompletionRequest, GenerateConfig};
use crate::output::ToolOutput;
use crate::session::{Session, Step, StepResponse};
use crate::tool::{BoxedTool, validate_arguments};

use super::Agent;
use super::config::ToolErrorPolicy;

impl Agent {
    /// Drive the loop inside an agent node of the execution tree.
    #[instrument(
        skip(self, ctx, session, args),
        fields(agent = %self.name, model = %self.model.model_id())
    )]
    pub(super) async fn drive(
        &self,
        ctx: &ExecutionContext,
        session: &mut Session,
        args: &Arguments,
    ) -> Result<(Value, Vec<String>)> {
        let agent_node =
            ctx.create_child_node(None, NodeKind::Agent, &self.name, args.to_value())?;
        let previous = ctx.current_id();
        ctx.set_current_node(agent_node)?;

        let result = self.drive_inner(ctx, session, args).await;

        match &result {
            Ok((output, _)) => ctx.set_output(agent_node, output)?,
            Err(e) => ctx.set_error(agent_node, e)?,
        }
        ctx.set_current_node(previous)?;
        result
    }

    async fn drive_inner(
        &self,
        ctx: &ExecutionContext,
        session: &mut Session,
        args: &Arguments,
    ) -> Result<(Value, Vec<String>)> {
        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let mut warnings = Vec::new();

        loop {
            check_budget(ctx, deadline)?;

            let messages = if session.is_empty() {
                (self.prepare_input)(args, session)?
            } else {
                session.conversation()
            };

            let request = CompletionRequest {
                messages: messages.clone(),
                tools: self.tools.descriptors(),
                config: GenerateConfig {
                    temperature: self.config.temperature,
                    max_tokens: self.config.max_tokens,
                },
            };

            let iteration = session.len() + 1;
            let iteration_node = ctx.create_child_node(
                None,
                NodeKind::Iteration,
                format!("iteration-{iteration}"),
                json!({ "messages": messages.len() }),
            )?;
            debug!(iteration, messages = messages.len(), "Calling model");

            let mut step = Step::new(messages);
            let response = match self.complete_with_deadline(ctx, request, deadline).await {
                Ok(response) => response,
                Err(e) => {
                    step.set_response(StepResponse::failure(e.to_string()));
                    session.push_step(step);
                    ctx.set_error(iteration_node, &e)?;
                    warn!(iteration, error = %e, "Model call failed");
                    return Err(e);
                }
            };
            if let Some(usage) = response.usage {
                step.set_usage(usage);
            }
            step.set_response(StepResponse::from_completion(&response));
            session.push_step(step);

            if !response.tool_calls.is_empty() {
                let outcome = self
                    .run_tool_calls(ctx, iteration_node, session, response.tool_calls)
                    .await;
                if let Err(e) = outcome {
                    ctx.set_error(iteration_node, &e)?;
                    return Err(e);
                }
            }

            let decision = self.extractor.extract(ctx, session);
            warnings.extend(decision.warnings);
            if let Some(error) = decision.error {
                ctx.set_error(iteration_node, &error)?;
                return Err(error);
            }

            ctx.set_output(
                iteration_node,
                json!({ "done": decision.done, "appended": decision.feedback.len() }),
            )?;

            if decision.done {
                let output = decision.result.unwrap_or_else(|| {
                    Value::String(last_assistant_text(session).unwrap_or_default())
                });
                info!(
                    iterations = session.len(),
                    warnings = warnings.len(),
                    "Agent run completed"
                );
                return Ok((output, warnings));
            }

            for message in decision.feedback {
                session.append_message(message);
            }

            if session.len() >= self.config.max_iterations {
                return Err(AgentError::max_iterations(
                    session.len(),
                    self.config.max_iterations,
                ));
            }
        }
    }

    /// Call the model, racing the run's deadline when one is set.
    async fn complete_with_deadline(
        &self,
        ctx: &ExecutionContext,
        request: CompletionRequest,
        deadline: Option<Instant>,
    ) -> Result<crate::model::CompletionResponse> {
        match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout(remaining, self.model.complete(ctx, request)).await {
                    Ok(result) => result,
                    Err(_) => Err(AgentError::DeadlineExceeded),
                }
            }
            None => self.model.complete(ctx, request).await,
        }
    }

    /// Validate, dispatch, and record one batch of tool calls.
    ///
    /// Results land in call order regardless of completion order: the
    /// bounded fan-out yields outputs positionally, and the appended
    /// messages are drained from that ordered sequence.
    async fn run_tool_calls(
        &self,
        ctx: &ExecutionContext,
        iteration_node: uuid::Uuid,
        session: &mut Session,
        calls: Vec<ToolCall>,
    ) -> Result<()> {
        // Unknown tools and malformed arguments fail the iteration before
        // anything is dispatched.
        let mut prepared: Vec<(ToolCall, bool, BoxedTool)> = Vec::with_capacity(calls.len());
        for mut call in calls {
            let tool = self
                .tools
                .get(&call.name)
                .cloned()
                .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;

            let provider_id = call.has_id();
            if !provider_id {
                call.id = ToolCall::generated_id();
            }

            let mut call_args = call.arguments.clone();
            validate_arguments(&tool.parameters(), &mut call_args)?;
            call.arguments = call_args;

            prepared.push((call, provider_id, tool));
        }

        // Write the assigned ids and injected defaults back to the ledger.
        if let Some(step) = session.last_step_mut() {
            if let Some(response) = step.response.as_mut() {
                response.tool_calls = prepared.iter().map(|(c, _, _)| c.clone()).collect();
            }
        }

        ctx.checkpoint()?;
        let cap = self.config.tool_worker_cap.max(1).min(prepared.len());
        debug!(calls = prepared.len(), cap, "Dispatching tool calls");

        let results: Vec<(ToolCall, bool, ToolOutput)> =
            futures::stream::iter(prepared.into_iter().map(|(call, provider_id, tool)| {
                let ctx = ctx.clone();
                async move {
                    let node = ctx.create_child_node(
                        Some(iteration_node),
                        NodeKind::Tool,
                        &call.name,
                        call.arguments.to_value(),
                    );
                    let output = tool.execute(&ctx, call.arguments.clone()).await;
                    if let Ok(node) = node {
                        let recorded = match &output {
                            ToolOutput::Error(e) => ctx.set_error(node, e),
                            ToolOutput::Payload(v) => ctx.set_output(node, v),
                        };
                        if let Err(e) = recorded {
                            warn!(tool = %call.name, error = %e, "Failed to record tool node");
                        }
                    }
                    (call, provider_id, output)
                }
            }))
            .buffered(cap)
            .collect()
            .await;

        ctx.checkpoint()?;

        // Under StopOnFirstError the whole batch is discarded: the first
        // errored output in call order becomes the iteration's error.
        if matches!(self.config.tool_error_policy, ToolErrorPolicy::StopOnFirstError) {
            for (call, _, output) in &results {
                if let ToolOutput::Error(e) = output {
                    warn!(tool = %call.name, error = %e, "Tool failed, stopping iteration");
                    return Err(AgentError::Tool(e.clone()));
                }
            }
        }

        for (call, provider_id, output) in results {
            let output = match (&self.config.tool_error_policy, output) {
                (ToolErrorPolicy::Handler(handler), out @ ToolOutput::Error(_)) => handler(out)?,
                (_, out) => out,
            };
            let content = output.render();
            let text = if provider_id {
                format!("ToolCall {} ({}) returned: {}", call.id, call.name, content)
            } else {
                format!("Tool {} returned: {}", call.name, content)
            };
            session.append_message(Message::system(text));
        }

        Ok(())
    }
}

fn last_assistant_text(session: &Session) -> Option<String> {
    session
        .last_step()?
        .response
        .as_ref()?
        .output
        .as_ref()
        .map(|m| m.content.clone())
}

fn check_budget(ctx: &ExecutionContext, deadline: Option<Instant>) -> Result<()> {
    ctx.checkpoint()?;
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Err(AgentError::DeadlineExceeded);
    }
    Ok(())
}
