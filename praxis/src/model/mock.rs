//! Mock model implementation for testing.
//!
//! [`MockModel`] replays a script of responses and records every request it
//! receives, so tests can assert on both conversation content and call
//! counts without a real provider.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{CompletionModel, CompletionRequest, CompletionResponse};
use crate::context::ExecutionContext;
use crate::error::AgentError;

/// Responder invoked when the scripted queue is empty.
type DynResponder =
    dyn Fn(&CompletionRequest) -> Result<CompletionResponse, AgentError> + Send + Sync;

/// A scripted mock model.
///
/// Responses are consumed in order; when the script runs dry the model
/// either delegates to a fallback responder or fails, which keeps tests
/// honest about how many model calls a code path makes.
///
/// # Example
///
/// ```rust,ignore
/// let model = MockModel::new()
///     .then_text("not json")
///     .then_text(r#"{"verdict":"pass","justification":"looks right"}"#);
/// ```
pub struct MockModel {
    model_id: String,
    script: Mutex<VecDeque<CompletionResponse>>,
    responder: Option<Box<DynResponder>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl std::fmt::Debug for MockModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockModel")
            .field("model_id", &self.model_id)
            .field("has_responder", &self.responder.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MockModel {
    /// Create a mock model with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model_id: "mock-model".to_string(),
            script: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock model that answers every request through `responder`.
    #[must_use]
    pub fn with_responder(
        responder: impl Fn(&CompletionRequest) -> Result<CompletionResponse, AgentError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        let mut model = Self::new();
        model.responder = Some(Box::new(responder));
        model
    }

    /// Override the model id.
    #[must_use]
    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Queue a scripted response.
    #[must_use]
    pub fn then(self, response: CompletionResponse) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
        self
    }

    /// Queue a plain text response.
    #[must_use]
    pub fn then_text(self, content: impl Into<String>) -> Self {
        self.then(CompletionResponse::text(content))
    }

    /// Queue a tool-calling response.
    #[must_use]
    pub fn then_tool_calls(self, calls: Vec<crate::message::ToolCall>) -> Self {
        self.then(CompletionResponse::with_tool_calls(calls))
    }

    /// Number of requests served so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().map_or(0, |r| r.len())
    }

    /// Snapshot of every request served so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map_or_else(|_| Vec::new(), |r| r.clone())
    }
}

#[async_trait]
impl CompletionModel for MockModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(
        &self,
        ctx: &ExecutionContext,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, AgentError> {
        ctx.checkpoint()?;

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let scripted = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());

        match scripted {
            Some(response) => Ok(response),
            None => match &self.responder {
                Some(responder) => responder(&request),
                None => Err(AgentError::model("mock script exhausted")),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn request(content: &str) -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::user(content)],
            tools: Vec::new(),
            config: super::super::GenerateConfig::default(),
        }
    }

    #[tokio::test]
    async fn serves_script_in_order_then_fails() {
        let ctx = ExecutionContext::new("test");
        let model = MockModel::new().then_text("first").then_text("second");

        let r1 = model.complete(&ctx, request("a")).await.expect("first");
        assert_eq!(r1.message.content, "first");
        let r2 = model.complete(&ctx, request("b")).await.expect("second");
        assert_eq!(r2.message.content, "second");

        assert!(model.complete(&ctx, request("c")).await.is_err());
        assert_eq!(model.request_count(), 3);
    }

    #[tokio::test]
    async fn responder_answers_beyond_the_script() {
        let ctx = ExecutionContext::new("test");
        let model = MockModel::with_responder(|req| {
            Ok(CompletionResponse::text(format!(
                "echo: {}",
                req.messages.last().map_or("", |m| m.content.as_str())
            )))
        });

        let response = model.complete(&ctx, request("hello")).await.expect("reply");
        assert_eq!(response.message.content, "echo: hello");
    }

    #[tokio::test]
    async fn records_requests() {
        let ctx = ExecutionContext::new("test");
        let model = MockModel::new().then_text("ok");
        model.complete(&ctx, request("inspect me")).await.expect("reply");

        let requests = model.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].content, "inspect me");
    }
}
