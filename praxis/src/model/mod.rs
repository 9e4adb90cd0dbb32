//! The completion-model interface consumed by the agent loop.
//!
//! Transports (HTTP, streaming, auth) live outside this crate; the runtime
//! only sees [`CompletionModel`]. The [`mock`] module provides a scripted
//! implementation for tests.

pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::AgentError;
use crate::message::{Message, ToolCall};

/// Token usage reported by a model response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the input/prompt.
    pub input_tokens: u32,
    /// Number of tokens in the output/completion.
    pub output_tokens: u32,
    /// Reasoning tokens, where the provider reports them.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reasoning_tokens: Option<u32>,
}

impl TokenUsage {
    /// Create new token usage with specified counts.
    #[must_use]
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            reasoning_tokens: None,
        }
    }

    /// Get total token count.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens + self.reasoning_tokens.unwrap_or(0)
    }
}

impl std::ops::Add for TokenUsage {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            input_tokens: self.input_tokens + rhs.input_tokens,
            output_tokens: self.output_tokens + rhs.output_tokens,
            reasoning_tokens: match (self.reasoning_tokens, rhs.reasoning_tokens) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
            },
        }
    }
}

impl std::ops::AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// A tool advertised to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within a request.
    pub name: String,
    /// What the tool does, for the model's benefit.
    pub description: String,
    /// JSON Schema of the tool's parameters.
    pub parameters: Value,
}

/// Sampling configuration for a completion request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub max_tokens: Option<u32>,
}

/// A request to the completion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The conversation so far.
    pub messages: Vec<Message>,
    /// Tools the model may call. Empty when the agent has none.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tools: Vec<ToolDescriptor>,
    /// Sampling configuration.
    #[serde(default)]
    pub config: GenerateConfig,
}

/// The model's response to a completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The assistant message.
    pub message: Message,
    /// Tool calls requested alongside the message.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_calls: Vec<ToolCall>,
    /// Token usage, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Create a plain text response.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            tool_calls: Vec::new(),
            usage: None,
        }
    }

    /// Create a response that requests tool calls.
    #[must_use]
    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            message: Message::assistant(""),
            tool_calls: calls,
            usage: None,
        }
    }

    /// Attach token usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Whether the response requests any tool calls.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The core trait for language model implementations.
///
/// Implementations must observe cancellation on the passed
/// [`ExecutionContext`]; the runtime checks it around every call, but a
/// long-running transport should poll it too.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Get the model identifier (e.g. "gpt-4o", "claude-sonnet-4-5").
    fn model_id(&self) -> &str;

    /// Generate a response for the given request.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Model`] when the call fails, or a
    /// cancellation error when the context fires mid-call.
    async fn complete(
        &self,
        ctx: &ExecutionContext,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_addition_tracks_reasoning_tokens() {
        let a = TokenUsage::new(10, 5);
        let b = TokenUsage {
            input_tokens: 1,
            output_tokens: 2,
            reasoning_tokens: Some(3),
        };
        let sum = a + b;
        assert_eq!(sum.input_tokens, 11);
        assert_eq!(sum.output_tokens, 7);
        assert_eq!(sum.reasoning_tokens, Some(3));
        assert_eq!(sum.total(), 21);
    }

    #[test]
    fn text_response_has_no_tool_calls() {
        let response = CompletionResponse::text("done");
        assert!(!response.has_tool_calls());
        assert_eq!(response.message.content, "done");
    }

    #[test]
    fn request_serde_skips_empty_tools() {
        let request = CompletionRequest {
            messages: vec![Message::user("hi")],
            tools: Vec::new(),
            config: GenerateConfig::default(),
        };
        let json = serde_json::to_string(&request).expect("serialize");
        assert!(!json.contains("tools"));
    }
}
