//! Append-only record of an agent's reasoning iterations.
//!
//! A [`Session`] is a sequence of [`Step`]s, one per model call. Each step
//! freezes the messages that were sent (`input`), the model's response, and
//! any messages appended afterwards (tool results, extractor feedback).
//! Flattening the steps in order reproduces the exact conversation, which
//! is what makes runs resumable.

use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::message::{Message, ToolCall};
use crate::model::{CompletionResponse, TokenUsage};

/// Timing and usage stats for one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepStats {
    /// When the request was sent to the model.
    pub sent_at: DateTime<Utc>,
    /// When the response was received; unset while the call is in flight.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub received_at: Option<DateTime<Utc>>,
    /// Token usage for this step, when reported.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage: Option<TokenUsage>,
}

/// The model's response recorded on a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResponse {
    /// The assistant message, absent when the call failed outright.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub output: Option<Message>,
    /// Tool calls requested by the model.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_calls: Vec<ToolCall>,
    /// Error recorded when the model call failed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

impl StepResponse {
    /// Build a response record from a completion response.
    #[must_use]
    pub fn from_completion(response: &CompletionResponse) -> Self {
        Self {
            output: Some(response.message.clone()),
            tool_calls: response.tool_calls.clone(),
            error: None,
        }
    }

    /// Build a failure record.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: None,
            tool_calls: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// One reasoning iteration: immutable input, the model response, and
/// messages appended after the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Messages sent to the model, frozen at creation.
    pub input: Vec<Message>,
    /// Messages added after the response (tool results, feedback).
    pub appended: Vec<Message>,
    /// The model response; set exactly once when the step is sealed.
    pub response: Option<StepResponse>,
    /// Timing and usage stats.
    pub stats: StepStats,
}

impl Step {
    /// Create a step about to be sent; stamps `sent_at`.
    #[must_use]
    pub fn new(input: Vec<Message>) -> Self {
        Self {
            input,
            appended: Vec::new(),
            response: None,
            stats: StepStats {
                sent_at: Utc::now(),
                received_at: None,
                usage: None,
            },
        }
    }

    /// Seal the step with the model's response; stamps `received_at`.
    pub fn set_response(&mut self, response: StepResponse) {
        self.response = Some(response);
        self.stats.received_at = Some(Utc::now());
    }

    /// Record token usage for this step.
    pub fn set_usage(&mut self, usage: TokenUsage) {
        self.stats.usage = Some(usage);
    }

    /// Append a message after the response.
    pub fn append(&mut self, message: Message) {
        self.appended.push(message);
    }

    /// Whether the model requested tool calls in this step.
    #[must_use]
    pub fn has_tool_calls(&self) -> bool {
        self.response
            .as_ref()
            .is_some_and(|r| !r.tool_calls.is_empty())
    }

    /// Wall-clock duration of the model call, once sealed.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.stats.received_at.map(|end| end - self.stats.sent_at)
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let millis = duration.num_milliseconds().max(0);
    format!("{}.{:03}s", millis / 1000, millis % 1000)
}

impl Serialize for Step {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Step", 5)?;
        state.serialize_field("input", &self.input)?;
        if self.appended.is_empty() {
            state.skip_field("appended")?;
        } else {
            state.serialize_field("appended", &self.appended)?;
        }
        state.serialize_field("response", &self.response)?;
        state.serialize_field("stats", &self.stats)?;
        match self.duration() {
            Some(d) => state.serialize_field("duration", &format_duration(d))?,
            None => state.skip_field("duration")?,
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for Step {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Repr {
            #[serde(default)]
            input: Vec<Message>,
            #[serde(default)]
            appended: Vec<Message>,
            #[serde(default)]
            response: Option<StepResponse>,
            stats: StepStats,
        }

        let repr = Repr::deserialize(deserializer)?;
        Ok(Self {
            input: repr.input,
            appended: repr.appended,
            response: repr.response,
            stats: repr.stats,
        })
    }
}

/// An ordered list of steps forming one agent invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    steps: Vec<Step>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub const fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// The recorded steps, in order.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no step has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append a step.
    pub fn push_step(&mut self, step: Step) {
        self.steps.push(step);
    }

    /// The most recent step.
    #[must_use]
    pub fn last_step(&self) -> Option<&Step> {
        self.steps.last()
    }

    /// Mutable access to the most recent step.
    pub fn last_step_mut(&mut self) -> Option<&mut Step> {
        self.steps.last_mut()
    }

    /// Append a message to the last step. No-op on an empty session.
    pub fn append_message(&mut self, message: Message) {
        if let Some(step) = self.steps.last_mut() {
            step.append(message);
        }
    }

    /// Append a system message to the last step.
    pub fn append_system_message(&mut self, content: impl Into<String>) {
        self.append_message(Message::system(content));
    }

    /// Append a user message to the last step.
    pub fn append_user_message(&mut self, content: impl Into<String>) {
        self.append_message(Message::user(content));
    }

    /// Append a tool result message to the last step.
    pub fn append_tool_message(&mut self, message: Message) {
        self.append_message(message);
    }

    /// Flatten the session into the full conversation.
    ///
    /// For each step in order: its input, then the response output when
    /// present, then its appended messages.
    #[must_use]
    pub fn conversation(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        for step in &self.steps {
            messages.extend(step.input.iter().cloned());
            if let Some(output) = step.response.as_ref().and_then(|r| r.output.as_ref()) {
                messages.push(output.clone());
            }
            messages.extend(step.appended.iter().cloned());
        }
        messages
    }

    /// Whether the session has concluded: the last step was sealed with no
    /// tool calls pending. An empty session is not finished.
    #[must_use]
    pub fn finished(&self) -> bool {
        self.steps.last().is_some_and(|step| {
            step.response
                .as_ref()
                .is_some_and(|r| r.tool_calls.is_empty())
        })
    }

    /// Wall-clock span from the first request to the last response.
    #[must_use]
    pub fn duration(&self) -> Option<chrono::Duration> {
        let first = self.steps.first()?.stats.sent_at;
        let last = self.steps.iter().rev().find_map(|s| s.stats.received_at)?;
        Some(last - first)
    }

    /// Total token usage across all steps.
    #[must_use]
    pub fn total_usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for step in &self.steps {
            if let Some(usage) = step.stats.usage {
                total += usage;
            }
        }
        total
    }
}

impl Serialize for Session {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Session", 3)?;
        state.serialize_field("steps", &self.steps)?;
        state.serialize_field("finished", &self.finished())?;
        match self.duration() {
            Some(d) => state.serialize_field("duration", &format_duration(d))?,
            None => state.skip_field("duration")?,
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for Session {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Repr {
            #[serde(default)]
            steps: Vec<Step>,
        }

        let repr = Repr::deserialize(deserializer)?;
        Ok(Self { steps: repr.steps })
    }
}
