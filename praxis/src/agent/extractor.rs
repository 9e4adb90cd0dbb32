//! Extractors: the termination policy of the agent loop.
//!
//! The loop separates *what to produce* (the response parser) from *when
//! to stop* (the extractor). An extractor inspects the session after each
//! iteration and decides whether the agent is done, what result to return,
//! and what feedback to inject otherwise. Judge-style agents and schema
//! retries are built by swapping the extractor, not the loop.

use std::sync::Arc;

use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::AgentError;
use crate::message::Message;
use crate::session::Session;

/// Parses the model's final text into the agent's output value.
pub type ResponseParser = Arc<dyn Fn(&str) -> Result<Value, AgentError> + Send + Sync>;

/// The identity parser: raw text passes through as a JSON string.
#[must_use]
pub fn identity_parser() -> ResponseParser {
    Arc::new(|text| Ok(Value::String(text.to_string())))
}

/// An extractor's decision after one iteration.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Whether the loop should terminate.
    pub done: bool,
    /// The result to return when done; the loop falls back to the last
    /// assistant text when absent.
    pub result: Option<Value>,
    /// Non-fatal observations (parse failures and the like).
    pub warnings: Vec<String>,
    /// Messages appended to the current step before the next iteration.
    pub feedback: Vec<Message>,
    /// Fatal error: abort the loop.
    pub error: Option<AgentError>,
}

impl Extraction {
    /// Terminate with a result.
    #[must_use]
    pub fn done(result: Value) -> Self {
        Self {
            done: true,
            result: Some(result),
            ..Self::default()
        }
    }

    /// Continue looping, optionally injecting feedback messages.
    #[must_use]
    pub fn pending(feedback: Vec<Message>) -> Self {
        Self {
            feedback,
            ..Self::default()
        }
    }

    /// Abort the loop.
    #[must_use]
    pub fn fail(error: AgentError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Attach a warning.
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// Decides whether an agent run is finished and with what result.
pub trait Extractor: Send + Sync {
    /// Inspect the session after an iteration and decide what happens next.
    fn extract(&self, ctx: &ExecutionContext, session: &Session) -> Extraction;
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

/// The default extractor: wait out tool calls, then parse the final text.
///
/// On parse failure it records a warning; the run still terminates with
/// the raw text unless `retry_on_parse_failure` is set, in which case the
/// parse error is fed back to the model and the loop continues.
pub struct DefaultExtractor {
    parser: ResponseParser,
    retry_on_parse_failure: bool,
}

impl std::fmt::Debug for DefaultExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultExtractor")
            .field("retry_on_parse_failure", &self.retry_on_parse_failure)
            .finish_non_exhaustive()
    }
}

impl DefaultExtractor {
    /// Create the default extractor around a parser.
    #[must_use]
    pub fn new(parser: ResponseParser) -> Self {
        Self {
            parser,
            retry_on_parse_failure: false,
        }
    }

    /// Feed parse failures back to the model instead of terminating.
    #[must_use]
    pub const fn retry_on_parse_failure(mut self) -> Self {
        self.retry_on_parse_failure = true;
        self
    }
}

impl Extractor for DefaultExtractor {
    fn extract(&self, _ctx: &ExecutionContext, session: &Session) -> Extraction {
        let Some(step) = session.last_step() else {
            return Extraction::fail(AgentError::extraction("no steps recorded"));
        };
        if step.has_tool_calls() {
            return Extraction::pending(Vec::new());
        }

        let text = last_assistant_text(session).unwrap_or_default();
        match (self.parser)(&text) {
            Ok(result) => Extraction::done(result),
            Err(e) => {
                let warning = e.to_string();
                if self.retry_on_parse_failure {
                    Extraction::pending(vec![Message::system(format!(
                        "Your previous reply could not be parsed: {e}. Reply again in the required format."
                    ))])
                    .with_warning(warning)
                } else {
                    // Terminate anyway; the loop falls back to the raw text.
                    Extraction {
                        done: true,
                        result: None,
                        warnings: vec![warning],
                        feedback: Vec::new(),
                        error: None,
                    }
                }
            }
        }
    }
}

/// An extractor that insists on parseable output.
///
/// On parse failure it appends a caller-supplied reminder restating the
/// required schema and loops; the agent's iteration budget bounds the
/// retries. The judge and planner run on this.
pub struct JsonRetryExtractor {
    parser: ResponseParser,
    reminder: String,
}

impl std::fmt::Debug for JsonRetryExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRetryExtractor").finish_non_exhaustive()
    }
}

impl JsonRetryExtractor {
    /// Create a retrying extractor with a schema reminder.
    #[must_use]
    pub fn new(parser: ResponseParser, reminder: impl Into<String>) -> Self {
        Self {
            parser,
            reminder: reminder.into(),
        }
    }
}

impl Extractor for JsonRetryExtractor {
    fn extract(&self, _ctx: &ExecutionContext, session: &Session) -> Extraction {
        let Some(step) = session.last_step() else {
            return Extraction::fail(AgentError::extraction("no steps recorded"));
        };
        if step.has_tool_calls() {
            return Extraction::pending(Vec::new());
        }

        let text = last_assistant_text(session).unwrap_or_default();
        match (self.parser)(&text) {
            Ok(result) => Extraction::done(result),
            Err(e) => Extraction::pending(vec![Message::system(self.reminder.clone())])
                .with_warning(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;
    use crate::session::{Step, StepResponse};

    fn session_with_reply(text: &str, tool_calls: Vec<ToolCall>) -> Session {
        let mut session = Session::new();
        let mut step = Step::new(vec![Message::user("q")]);
        step.set_response(StepResponse {
            output: Some(Message::assistant(text)),
            tool_calls,
            error: None,
        });
        session.push_step(step);
        session
    }

    fn json_parser() -> ResponseParser {
        Arc::new(|text| {
            serde_json::from_str::<Value>(text)
                .map_err(|e| AgentError::parsing(text, e.to_string()))
        })
    }

    #[test]
    fn pending_tool_calls_defer_extraction() {
        let ctx = ExecutionContext::new("test");
        let session = session_with_reply(
            "",
            vec![ToolCall::new("id", "t", crate::arguments::Arguments::new())],
        );
        let extractor = DefaultExtractor::new(identity_parser());

        let decision = extractor.extract(&ctx, &session);
        assert!(!decision.done);
        assert!(decision.feedback.is_empty());
    }

    #[test]
    fn default_extractor_terminates_with_parsed_value() {
        let ctx = ExecutionContext::new("test");
        let session = session_with_reply(r#"{"a": 1}"#, vec![]);
        let extractor = DefaultExtractor::new(json_parser());

        let decision = extractor.extract(&ctx, &session);
        assert!(decision.done);
        assert_eq!(decision.result, Some(serde_json::json!({"a": 1})));
    }

    #[test]
    fn default_extractor_warns_but_finishes_on_parse_failure() {
        let ctx = ExecutionContext::new("test");
        let session = session_with_reply("not json", vec![]);
        let extractor = DefaultExtractor::new(json_parser());

        let decision = extractor.extract(&ctx, &session);
        assert!(decision.done);
        assert!(decision.result.is_none());
        assert_eq!(decision.warnings.len(), 1);
    }

    #[test]
    fn default_extractor_can_retry_instead() {
        let ctx = ExecutionContext::new("test");
        let session = session_with_reply("not json", vec![]);
        let extractor = DefaultExtractor::new(json_parser()).retry_on_parse_failure();

        let decision = extractor.extract(&ctx, &session);
        assert!(!decision.done);
        assert_eq!(decision.feedback.len(), 1);
    }

    #[test]
    fn json_retry_extractor_appends_reminder() {
        let ctx = ExecutionContext::new("test");
        let session = session_with_reply("not json", vec![]);
        let extractor = JsonRetryExtractor::new(json_parser(), "follow the schema");

        let decision = extractor.extract(&ctx, &session);
        assert!(!decision.done);
        assert_eq!(decision.feedback[0].content, "follow the schema");
        assert_eq!(decision.warnings.len(), 1);
    }
}
