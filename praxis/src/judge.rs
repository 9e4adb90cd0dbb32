//! The judge: a verdict-producing agent with a strict JSON contract.
//!
//! A judge reviews a step's output against its expectation and returns
//! pass, fail, or replan with a justification. Invalid replies are retried
//! by restating the schema, bounded by the judge agent's iteration budget.
//!
//! The same agent is reused in *escalation mode* with a different prompt:
//! there, a `replan` verdict means "rebuild at the parent level" while
//! `pass`/`fail` mean a local rebuild of the sub-plan suffices. The JSON
//! schema is unchanged.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::agent::{Agent, JsonRetryExtractor};
use crate::arguments::Arguments;
use crate::context::ExecutionContext;
use crate::error::AgentError;
use crate::json_utils::first_json_object;
use crate::message::Message;
use crate::model::CompletionModel;
use crate::prompts::{
    ESCALATION_SYSTEM_PROMPT, ESCALATION_TASK_TEMPLATE, JUDGE_SCHEMA_REMINDER,
    JUDGE_SYSTEM_PROMPT, JUDGE_TASK_TEMPLATE, render,
};

/// A judge's verdict on a step's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The output satisfies the expectation.
    Pass,
    /// The output falls short; retrying the step could fix it.
    Fail,
    /// The step itself is wrong; the plan must change.
    Replan,
}

impl Verdict {
    /// The verdict's wire literal.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Replan => "replan",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "replan" => Ok(Self::Replan),
            other => Err(AgentError::parsing(other, "unknown verdict")),
        }
    }
}

/// A judge's full decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeResult {
    /// The verdict.
    pub verdict: Verdict,
    /// Why the verdict was reached. Never empty.
    pub justification: String,
    /// Optional guidance for the next attempt or replan.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub suggested_fix: Option<String>,
}

/// Parse the judge JSON contract out of model text.
///
/// Tolerates prose or code fences around the object, rejects unknown
/// verdict literals and empty justifications.
pub fn parse_verdict(text: &str) -> Result<JudgeResult, AgentError> {
    let object = first_json_object(text)
        .ok_or_else(|| AgentError::parsing(text, "no JSON object found"))?;
    let result: JudgeResult =
        serde_json::from_str(object).map_err(|e| AgentError::parsing(object, e.to_string()))?;
    if result.justification.trim().is_empty() {
        return Err(AgentError::parsing(object, "justification must not be empty"));
    }
    Ok(result)
}

/// What a judge reviews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeInput {
    /// The overall objective.
    pub objective: String,
    /// Name of the step under review.
    pub step_name: String,
    /// The step's instruction.
    pub instruction: String,
    /// The expectation the output must satisfy.
    pub expectation: String,
    /// The output produced by the runner.
    pub output: String,
    /// Extra context, e.g. naming a delegated sub-plan.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<String>,
}

/// What the escalation mode reviews.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationInput {
    /// The overall objective.
    pub objective: String,
    /// Rendering of the parent step that delegated.
    pub parent_step: String,
    /// Text form of the parent plan.
    pub parent_plan: String,
    /// Text form of the delegated sub-plan.
    pub sub_plan: String,
    /// Why the sub-plan was judged insufficient.
    pub replan_reason: String,
}

/// A specialized agent producing [`JudgeResult`]s.
#[derive(Debug)]
pub struct Judge {
    agent: Agent,
}

impl Judge {
    /// Default bound on schema-retry iterations.
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// Create a judge on the given model with default retries.
    #[must_use]
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self::with_max_retries(model, Self::DEFAULT_MAX_RETRIES)
    }

    /// Create a judge with an explicit retry budget.
    ///
    /// # Panics
    ///
    /// Panics if `max_retries` is zero.
    #[must_use]
    pub fn with_max_retries(model: Arc<dyn CompletionModel>, max_retries: usize) -> Self {
        let parser = Arc::new(|text: &str| {
            parse_verdict(text).and_then(|v| Ok(serde_json::to_value(v)?))
        });
        let agent = Agent::builder()
            .name("judge")
            .description("Reviews step outputs against their expectations")
            .shared_model(model)
            .max_iterations(max_retries)
            .prepare_input(|args: &Arguments, _session| {
                let system = args.get_str("system").unwrap_or_default().to_string();
                let task = args.get_str("task").unwrap_or_default().to_string();
                Ok(vec![Message::system(system), Message::user(task)])
            })
            .extractor(Arc::new(JsonRetryExtractor::new(
                parser,
                JUDGE_SCHEMA_REMINDER,
            )))
            .build();
        Self { agent }
    }

    /// Judge a step's output against its expectation.
    ///
    /// # Errors
    ///
    /// Fails when the model cannot produce valid verdict JSON within the
    /// retry budget; the caller treats that as fatal for the step.
    pub async fn evaluate(
        &self,
        ctx: &ExecutionContext,
        input: &JudgeInput,
    ) -> Result<JudgeResult, AgentError> {
        let context_line = input
            .context
            .as_ref()
            .map(|c| format!("Context: {c}\n"))
            .unwrap_or_default();
        let vars = BTreeMap::from([
            ("objective", input.objective.clone()),
            ("step_name", input.step_name.clone()),
            ("instruction", input.instruction.clone()),
            ("expectation", input.expectation.clone()),
            ("context", context_line),
            ("output", input.output.clone()),
        ]);
        self.run(ctx, JUDGE_SYSTEM_PROMPT, render(JUDGE_TASK_TEMPLATE, &vars))
            .await
    }

    /// Decide whether a failed delegation should be rebuilt locally or at
    /// the parent level.
    ///
    /// A `replan` verdict here means "escalate to the parent".
    pub async fn evaluate_escalation(
        &self,
        ctx: &ExecutionContext,
        input: &EscalationInput,
    ) -> Result<JudgeResult, AgentError> {
        let vars = BTreeMap::from([
            ("objective", input.objective.clone()),
            ("parent_step", input.parent_step.clone()),
            ("parent_plan", input.parent_plan.clone()),
            ("sub_plan", input.sub_plan.clone()),
            ("replan_reason", input.replan_reason.clone()),
        ]);
        self.run(
            ctx,
            ESCALATION_SYSTEM_PROMPT,
            render(ESCALATION_TASK_TEMPLATE, &vars),
        )
        .await
    }

    async fn run(
        &self,
        ctx: &ExecutionContext,
        system: &str,
        task: String,
    ) -> Result<JudgeResult, AgentError> {
        let args = Arguments::new().with("system", system).with("task", task);
        let run = self.agent.run(ctx, args).await?;
        Ok(serde_json::from_value(run.output)?)
    }
}
