//! The planner: an agent that decomposes an objective into a plan.
//!
//! The planner prompts its model with the objective and the executor's
//! tool advertisement, parses the strict `{"steps": [...]}` contract, and
//! validates the result structurally before handing it back. Replanning
//! additionally ties the new plan to its predecessor with a
//! [`PlanDiff`](crate::plan::PlanDiff).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::{Agent, JsonRetryExtractor};
use crate::arguments::Arguments;
use crate::context::ExecutionContext;
use crate::error::{AgentError, ExecutorError};
use crate::json_utils::first_json_object;
use crate::message::Message;
use crate::model::{CompletionModel, ToolDescriptor};
use crate::plan::{Plan, PlanDiff, PlanStep};
use crate::prompts::{
    PLAN_SCHEMA_REMINDER, PLANNER_SYSTEM_PROMPT, PLANNER_TASK_TEMPLATE,
    REPLANNER_TASK_TEMPLATE, describe_tools, render,
};

/// Input to a planning request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInput {
    /// What to accomplish.
    pub objective: String,
    /// Extra context for the planner.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub context: Option<String>,
}

impl PlanInput {
    /// Create an input with just an objective.
    #[must_use]
    pub fn new(objective: impl Into<String>) -> Self {
        Self {
            objective: objective.into(),
            context: None,
        }
    }

    /// Attach context.
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// The wire shape the model must produce.
#[derive(Debug, Serialize, Deserialize)]
struct PlanSpec {
    steps: Vec<PlanStepSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PlanStepSpec {
    id: String,
    #[serde(default)]
    name: String,
    instruction: String,
    #[serde(default)]
    expectation: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

impl From<PlanStepSpec> for PlanStep {
    fn from(spec: PlanStepSpec) -> Self {
        Self {
            id: spec.id,
            name: spec.name,
            instruction: spec.instruction,
            expectation: spec.expectation,
            dependencies: spec.dependencies,
            plan: None,
        }
    }
}

fn parse_plan_spec(text: &str) -> Result<serde_json::Value, AgentError> {
    let object = first_json_object(text)
        .ok_or_else(|| AgentError::parsing(text, "no JSON object found"))?;
    let spec: PlanSpec =
        serde_json::from_str(object).map_err(|e| AgentError::parsing(object, e.to_string()))?;
    if spec.steps.is_empty() {
        return Err(AgentError::parsing(object, "plan must contain at least one step"));
    }
    Ok(serde_json::to_value(spec)?)
}

/// A specialized agent producing [`Plan`]s and revisions of them.
#[derive(Debug)]
pub struct Planner {
    agent: Agent,
}

impl Planner {
    /// Default bound on schema-retry iterations.
    pub const DEFAULT_MAX_RETRIES: usize = 3;

    /// Create a planner on the given model with default retries.
    #[must_use]
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self::with_max_retries(model, Self::DEFAULT_MAX_RETRIES)
    }

    /// Create a planner with an explicit retry budget.
    #[must_use]
    pub fn with_max_retries(model: Arc<dyn CompletionModel>, max_retries: usize) -> Self {
        let agent = Agent::builder()
            .name("planner")
            .description("Decomposes objectives into dependency-ordered plans")
            .shared_model(model)
            .max_iterations(max_retries)
            .prepare_input(|args: &Arguments, _session| {
                let task = args.get_str("task").unwrap_or_default().to_string();
                Ok(vec![
                    Message::system(PLANNER_SYSTEM_PROMPT.to_string()),
                    Message::user(task),
                ])
            })
            .extractor(Arc::new(JsonRetryExtractor::new(
                Arc::new(parse_plan_spec),
                PLAN_SCHEMA_REMINDER,
            )))
            .build();
        Self { agent }
    }

    /// Produce a plan for an objective.
    ///
    /// # Errors
    ///
    /// [`ExecutorError::Agent`] when the model never produces parseable
    /// plan JSON; [`ExecutorError::InvalidPlan`] when the parsed plan
    /// fails structural validation.
    pub async fn plan(
        &self,
        ctx: &ExecutionContext,
        input: &PlanInput,
        tools: &[ToolDescriptor],
    ) -> Result<Plan, ExecutorError> {
        let vars = BTreeMap::from([
            ("tools", describe_tools(tools)),
            ("context", input.context.clone().unwrap_or_default()),
            ("objective", input.objective.clone()),
        ]);
        let plan = self
            .request_plan(ctx, render(PLANNER_TASK_TEMPLATE, &vars))
            .await?;
        info!(plan_id = %plan.id, steps = plan.steps.len(), "Plan produced");
        Ok(plan)
    }

    /// Produce a replacement for `current`, carrying a revision diff.
    ///
    /// The diff's reason is the feedback that triggered the replan.
    pub async fn replan(
        &self,
        ctx: &ExecutionContext,
        current: &Plan,
        feedback: &str,
        input: &PlanInput,
        tools: &[ToolDescriptor],
    ) -> Result<Plan, ExecutorError> {
        let vars = BTreeMap::from([
            ("tools", describe_tools(tools)),
            ("plan", current.text_form()),
            ("feedback", feedback.to_string()),
            ("context", input.context.clone().unwrap_or_default()),
            ("objective", input.objective.clone()),
        ]);
        let mut plan = self
            .request_plan(ctx, render(REPLANNER_TASK_TEMPLATE, &vars))
            .await?;
        plan.revision_diff = Some(PlanDiff::between(current, &plan, feedback));
        info!(
            from = %current.id,
            to = %plan.id,
            steps = plan.steps.len(),
            "Replan produced"
        );
        Ok(plan)
    }

    async fn request_plan(
        &self,
        ctx: &ExecutionContext,
        task: String,
    ) -> Result<Plan, ExecutorError> {
        let args = Arguments::new().with("task", task);
        let run = self.agent.run(ctx, args).await.map_err(ExecutorError::Agent)?;
        let spec: PlanSpec =
            serde_json::from_value(run.output).map_err(AgentError::Json)?;
        let plan = Plan::new(spec.steps.into_iter().map(PlanStep::from).collect());
        plan.validate()?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock::MockModel;

    const PLAN_JSON: &str = r#"{"steps": [
        {"id": "s1", "name": "gather", "instruction": "collect the data", "expectation": "a data set", "dependencies": []},
        {"id": "s2", "name": "report", "instruction": "write the report", "expectation": "a report", "dependencies": ["s1"]}
    ]}"#;

    #[tokio::test]
    async fn parses_and_validates_a_plan() {
        let model = Arc::new(MockModel::new().then_text(PLAN_JSON));
        let planner = Planner::new(model);
        let ctx = ExecutionContext::new("test");

        let plan = planner
            .plan(&ctx, &PlanInput::new("produce a report"), &[])
            .await
            .expect("plan");
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].dependencies, vec!["s1"]);
        assert!(plan.revision_diff.is_none());
    }

    #[tokio::test]
    async fn retries_on_malformed_json() {
        let model = Arc::new(
            MockModel::new()
                .then_text("working on it")
                .then_text(PLAN_JSON),
        );
        let shared = Arc::clone(&model) as Arc<dyn CompletionModel>;
        let planner = Planner::new(shared);
        let ctx = ExecutionContext::new("test");

        let plan = planner
            .plan(&ctx, &PlanInput::new("produce a report"), &[])
            .await
            .expect("plan");
        assert_eq!(plan.steps.len(), 2);
        assert!(model.request_count() >= 2);
    }

    #[tokio::test]
    async fn structurally_invalid_plan_is_a_typed_error() {
        let bad = r#"{"steps": [{"id": "s1", "instruction": "x", "dependencies": ["ghost"]}]}"#;
        let model = Arc::new(MockModel::new().then_text(bad));
        let planner = Planner::new(model);
        let ctx = ExecutionContext::new("test");

        let err = planner
            .plan(&ctx, &PlanInput::new("anything"), &[])
            .await
            .expect_err("must fail");
        assert!(matches!(err, ExecutorError::InvalidPlan(_)));
    }

    #[tokio::test]
    async fn replan_carries_a_revision_diff() {
        let replacement = r#"{"steps": [
            {"id": "s1", "name": "gather", "instruction": "collect the data", "expectation": "a data set", "dependencies": []},
            {"id": "s2", "name": "report", "instruction": "write a longer report", "expectation": "a report", "dependencies": ["s1"]}
        ]}"#;
        let model = Arc::new(MockModel::new().then_text(PLAN_JSON).then_text(replacement));
        let shared = Arc::clone(&model) as Arc<dyn CompletionModel>;
        let planner = Planner::new(shared);
        let ctx = ExecutionContext::new("test");
        let input = PlanInput::new("produce a report");

        let original = planner.plan(&ctx, &input, &[]).await.expect("plan");
        let revised = planner
            .replan(&ctx, &original, "the report was too thin", &input, &[])
            .await
            .expect("replan");

        let diff = revised.revision_diff.expect("diff");
        assert_eq!(diff.from_plan_id, original.id);
        assert_eq!(diff.to_plan_id, revised.id);
        assert_eq!(diff.reason, "the report was too thin");
        assert_eq!(diff.steps.changed.keys().collect::<Vec<_>>(), vec!["s2"]);
    }
}
