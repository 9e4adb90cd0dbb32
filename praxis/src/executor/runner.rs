//! Step-runner construction.
//!
//! The runner is a conventional agent: the executor's tools, an identity
//! parser (raw text passes through as the step's output), and a prompt
//! template rendered once into a system message when the session is
//! fresh. Resumed sessions replay their conversation instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::agent::{Agent, AgentConfig};
use crate::message::Message;
use crate::model::CompletionModel;
use crate::plan::{Plan, PlanStep};
use crate::prompts::{STEP_RUNNER_TEMPLATE, describe_tools, render};
use crate::tool::ToolBox;

use super::report::DependencyOutput;

/// Build the agent that produces a leaf step's output.
pub(super) fn build_step_runner(
    model: Arc<dyn CompletionModel>,
    tools: ToolBox,
    runner_config: &AgentConfig,
    plan: &Plan,
    step: &PlanStep,
    objective: &str,
    dependency_outputs: &[DependencyOutput],
    prior_feedback: Option<&str>,
) -> Agent {
    let deps = if dependency_outputs.is_empty() {
        "(none)".to_string()
    } else {
        serde_json::to_string_pretty(dependency_outputs)
            .unwrap_or_else(|_| "(unavailable)".to_string())
    };
    let feedback = prior_feedback
        .map(|f| format!("\nFeedback on your previous attempt:\n{f}\n"))
        .unwrap_or_default();

    let vars = BTreeMap::from([
        ("objective", objective.to_string()),
        ("plan_id", plan.id.clone()),
        ("step_id", step.id.clone()),
        ("step_name", step.name.clone()),
        ("step_instruction", step.instruction.clone()),
        ("step_expectation", step.expectation.clone()),
        ("dependency_outputs", deps),
        ("prior_feedback", feedback),
        ("tools", describe_tools(&tools.descriptors())),
    ]);
    let prompt = render(STEP_RUNNER_TEMPLATE, &vars);

    let mut builder = Agent::builder()
        .name(format!("runner-{}", step.id))
        .description("Executes one plan step")
        .shared_model(model)
        .tools(tools)
        .max_iterations(runner_config.max_iterations)
        .tool_worker_cap(runner_config.tool_worker_cap)
        .tool_error_policy(runner_config.tool_error_policy.clone())
        .prepare_input(move |_args, _session| Ok(vec![Message::system(prompt.clone())]));
    if let Some(timeout) = runner_config.timeout {
        builder = builder.timeout(timeout);
    }
    if let Some(temperature) = runner_config.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(max_tokens) = runner_config.max_tokens {
        builder = builder.max_tokens(max_tokens);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arguments::Arguments;
    use crate::context::ExecutionContext;
    use crate::model::mock::MockModel;

    fn sample_plan() -> Plan {
        Plan::with_id(
            "p1",
            vec![
                PlanStep::new("s1", "gather", "collect the data", "a data set"),
                PlanStep::new("s2", "report", "write the report", "a report").depends_on(["s1"]),
            ],
        )
    }

    #[tokio::test]
    async fn renders_step_context_into_the_system_message() {
        let model = Arc::new(MockModel::new().then_text("the report"));
        let shared = Arc::clone(&model) as Arc<dyn CompletionModel>;
        let plan = sample_plan();
        let deps = vec![DependencyOutput {
            step_id: "s1".into(),
            step_name: "gather".into(),
            instruction: "collect the data".into(),
            output: "42 rows".into(),
        }];

        let runner = build_step_runner(
            shared,
            ToolBox::new(),
            &AgentConfig::new(),
            &plan,
            &plan.steps[1],
            "produce a report",
            &deps,
            Some("include totals"),
        );
        let ctx = ExecutionContext::new("test");
        let run = runner.run(&ctx, Arguments::new()).await.expect("run");
        assert_eq!(run.output_text(), "the report");

        let requests = model.requests();
        let system = &requests[0].messages[0].content;
        assert!(system.contains("produce a report"));
        assert!(system.contains("write the report"));
        assert!(system.contains("42 rows"));
        assert!(system.contains("include totals"));
        assert!(system.contains("(none)") || system.contains("tools"));
    }

    #[tokio::test]
    async fn resumed_sessions_replay_the_conversation() {
        let model = Arc::new(MockModel::new().then_text("first").then_text("second"));
        let shared = Arc::clone(&model) as Arc<dyn CompletionModel>;
        let plan = sample_plan();

        let runner = build_step_runner(
            shared,
            ToolBox::new(),
            &AgentConfig::new(),
            &plan,
            &plan.steps[0],
            "objective",
            &[],
            None,
        );
        let ctx = ExecutionContext::new("test");

        let run = runner.run(&ctx, Arguments::new()).await.expect("run");
        let mut session = run.session;
        session.append_user_message("go deeper");

        runner
            .resume(&ctx, session, Arguments::new())
            .await
            .expect("resume");

        let requests = model.requests();
        let replayed = &requests[1].messages;
        assert_eq!(replayed.last().map(|m| m.content.as_str()), Some("go deeper"));
        assert!(replayed.iter().any(|m| m.content == "first"));
    }
}
