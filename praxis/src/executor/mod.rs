//! The plan executor: a DAG scheduler with judge-gated steps.
//!
//! The executor walks a plan deterministically (first ready step in
//! declaration order), runs each leaf step through the step-runner agent,
//! judges every output, retries failed steps with the judge's feedback,
//! and swaps the plan on a replan verdict while preserving the outputs of
//! structurally unchanged steps. Steps with nested sub-plans delegate to a
//! recursive execution whose replans can escalate to the parent level.

mod replay;
mod report;
mod runner;

pub use replay::{apply_replan, instruction_hash};
pub use report::{
    Attempt, DependencyOutput, ExecutionReport, PlanTransition, StepExecution,
};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::agent::AgentConfig;
use crate::arguments::Arguments;
use crate::context::{ExecutionContext, NodeKind};
use crate::error::{AgentError, ExecutorError};
use crate::json_utils::unquote_json_string;
use crate::judge::{EscalationInput, Judge, JudgeInput, JudgeResult, Verdict};
use crate::model::CompletionModel;
use crate::plan::{Plan, PlanDiff};
use crate::planner::{PlanInput, Planner};
use crate::tool::{BoxedTool, Tool, ToolBox};

use runner::build_step_runner;

/// Marker prefix on errors that escalate a sub-plan replan to the parent.
const ESCALATION_PREFIX: &str = "escalated: ";

/// Configuration for plan execution.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Runner attempts per step before a fail verdict is terminal
    /// (default: 3).
    pub max_attempts_per_step: usize,
    /// Plan swaps allowed per execution level (default: 2).
    pub max_replans: usize,
    /// Wall-clock budget for one step as a whole: every runner attempt,
    /// its judgment, and any sub-plan recursion.
    pub step_timeout: Option<Duration>,
    /// Configuration applied to every step-runner agent.
    pub runner: AgentConfig,
}

impl ExecutorConfig {
    /// Default attempts per step.
    pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
    /// Default replan budget.
    pub const DEFAULT_MAX_REPLANS: usize = 2;

    /// Create a config with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts_per_step: Self::DEFAULT_MAX_ATTEMPTS,
            max_replans: Self::DEFAULT_MAX_REPLANS,
            step_timeout: None,
            runner: AgentConfig::new(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A fatal execution outcome carrying the partial report.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ExecutionFailure {
    /// What went wrong.
    pub error: ExecutorError,
    /// Everything that was recorded before the failure.
    pub report: Box<ExecutionReport>,
}

/// Outcome of executing one step, before the scheduler acts on it.
struct StepRun {
    record: StepExecution,
    new_plan: Option<Plan>,
    fatal: Option<ExecutorError>,
}

/// Mutable execution state threaded through the scheduler loop.
struct Run {
    plan: Plan,
    completed: HashSet<String>,
    outputs: HashMap<String, String>,
    transitions: Vec<PlanTransition>,
    steps: Vec<StepExecution>,
    replans: usize,
}

/// Executes plans: runner + judge per step, planner for repairs.
pub struct PlanExecutor {
    model: Arc<dyn CompletionModel>,
    tools: ToolBox,
    judge: Judge,
    planner: Option<Planner>,
    config: ExecutorConfig,
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("model", &self.model.model_id())
            .field("tools", &self.tools.names())
            .field("has_planner", &self.planner.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PlanExecutor {
    /// Create a new executor builder.
    #[must_use]
    pub fn builder() -> PlanExecutorBuilder {
        PlanExecutorBuilder::new()
    }

    /// Execute a plan against an objective.
    ///
    /// Returns the full [`ExecutionReport`] on success. Fatal outcomes
    /// (failed step, exhausted budgets, invalid replacement plans,
    /// cancellation) return an [`ExecutionFailure`] carrying the partial
    /// report recorded up to that point.
    #[instrument(skip(self, ctx, plan), fields(plan_id = %plan.id, steps = plan.steps.len()))]
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
        objective: &str,
    ) -> Result<ExecutionReport, ExecutionFailure> {
        let mut run = Run {
            plan: plan.clone(),
            completed: HashSet::new(),
            outputs: HashMap::new(),
            transitions: Vec::new(),
            steps: Vec::new(),
            replans: 0,
        };

        let result = self.execute_loop(ctx, objective, &mut run).await;
        let report = ExecutionReport {
            objective: objective.to_string(),
            plan_transitions: run.transitions,
            steps: run.steps,
            final_plan: run.plan,
            replans: run.replans,
        };

        match result {
            Ok(()) => Ok(report),
            Err(error) => Err(ExecutionFailure {
                error,
                report: Box::new(report),
            }),
        }
    }

    /// Plan with the configured planner, then execute.
    ///
    /// # Errors
    ///
    /// Fails with [`ExecutorError::PlannerUnavailable`] when no planner is
    /// configured; planning and execution errors propagate.
    pub async fn plan_and_execute(
        &self,
        ctx: &ExecutionContext,
        input: &PlanInput,
    ) -> Result<ExecutionReport, ExecutionFailure> {
        let planner = self.planner.as_ref().ok_or_else(|| ExecutionFailure {
            error: ExecutorError::PlannerUnavailable,
            report: Box::new(ExecutionReport {
                objective: input.objective.clone(),
                plan_transitions: Vec::new(),
                steps: Vec::new(),
                final_plan: Plan::new(Vec::new()),
                replans: 0,
            }),
        })?;

        let plan = planner
            .plan(ctx, input, &self.tools.descriptors())
            .await
            .map_err(|e| ExecutionFailure {
                error: e,
                report: Box::new(ExecutionReport {
                    objective: input.objective.clone(),
                    plan_transitions: Vec::new(),
                    steps: Vec::new(),
                    final_plan: Plan::new(Vec::new()),
                    replans: 0,
                }),
            })?;

        self.execute(ctx, &plan, &input.objective).await
    }

    async fn execute_loop(
        &self,
        ctx: &ExecutionContext,
        objective: &str,
        run: &mut Run,
    ) -> Result<(), ExecutorError> {
        run.plan.validate()?;
        let input = PlanInput::new(objective);

        while run.completed.len() < run.plan.steps.len() {
            ctx.checkpoint()?;

            // First ready step in plan order is the deterministic tie-break.
            let next = run
                .plan
                .next_steps(&run.completed)
                .iter()
                .map(|s| s.id.clone())
                .find(|id| !run.completed.contains(id));
            let Some(step_id) = next else {
                return Err(ExecutorError::NoExecutableSteps);
            };
            let Some(step) = run.plan.find_step(&step_id).cloned() else {
                return Err(ExecutorError::NoExecutableSteps);
            };

            let dependency_outputs: Vec<DependencyOutput> = step
                .dependencies
                .iter()
                .filter_map(|dep| {
                    run.outputs.get(dep).map(|output| {
                        let dep_step = run.plan.find_step(dep);
                        DependencyOutput {
                            step_id: dep.clone(),
                            step_name: dep_step.map(|s| s.name.clone()).unwrap_or_default(),
                            instruction: dep_step
                                .map(|s| s.instruction.clone())
                                .unwrap_or_default(),
                            output: output.clone(),
                        }
                    })
                })
                .collect();

            debug!(step = %step.id, deps = dependency_outputs.len(), "Executing step");
            let outcome = self
                .run_step_bounded(ctx, &run.plan, &step, objective, &dependency_outputs)
                .await?;

            let verdict = outcome.record.verdict;
            let error = outcome.record.error.clone();
            let last_output = outcome.record.last_output().map(ToString::to_string);
            run.steps.push(outcome.record);

            if let Some(fatal) = outcome.fatal {
                return Err(fatal);
            }

            match verdict {
                Some(Verdict::Pass) => {
                    run.completed.insert(step.id.clone());
                    if let Some(output) = last_output {
                        run.outputs.insert(step.id.clone(), output);
                    }
                    info!(step = %step.id, "Step passed");
                }
                Some(Verdict::Replan) => {
                    run.replans += 1;
                    if run.replans > self.config.max_replans {
                        return Err(ExecutorError::ReplanLimit {
                            limit: self.config.max_replans,
                        });
                    }

                    let new_plan = if let Some(feedback) =
                        error.as_deref().and_then(|e| e.strip_prefix(ESCALATION_PREFIX))
                    {
                        // A sub-plan asked to be rebuilt at this level.
                        info!(step = %step.id, "Escalated replan at parent level");
                        let planner =
                            self.planner.as_ref().ok_or(ExecutorError::PlannerUnavailable)?;
                        planner
                            .replan(ctx, &run.plan, feedback, &input, &self.tools.descriptors())
                            .await?
                    } else if let Some(plan) = outcome.new_plan {
                        plan
                    } else {
                        return Err(ExecutorError::PlannerUnavailable);
                    };

                    new_plan.validate()?;
                    run.transitions.push(PlanTransition {
                        from_plan_id: run.plan.id.clone(),
                        to_plan_id: new_plan.id.clone(),
                        diff: new_plan.revision_diff.clone(),
                    });

                    let delta = new_plan.revision_diff.as_ref().map(|d| &d.steps);
                    let (completed, outputs) = apply_replan(
                        &run.plan,
                        &new_plan,
                        delta,
                        &run.completed,
                        &run.outputs,
                    );
                    info!(
                        from = %run.plan.id,
                        to = %new_plan.id,
                        preserved = completed.len(),
                        "Plan replaced"
                    );
                    run.completed = completed;
                    run.outputs = outputs;
                    run.plan = new_plan;
                }
                Some(Verdict::Fail) | None => {
                    let justification = error.unwrap_or_else(|| "step failed".to_string());
                    return Err(ExecutorError::StepFailed {
                        step_id: step.id.clone(),
                        justification,
                    });
                }
            }
        }

        Ok(())
    }

    /// Run one step under the configured per-step wall-clock budget.
    ///
    /// The budget bounds the step as a whole, the way the agent loop's
    /// deadline bounds a single model call.
    async fn run_step_bounded(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
        step: &crate::plan::PlanStep,
        objective: &str,
        dependency_outputs: &[DependencyOutput],
    ) -> Result<StepRun, ExecutorError> {
        let Some(limit) = self.config.step_timeout else {
            return self
                .run_step(ctx, plan, step, objective, dependency_outputs)
                .await;
        };

        match tokio::time::timeout(
            limit,
            self.run_step(ctx, plan, step, objective, dependency_outputs),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(step = %step.id, ?limit, "Step exceeded its wall-clock budget");
                Err(ExecutorError::Agent(AgentError::DeadlineExceeded))
            }
        }
    }

    /// Execute one step: delegation for sub-plan steps, runner attempts
    /// for leaves.
    async fn run_step(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
        step: &crate::plan::PlanStep,
        objective: &str,
        dependency_outputs: &[DependencyOutput],
    ) -> Result<StepRun, ExecutorError> {
        let node = ctx.create_child_node(
            None,
            NodeKind::Step,
            &step.id,
            json!({ "name": step.name, "instruction": step.instruction }),
        )?;

        let outcome = if let Some(sub_plan) = &step.plan {
            self.run_sub_plan_step(ctx, plan, step, sub_plan, objective)
                .await
        } else {
            self.run_leaf_step(ctx, plan, step, objective, dependency_outputs)
                .await
        };

        match &outcome {
            Ok(run) => {
                if let Some(error) = &run.record.error {
                    ctx.set_error(node, error)?;
                } else {
                    ctx.set_output(
                        node,
                        json!({
                            "verdict": run.record.verdict,
                            "attempts": run.record.attempts.len(),
                        }),
                    )?;
                }
            }
            Err(e) => ctx.set_error(node, e)?,
        }
        outcome
    }

    async fn run_leaf_step(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
        step: &crate::plan::PlanStep,
        objective: &str,
        dependency_outputs: &[DependencyOutput],
    ) -> Result<StepRun, ExecutorError> {
        let mut attempts = Vec::new();
        let mut prior_feedback: Option<String> = None;

        for attempt_no in 1..=self.config.max_attempts_per_step.max(1) {
            ctx.checkpoint()?;
            let started = Utc::now();

            let runner = build_step_runner(
                Arc::clone(&self.model),
                self.tools.clone(),
                &self.config.runner,
                plan,
                step,
                objective,
                dependency_outputs,
                prior_feedback.as_deref(),
            );
            let agent_run = runner
                .run(ctx, Arguments::new().with("task", step.instruction.clone()))
                .await?;
            let output = unquote_json_string(&agent_run.output_text());

            let judge = self
                .judge
                .evaluate(
                    ctx,
                    &JudgeInput {
                        objective: objective.to_string(),
                        step_name: step.name.clone(),
                        instruction: step.instruction.clone(),
                        expectation: step.expectation.clone(),
                        output: output.clone(),
                        context: None,
                    },
                )
                .await
                .map_err(|e| ExecutorError::JudgeFailed {
                    step_id: step.id.clone(),
                    message: e.to_string(),
                })?;

            attempts.push(Attempt {
                attempt: attempt_no,
                started,
                ended: Utc::now(),
                output: output.clone(),
                judge: judge.clone(),
            });

            match judge.verdict {
                Verdict::Pass => {
                    return Ok(StepRun {
                        record: self.record(step, attempts, Some(Verdict::Pass), None, None),
                        new_plan: None,
                        fatal: None,
                    });
                }
                Verdict::Fail => {
                    warn!(step = %step.id, attempt = attempt_no, "Attempt judged fail");
                    prior_feedback = judge
                        .suggested_fix
                        .clone()
                        .or_else(|| Some(judge.justification.clone()));
                }
                Verdict::Replan => {
                    let new_plan = match &self.planner {
                        Some(planner) => {
                            let feedback = replan_feedback(&judge, &output);
                            Some(
                                planner
                                    .replan(
                                        ctx,
                                        plan,
                                        &feedback,
                                        &PlanInput::new(objective),
                                        &self.tools.descriptors(),
                                    )
                                    .await?,
                            )
                        }
                        None => None,
                    };
                    return Ok(StepRun {
                        record: self.record(step, attempts, Some(Verdict::Replan), None, None),
                        new_plan,
                        fatal: None,
                    });
                }
            }
        }

        let justification = attempts
            .last()
            .map(|a| a.judge.justification.clone())
            .unwrap_or_default();
        Ok(StepRun {
            record: self.record(
                step,
                attempts,
                Some(Verdict::Fail),
                Some(justification.clone()),
                None,
            ),
            new_plan: None,
            fatal: Some(ExecutorError::StepFailed {
                step_id: step.id.clone(),
                justification,
            }),
        })
    }

    async fn run_sub_plan_step(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
        step: &crate::plan::PlanStep,
        sub_plan: &Plan,
        objective: &str,
    ) -> Result<StepRun, ExecutorError> {
        let started = Utc::now();
        debug!(step = %step.id, sub_plan = %sub_plan.id, "Delegating to sub-plan");

        let sub_execution = Box::pin(self.execute(ctx, sub_plan, objective)).await;
        let (sub_report, sub_error) = match sub_execution {
            Ok(report) => (report, None),
            Err(failure) => (*failure.report, Some(failure.error)),
        };

        if let Some(error) = sub_error {
            let record = StepExecution {
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                attempts: Vec::new(),
                verdict: None,
                error: Some(error.to_string()),
                sub_report: Some(Box::new(sub_report)),
            };
            return Ok(StepRun {
                record,
                new_plan: None,
                fatal: Some(error),
            });
        }

        // The step's output is the JSON of the sub-report.
        let output = serde_json::to_string(&sub_report)
            .map_err(|e| ExecutorError::Agent(e.into()))?;

        let judge = self
            .judge
            .evaluate(
                ctx,
                &JudgeInput {
                    objective: objective.to_string(),
                    step_name: step.name.clone(),
                    instruction: step.instruction.clone(),
                    expectation: step.expectation.clone(),
                    output: output.clone(),
                    context: Some(format!(
                        "The step delegated its work to nested sub-plan '{}'.",
                        sub_plan.id
                    )),
                },
            )
            .await
            .map_err(|e| ExecutorError::JudgeFailed {
                step_id: step.id.clone(),
                message: e.to_string(),
            })?;

        let attempt = Attempt {
            attempt: 1,
            started,
            ended: Utc::now(),
            output: output.clone(),
            judge: judge.clone(),
        };
        let sub_report = Some(Box::new(sub_report));

        match judge.verdict {
            Verdict::Pass => Ok(StepRun {
                record: self.record(step, vec![attempt], Some(Verdict::Pass), None, sub_report),
                new_plan: None,
                fatal: None,
            }),
            Verdict::Fail => {
                let justification = judge.justification.clone();
                Ok(StepRun {
                    record: self.record(
                        step,
                        vec![attempt],
                        Some(Verdict::Fail),
                        Some(justification.clone()),
                        sub_report,
                    ),
                    new_plan: None,
                    fatal: Some(ExecutorError::StepFailed {
                        step_id: step.id.clone(),
                        justification,
                    }),
                })
            }
            Verdict::Replan => {
                self.resolve_sub_plan_replan(ctx, plan, step, sub_plan, objective, &judge, attempt, sub_report)
                    .await
            }
        }
    }

    /// Decide whether a sub-plan replan is handled locally or escalated.
    #[allow(clippy::too_many_arguments)]
    async fn resolve_sub_plan_replan(
        &self,
        ctx: &ExecutionContext,
        plan: &Plan,
        step: &crate::plan::PlanStep,
        sub_plan: &Plan,
        objective: &str,
        judge: &JudgeResult,
        attempt: Attempt,
        sub_report: Option<Box<ExecutionReport>>,
    ) -> Result<StepRun, ExecutorError> {
        let reason = replan_feedback(judge, "");

        let escalation = self
            .judge
            .evaluate_escalation(
                ctx,
                &EscalationInput {
                    objective: objective.to_string(),
                    parent_step: format!("{} ({}): {}", step.id, step.name, step.instruction),
                    parent_plan: plan.text_form(),
                    sub_plan: sub_plan.text_form(),
                    replan_reason: reason.clone(),
                },
            )
            .await
            .map_err(|e| ExecutorError::JudgeFailed {
                step_id: step.id.clone(),
                message: e.to_string(),
            })?;

        if escalation.verdict == Verdict::Replan {
            // Rebuild at the parent level: surface the escalation marker.
            let feedback = escalation
                .suggested_fix
                .clone()
                .unwrap_or_else(|| escalation.justification.clone());
            info!(step = %step.id, "Sub-plan replan escalated to parent");
            return Ok(StepRun {
                record: self.record(
                    step,
                    vec![attempt],
                    Some(Verdict::Replan),
                    Some(format!("{ESCALATION_PREFIX}{feedback}")),
                    sub_report,
                ),
                new_plan: None,
                fatal: None,
            });
        }

        // Local rebuild: replan the sub-plan in place on the parent plan.
        let planner = self.planner.as_ref().ok_or(ExecutorError::PlannerUnavailable)?;
        let new_sub = planner
            .replan(
                ctx,
                sub_plan,
                &reason,
                &PlanInput::new(objective),
                &self.tools.descriptors(),
            )
            .await?;
        let sub_diff = new_sub.revision_diff.clone();

        let mut new_parent = plan.clone();
        if let Some(parent_step) = new_parent.find_step_mut(&step.id) {
            parent_step.plan = Some(new_sub);
        }
        new_parent.revision_diff = sub_diff.or_else(|| {
            Some(PlanDiff::between(plan, &new_parent, reason.clone()))
        });

        info!(step = %step.id, "Sub-plan replanned in place");
        Ok(StepRun {
            record: self.record(step, vec![attempt], Some(Verdict::Replan), None, sub_report),
            new_plan: Some(new_parent),
            fatal: None,
        })
    }

    fn record(
        &self,
        step: &crate::plan::PlanStep,
        attempts: Vec<Attempt>,
        verdict: Option<Verdict>,
        error: Option<String>,
        sub_report: Option<Box<ExecutionReport>>,
    ) -> StepExecution {
        StepExecution {
            step_id: step.id.clone(),
            step_name: step.name.clone(),
            attempts,
            verdict,
            error,
            sub_report,
        }
    }
}

/// Feedback string handed to the planner on a replan verdict.
fn replan_feedback(judge: &JudgeResult, output: &str) -> String {
    let mut feedback = judge.justification.clone();
    if let Some(fix) = &judge.suggested_fix {
        feedback.push(' ');
        feedback.push_str(fix);
    }
    if !output.is_empty() {
        feedback.push_str("\nLast output: ");
        feedback.push_str(output);
    }
    feedback
}

/// Builder for [`PlanExecutor`].
#[derive(Default)]
pub struct PlanExecutorBuilder {
    model: Option<Arc<dyn CompletionModel>>,
    judge: Option<Judge>,
    planner: Option<Planner>,
    tools: ToolBox,
    config: ExecutorConfig,
}

impl std::fmt::Debug for PlanExecutorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutorBuilder")
            .field("has_model", &self.model.is_some())
            .field("has_planner", &self.planner.is_some())
            .finish_non_exhaustive()
    }
}

impl PlanExecutorBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ExecutorConfig::new(),
            ..Self::default()
        }
    }

    /// Set the step-runner model.
    #[must_use]
    pub fn model(mut self, model: impl CompletionModel + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    /// Set an already-shared step-runner model.
    #[must_use]
    pub fn shared_model(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the judge. Defaults to a judge on the runner model.
    #[must_use]
    pub fn judge(mut self, judge: Judge) -> Self {
        self.judge = Some(judge);
        self
    }

    /// Set the planner, enabling replans.
    #[must_use]
    pub fn planner(mut self, planner: Planner) -> Self {
        self.planner = Some(planner);
        self
    }

    /// Add a tool available to step runners.
    #[must_use]
    pub fn tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.add(tool);
        self
    }

    /// Add a shared tool.
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

    /// Set runner attempts per step.
    #[must_use]
    pub const fn max_attempts_per_step(mut self, attempts: usize) -> Self {
        self.config.max_attempts_per_step = attempts;
        self
    }

    /// Set the replan budget.
    #[must_use]
    pub const fn max_replans(mut self, replans: usize) -> Self {
        self.config.max_replans = replans;
        self
    }

    /// Set the wall-clock budget for each step.
    #[must_use]
    pub const fn step_timeout(mut self, timeout: Duration) -> Self {
        self.config.step_timeout = Some(timeout);
        self
    }

    /// Set the configuration applied to step-runner agents.
    #[must_use]
    pub fn runner_config(mut self, config: AgentConfig) -> Self {
        self.config.runner = config;
        self
    }

    /// Build the executor.
    ///
    /// # Panics
    ///
    /// Panics if no model is provided. Use [`try_build`](Self::try_build)
    /// for a fallible alternative.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(self) -> PlanExecutor {
        self.try_build().expect("executor configuration is invalid")
    }

    /// Try to build the executor, failing on invalid configuration.
    pub fn try_build(self) -> Result<PlanExecutor, ExecutorError> {
        let model = self
            .model
            .ok_or_else(|| ExecutorError::Agent(AgentError::configuration("Model is required")))?;
        let judge = self
            .judge
            .unwrap_or_else(|| Judge::new(Arc::clone(&model)));

        Ok(PlanExecutor {
            model,
            tools: self.tools,
            judge,
            planner: self.planner,
            config: self.config,
        })
    }
}
