//! Execution reports: what a plan run did, attempt by attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::judge::{JudgeResult, Verdict};
use crate::plan::{Plan, PlanDiff};

/// A dependency's recorded output, handed to the step runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyOutput {
    /// Id of the dependency step.
    pub step_id: String,
    /// Name of the dependency step.
    pub step_name: String,
    /// The dependency's instruction, for context.
    pub instruction: String,
    /// The output it produced.
    pub output: String,
}

/// One runner attempt and its judgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number.
    pub attempt: usize,
    /// When the attempt started.
    pub started: DateTime<Utc>,
    /// When the attempt (including judging) ended.
    pub ended: DateTime<Utc>,
    /// The runner's normalized output.
    pub output: String,
    /// The judge's decision on this output.
    pub judge: JudgeResult,
}

/// Execution record of one plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepExecution {
    /// The step's id.
    pub step_id: String,
    /// The step's name.
    pub step_name: String,
    /// Attempts in order; sub-plan steps record one synthesized attempt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<Attempt>,
    /// Final verdict for the step, absent when execution aborted before
    /// any judgment.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub verdict: Option<Verdict>,
    /// Error recorded for the step (judge failures, escalation markers).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    /// Report of the nested sub-plan, for delegating steps.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sub_report: Option<Box<ExecutionReport>>,
}

impl StepExecution {
    /// The output of the last attempt, if any.
    #[must_use]
    pub fn last_output(&self) -> Option<&str> {
        self.attempts.last().map(|a| a.output.as_str())
    }
}

/// One plan swap performed during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanTransition {
    /// Plan id before the swap.
    pub from_plan_id: String,
    /// Plan id after the swap.
    pub to_plan_id: String,
    /// The revision diff, when the planner produced one.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diff: Option<PlanDiff>,
}

/// The full record of a plan execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// The objective the plan served.
    pub objective: String,
    /// Plan swaps in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plan_transitions: Vec<PlanTransition>,
    /// Per-step execution records, in execution order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepExecution>,
    /// The plan as it stood when execution ended.
    pub final_plan: Plan,
    /// How many replans were performed.
    pub replans: usize,
}

impl ExecutionReport {
    /// Find a step's record by id (the latest one, if it ran twice across
    /// replans).
    #[must_use]
    pub fn step(&self, step_id: &str) -> Option<&StepExecution> {
        self.steps.iter().rev().find(|s| s.step_id == step_id)
    }
}
