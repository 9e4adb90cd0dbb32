//! Built-in prompt templates for the planner, judge, and step runner.
//!
//! Templates use `{{key}}` placeholders filled by [`render`]. External
//! template engines stay out of scope; hosts that want their own prompts
//! supply custom `prepare_input` closures on the agents instead.

use std::collections::BTreeMap;

/// Fill `{{key}}` placeholders in `template` from `vars`.
///
/// Unknown placeholders are left in place so a malformed template is
/// visible in the rendered prompt rather than silently blanked.
#[must_use]
pub fn render(template: &str, vars: &BTreeMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), value);
    }
    out
}

/// Render tool descriptors as a prompt-friendly list.
#[must_use]
pub fn describe_tools(tools: &[crate::model::ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "(none)".to_string();
    }
    tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// System prompt for the planning agent.
pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are a meticulous planning agent. You convert an objective into a step-by-step plan in a strict JSON format.

Respond with a single JSON object and nothing else:
{
  "steps": [
    {
      "id": "s1",
      "name": "short name",
      "instruction": "a fully self-contained instruction for the executor",
      "expectation": "what the step's output must contain to count as done",
      "dependencies": []
    }
  ]
}

Rules:
1. Each step's instruction must be 100% self-contained: the executor sees nothing but the instruction and the outputs of its dependencies.
2. "dependencies" lists the ids of steps whose outputs this step needs. Only reference ids defined in this plan. Never create cycles.
3. Prefer few, substantial steps over many trivial ones.
4. State the expectation precisely enough that an independent reviewer can verify the output against it."#;

/// Task template for an initial plan request.
pub const PLANNER_TASK_TEMPLATE: &str = r"The executor has these tools available:
{{tools}}

Context:
{{context}}

Create a JSON plan for this objective:
{{objective}}";

/// Task template for a replan request.
pub const REPLANNER_TASK_TEMPLATE: &str = r"The executor has these tools available:
{{tools}}

The current plan:
{{plan}}

Execution feedback that made this plan insufficient:
{{feedback}}

Context:
{{context}}

Produce a complete replacement JSON plan for the objective below. Keep steps that are still correct (same id and instruction) so finished work is preserved, and change or replace the rest.

Objective:
{{objective}}";

/// Reminder appended when the planner's reply was not valid plan JSON.
pub const PLAN_SCHEMA_REMINDER: &str = r#"Your previous reply was not a valid plan. Respond with only a JSON object of the form {"steps": [{"id": "...", "name": "...", "instruction": "...", "expectation": "...", "dependencies": ["..."]}]} and no other text."#;

/// System prompt for the judge agent.
pub const JUDGE_SYSTEM_PROMPT: &str = r#"You are a strict reviewer. You are shown a step of a larger plan and the output it produced, and you decide whether the output satisfies the step's expectation.

Respond with a single JSON object and nothing else:
{
  "verdict": "pass" | "fail" | "replan",
  "justification": "why you reached this verdict",
  "suggested_fix": "how to do better (optional)"
}

Verdicts:
- "pass": the output satisfies the expectation.
- "fail": the output does not satisfy the expectation, but retrying this step could.
- "replan": the step itself is the problem; the plan needs to change.

"justification" must never be empty."#;

/// Task template for a judge request.
pub const JUDGE_TASK_TEMPLATE: &str = r"Objective: {{objective}}
Step: {{step_name}}
Instruction: {{instruction}}
Expectation: {{expectation}}
{{context}}
Output to review:
{{output}}";

/// System prompt for the judge's escalation mode.
///
/// The JSON schema is unchanged; the verdict meaning is remapped:
/// "replan" means rebuild at the parent level, "pass"/"fail" mean a local
/// replan of the sub-plan suffices.
pub const ESCALATION_SYSTEM_PROMPT: &str = r#"You are a strict reviewer deciding where a failed delegation should be repaired.

A step of a parent plan delegated its work to a nested sub-plan, and a reviewer has decided the sub-plan must be rebuilt. Decide whether rebuilding the sub-plan locally can succeed, or whether the parent plan itself must change.

Respond with a single JSON object and nothing else:
{
  "verdict": "pass" | "fail" | "replan",
  "justification": "why you reached this verdict",
  "suggested_fix": "guidance for the rebuild (optional)"
}

Verdicts:
- "replan": escalate; the parent plan must be rebuilt.
- "pass" or "fail": a local rebuild of the sub-plan suffices.

"justification" must never be empty."#;

/// Task template for an escalation judgment.
pub const ESCALATION_TASK_TEMPLATE: &str = r"Objective: {{objective}}
Parent step: {{parent_step}}
Parent plan:
{{parent_plan}}
Delegated sub-plan:
{{sub_plan}}
Why the sub-plan was judged insufficient:
{{replan_reason}}";

/// Reminder appended when the judge's reply was not valid verdict JSON.
pub const JUDGE_SCHEMA_REMINDER: &str = r#"Your previous reply was not a valid verdict. Respond with only a JSON object of the form {"verdict": "pass" | "fail" | "replan", "justification": "...", "suggested_fix": "..."} with a non-empty justification and no other text."#;

/// Prompt template for the step runner.
pub const STEP_RUNNER_TEMPLATE: &str = r"You are an execution agent working on one step of a larger plan.

Objective: {{objective}}
Plan: {{plan_id}}
Step: {{step_id}} ({{step_name}})

Instruction:
{{step_instruction}}

Your output must satisfy this expectation:
{{step_expectation}}

Outputs of the steps this one depends on:
{{dependency_outputs}}
{{prior_feedback}}
You may use these tools:
{{tools}}

Carry out the instruction. When you are done, reply with the step's output and nothing else.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_known_keys() {
        let vars = BTreeMap::from([("name", "world".to_string())]);
        assert_eq!(render("hello {{name}}", &vars), "hello world");
    }

    #[test]
    fn render_leaves_unknown_keys_visible() {
        let vars = BTreeMap::new();
        assert_eq!(render("hello {{name}}", &vars), "hello {{name}}");
    }

    #[test]
    fn render_replaces_repeated_keys() {
        let vars = BTreeMap::from([("x", "1".to_string())]);
        assert_eq!(render("{{x}}+{{x}}", &vars), "1+1");
    }
}
