//! Structural diffs between plan revisions.
//!
//! A [`PlanDiff`] ties a replanned plan to its predecessor: which steps
//! were added, removed, or changed, and why the revision happened. The
//! executor uses the delta to decide which prior step outputs survive.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Plan, PlanStep};

/// Before/after pair for a changed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepChange {
    /// The step as it was in the old plan.
    pub from: PlanStep,
    /// The step as it is in the new plan.
    pub to: PlanStep,
}

/// Added/removed/changed step sets keyed by step id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDelta {
    /// Steps present only in the new plan.
    #[serde(default)]
    pub added: BTreeMap<String, PlanStep>,
    /// Steps present only in the old plan.
    #[serde(default)]
    pub removed: BTreeMap<String, PlanStep>,
    /// Steps present in both but not equal.
    #[serde(default)]
    pub changed: BTreeMap<String, StepChange>,
}

impl StepDelta {
    /// Whether the delta records no differences.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Diff between two plan revisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDiff {
    /// Diff id.
    pub id: String,
    /// Id of the plan being replaced.
    pub from_plan_id: String,
    /// Id of the replacement plan.
    pub to_plan_id: String,
    /// Why the revision happened.
    pub reason: String,
    /// The step-level delta.
    #[serde(rename = "steps_delta")]
    pub steps: StepDelta,
}

impl PlanDiff {
    /// Compute the diff from `from` to `to`.
    #[must_use]
    pub fn between(from: &Plan, to: &Plan, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            from_plan_id: from.id.clone(),
            to_plan_id: to.id.clone(),
            reason: reason.into(),
            steps: compute_step_delta(Some(from), Some(to)),
        }
    }
}

/// Step equality for diffing purposes.
///
/// Two steps are equal iff id, name, instruction, expectation, the ordered
/// dependency list, and the sub-plan's text form all match. Sub-plan
/// comparison goes through the text form so cosmetic differences (ids,
/// timestamps) in nested plans do not count.
#[must_use]
pub fn steps_equal(a: &PlanStep, b: &PlanStep) -> bool {
    let sub_plan_text = |step: &PlanStep| step.plan.as_ref().map(Plan::text_form);
    a.id == b.id
        && a.name == b.name
        && a.instruction == b.instruction
        && a.expectation == b.expectation
        && a.dependencies == b.dependencies
        && sub_plan_text(a) == sub_plan_text(b)
}

/// Compute `added = new∖old`, `removed = old∖new`, and `changed` for ids
/// present in both plans with unequal steps.
///
/// Depends only on set membership and equality, never on iteration order.
#[must_use]
pub fn compute_step_delta(old: Option<&Plan>, new: Option<&Plan>) -> StepDelta {
    let old_steps: BTreeMap<&str, &PlanStep> = old
        .map(|p| p.steps.iter().map(|s| (s.id.as_str(), s)).collect())
        .unwrap_or_default();
    let new_steps: BTreeMap<&str, &PlanStep> = new
        .map(|p| p.steps.iter().map(|s| (s.id.as_str(), s)).collect())
        .unwrap_or_default();

    let mut delta = StepDelta::default();

    for (id, step) in &new_steps {
        match old_steps.get(id) {
            None => {
                delta.added.insert((*id).to_owned(), (*step).clone());
            }
            Some(previous) if !steps_equal(previous, step) => {
                delta.changed.insert(
                    (*id).to_owned(),
                    StepChange {
                        from: (*previous).clone(),
                        to: (*step).clone(),
                    },
                );
            }
            Some(_) => {}
        }
    }

    for (id, step) in &old_steps {
        if !new_steps.contains_key(id) {
            delta.removed.insert((*id).to_owned(), (*step).clone());
        }
    }

    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, instruction: &str) -> PlanStep {
        PlanStep::new(id, format!("step {id}"), instruction, "ok")
    }

    #[test]
    fn identical_plans_have_empty_delta() {
        let plan = Plan::with_id("p", vec![step("a", "do a"), step("b", "do b")]);
        let delta = compute_step_delta(Some(&plan), Some(&plan.clone()));
        assert!(delta.is_empty());
    }

    #[test]
    fn added_removed_changed_are_partitioned() {
        let old = Plan::with_id("old", vec![step("keep", "same"), step("gone", "x"), step("edit", "v1")]);
        let new = Plan::with_id("new", vec![step("keep", "same"), step("edit", "v2"), step("fresh", "y")]);

        let delta = compute_step_delta(Some(&old), Some(&new));
        assert_eq!(delta.added.keys().collect::<Vec<_>>(), vec!["fresh"]);
        assert_eq!(delta.removed.keys().collect::<Vec<_>>(), vec!["gone"]);
        assert_eq!(delta.changed.keys().collect::<Vec<_>>(), vec!["edit"]);
        assert_eq!(delta.changed["edit"].from.instruction, "v1");
        assert_eq!(delta.changed["edit"].to.instruction, "v2");
    }

    #[test]
    fn changed_contains_exactly_unequal_shared_ids() {
        let old = Plan::with_id("old", vec![step("a", "same"), step("b", "before")]);
        let new = Plan::with_id("new", vec![step("b", "after"), step("a", "same")]);

        let delta = compute_step_delta(Some(&old), Some(&new));
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
        assert_eq!(delta.changed.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn absent_plans_act_as_empty() {
        let plan = Plan::with_id("p", vec![step("a", "x")]);

        let delta = compute_step_delta(None, Some(&plan));
        assert_eq!(delta.added.len(), 1);
        assert!(delta.removed.is_empty());

        let delta = compute_step_delta(Some(&plan), None);
        assert_eq!(delta.removed.len(), 1);
        assert!(delta.added.is_empty());
    }

    mod equality {
        use super::*;

        #[test]
        fn dependency_order_matters() {
            let a = step("s", "i").depends_on(["x", "y"]);
            let b = step("s", "i").depends_on(["y", "x"]);
            assert!(!steps_equal(&a, &b));
        }

        #[test]
        fn sub_plan_compared_by_text_form() {
            let sub = |instruction: &str| Plan::with_id("sub", vec![step("inner", instruction)]);

            let a = step("s", "i").with_plan(sub("work"));
            let b = step("s", "i").with_plan(sub("work"));
            let c = step("s", "i").with_plan(sub("different"));

            assert!(steps_equal(&a, &b));
            assert!(!steps_equal(&a, &c));
            assert!(!steps_equal(&a, &step("s", "i")));
        }

        #[test]
        fn sub_plan_id_is_cosmetic() {
            let a = step("s", "i").with_plan(Plan::with_id("one", vec![step("x", "w")]));
            let b = step("s", "i").with_plan(Plan::with_id("two", vec![step("x", "w")]));
            assert!(steps_equal(&a, &b));
        }
    }

    #[test]
    fn plan_diff_between_records_endpoints() {
        let old = Plan::with_id("old", vec![step("a", "v1")]);
        let new = Plan::with_id("new", vec![step("a", "v2")]);
        let diff = PlanDiff::between(&old, &new, "judge asked for a rewrite");

        assert_eq!(diff.from_plan_id, "old");
        assert_eq!(diff.to_plan_id, "new");
        assert_eq!(diff.steps.changed.len(), 1);

        let json = serde_json::to_string(&diff).expect("serialize");
        assert!(json.contains("steps_delta"));
        let back: PlanDiff = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, diff);
    }
}
