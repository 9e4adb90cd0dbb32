//! Plan data model: a DAG of steps with optional nested sub-plans.
//!
//! Steps reference their dependencies by sibling id within the owning
//! plan, so plans stay tree-shaped values; validation rejects unknown
//! references, cycles, and circular sub-plan inclusion.

pub mod diff;

pub use diff::{PlanDiff, StepChange, StepDelta, compute_step_delta, steps_equal};

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PlanError;

/// A unit of work inside a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Step id, unique within the owning plan.
    pub id: String,
    /// Short human-readable name.
    pub name: String,
    /// What the runner should do.
    pub instruction: String,
    /// What the judge should expect from the output.
    pub expectation: String,
    /// Ids of sibling steps that must complete first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Optional nested sub-plan executed as this step's body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
}

impl PlanStep {
    /// Create a leaf step.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        instruction: impl Into<String>,
        expectation: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            instruction: instruction.into(),
            expectation: expectation.into(),
            dependencies: Vec::new(),
            plan: None,
        }
    }

    /// Declare dependencies on sibling steps.
    #[must_use]
    pub fn depends_on(mut self, dependencies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Attach a nested sub-plan.
    #[must_use]
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }
}

/// A DAG of steps, optionally tied to the plan it revised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan id.
    pub id: String,
    /// Steps in declaration order.
    pub steps: Vec<PlanStep>,
    /// When the plan was produced.
    pub created_at: DateTime<Utc>,
    /// Diff against the plan this one replaced, when it is a revision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision_diff: Option<PlanDiff>,
}

impl Plan {
    /// Create a plan with a fresh id.
    #[must_use]
    pub fn new(steps: Vec<PlanStep>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            steps,
            created_at: Utc::now(),
            revision_diff: None,
        }
    }

    /// Create a plan with a caller-chosen id.
    #[must_use]
    pub fn with_id(id: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            id: id.into(),
            steps,
            created_at: Utc::now(),
            revision_diff: None,
        }
    }

    /// Find a step by id. Plans are small; a linear scan is fine.
    #[must_use]
    pub fn find_step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Mutable lookup by id.
    pub fn find_step_mut(&mut self, id: &str) -> Option<&mut PlanStep> {
        self.steps.iter_mut().find(|s| s.id == id)
    }

    /// Every step whose dependencies are all in `completed`, in plan order.
    ///
    /// Already-completed steps are not filtered here; callers subtract
    /// their completed set.
    #[must_use]
    pub fn next_steps(&self, completed: &HashSet<String>) -> Vec<&PlanStep> {
        self.steps
            .iter()
            .filter(|s| s.dependencies.iter().all(|d| completed.contains(d)))
            .collect()
    }

    /// Validate the plan and every nested sub-plan.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut ancestry = HashSet::new();
        self.validate_inner(&mut ancestry)
    }

    fn validate_inner(&self, ancestry: &mut HashSet<String>) -> Result<(), PlanError> {
        if !ancestry.insert(self.id.clone()) {
            return Err(PlanError::CircularSubPlan {
                plan_id: self.id.clone(),
            });
        }

        let mut ids = HashSet::new();
        for step in &self.steps {
            if step.id.is_empty() {
                return Err(PlanError::EmptyStepId);
            }
            if !ids.insert(step.id.as_str()) {
                return Err(PlanError::DuplicateStepId {
                    id: step.id.clone(),
                });
            }
        }

        for step in &self.steps {
            for dependency in &step.dependencies {
                if dependency == &step.id {
                    return Err(PlanError::SelfDependency {
                        id: step.id.clone(),
                    });
                }
                if !ids.contains(dependency.as_str()) {
                    return Err(PlanError::UnknownDependency {
                        step: step.id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        self.check_cycles()?;

        for step in &self.steps {
            if let Some(plan) = &step.plan {
                plan.validate_inner(ancestry)?;
            }
        }

        ancestry.remove(&self.id);
        Ok(())
    }

    /// DFS with a recursion stack over dependency edges.
    fn check_cycles(&self) -> Result<(), PlanError> {
        const UNVISITED: u8 = 0;
        const IN_STACK: u8 = 1;
        const DONE: u8 = 2;

        let index: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();
        let mut state = vec![UNVISITED; self.steps.len()];

        fn visit(
            current: usize,
            steps: &[PlanStep],
            index: &HashMap<&str, usize>,
            state: &mut [u8],
        ) -> Result<(), PlanError> {
            state[current] = IN_STACK;
            for dependency in &steps[current].dependencies {
                let Some(&next) = index.get(dependency.as_str()) else {
                    continue;
                };
                match state[next] {
                    IN_STACK => {
                        return Err(PlanError::DependencyCycle {
                            id: steps[next].id.clone(),
                        });
                    }
                    UNVISITED => visit(next, steps, index, state)?,
                    _ => {}
                }
            }
            state[current] = DONE;
            Ok(())
        }

        for i in 0..self.steps.len() {
            if state[i] == UNVISITED {
                visit(i, &self.steps, &index, &mut state)?;
            }
        }
        Ok(())
    }

    /// Kahn topological sort over the dependency edges.
    ///
    /// Ready steps are taken in declaration order, so the result is
    /// deterministic. Fails when nodes with unresolved in-degree remain.
    pub fn execution_order(&self) -> Result<Vec<&PlanStep>, PlanError> {
        let index: HashMap<&str, usize> = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; self.steps.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.steps.len()];
        for (i, step) in self.steps.iter().enumerate() {
            for dependency in &step.dependencies {
                if let Some(&d) = index.get(dependency.as_str()) {
                    in_degree[i] += 1;
                    dependents[d].push(i);
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..self.steps.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.steps.len());

        while let Some(i) = queue.pop_front() {
            order.push(&self.steps[i]);
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if order.len() != self.steps.len() {
            let remaining = self
                .steps
                .iter()
                .enumerate()
                .find(|(i, _)| in_degree[*i] > 0)
                .map(|(_, s)| s.id.clone())
                .unwrap_or_default();
            return Err(PlanError::DependencyCycle { id: remaining });
        }
        Ok(order)
    }

    /// Every step in this plan and, depth-first, in its sub-plans.
    #[must_use]
    pub fn all_steps_recursive(&self) -> Vec<&PlanStep> {
        let mut out = Vec::new();
        for step in &self.steps {
            out.push(step);
            if let Some(plan) = &step.plan {
                out.extend(plan.all_steps_recursive());
            }
        }
        out
    }

    /// Stable textual rendering, used for sub-plan equality and prompting.
    #[must_use]
    pub fn text_form(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        out
    }

    fn render(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        for step in &self.steps {
            let _ = writeln!(
                out,
                "{indent}{} | {} | {} | {} | deps={}",
                step.id,
                step.name,
                step.instruction,
                step.expectation,
                step.dependencies.join(",")
            );
            if let Some(plan) = &step.plan {
                plan.render(out, depth + 1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, deps: &[&str]) -> PlanStep {
        PlanStep::new(id, format!("step {id}"), format!("do {id}"), "ok")
            .depends_on(deps.iter().copied())
    }

    fn diamond() -> Plan {
        Plan::with_id(
            "p1",
            vec![
                step("a", &[]),
                step("b", &["a"]),
                step("c", &["a"]),
                step("d", &["b", "c"]),
            ],
        )
    }

    mod validation {
        use super::*;
        use crate::error::PlanError;

        #[test]
        fn valid_dag_passes() {
            assert!(diamond().validate().is_ok());
        }

        #[test]
        fn empty_id_rejected() {
            let plan = Plan::new(vec![step("", &[])]);
            assert_eq!(plan.validate(), Err(PlanError::EmptyStepId));
        }

        #[test]
        fn duplicate_id_rejected() {
            let plan = Plan::new(vec![step("a", &[]), step("a", &[])]);
            assert!(matches!(
                plan.validate(),
                Err(PlanError::DuplicateStepId { .. })
            ));
        }

        #[test]
        fn unknown_dependency_rejected() {
            let plan = Plan::new(vec![step("a", &["ghost"])]);
            assert!(matches!(
                plan.validate(),
                Err(PlanError::UnknownDependency { .. })
            ));
        }

        #[test]
        fn self_dependency_rejected() {
            let plan = Plan::new(vec![step("a", &["a"])]);
            assert!(matches!(
                plan.validate(),
                Err(PlanError::SelfDependency { .. })
            ));
        }

        #[test]
        fn cycle_rejected() {
            let plan = Plan::new(vec![step("a", &["b"]), step("b", &["a"])]);
            assert!(matches!(
                plan.validate(),
                Err(PlanError::DependencyCycle { .. })
            ));
        }

        #[test]
        fn circular_sub_plan_rejected() {
            let inner = Plan::with_id("outer", vec![step("x", &[])]);
            let plan = Plan::with_id("outer", vec![step("a", &[]).with_plan(inner)]);
            assert!(matches!(
                plan.validate(),
                Err(PlanError::CircularSubPlan { .. })
            ));
        }

        #[test]
        fn sub_plans_validated_recursively() {
            let bad_inner = Plan::with_id("inner", vec![step("x", &["x"])]);
            let plan = Plan::with_id("outer", vec![step("a", &[]).with_plan(bad_inner)]);
            assert!(matches!(
                plan.validate(),
                Err(PlanError::SelfDependency { .. })
            ));
        }

        #[test]
        fn sibling_sub_plans_with_distinct_ids_pass() {
            let plan = Plan::with_id(
                "outer",
                vec![
                    step("a", &[]).with_plan(Plan::with_id("inner-a", vec![step("x", &[])])),
                    step("b", &[]).with_plan(Plan::with_id("inner-b", vec![step("y", &[])])),
                ],
            );
            assert!(plan.validate().is_ok());
        }
    }

    mod ordering {
        use super::*;

        #[test]
        fn execution_order_respects_dependencies() {
            let plan = diamond();
            let order: Vec<&str> = plan
                .execution_order()
                .expect("order")
                .iter()
                .map(|s| s.id.as_str())
                .collect();
            assert_eq!(order, vec!["a", "b", "c", "d"]);
        }

        #[test]
        fn order_is_a_permutation_with_deps_first() {
            let plan = diamond();
            let order = plan.execution_order().expect("order");
            assert_eq!(order.len(), plan.steps.len());
            for (position, step) in order.iter().enumerate() {
                for dependency in &step.dependencies {
                    let dep_position = order
                        .iter()
                        .position(|s| &s.id == dependency)
                        .expect("dependency present");
                    assert!(dep_position < position);
                }
            }
        }

        #[test]
        fn next_steps_tracks_completed_set() {
            let plan = diamond();

            let ready: Vec<&str> = plan
                .next_steps(&HashSet::new())
                .iter()
                .map(|s| s.id.as_str())
                .collect();
            assert_eq!(ready, vec!["a"]);

            let completed: HashSet<String> = ["a".to_string()].into();
            let ready: Vec<&str> = plan
                .next_steps(&completed)
                .iter()
                .map(|s| s.id.as_str())
                .collect();
            assert_eq!(ready, vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn all_steps_recursive_walks_sub_plans() {
        let inner = Plan::with_id("inner", vec![step("x", &[]), step("y", &["x"])]);
        let plan = Plan::with_id(
            "outer",
            vec![step("a", &[]).with_plan(inner), step("b", &["a"])],
        );

        let ids: Vec<&str> = plan
            .all_steps_recursive()
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "x", "y", "b"]);
    }

    #[test]
    fn serde_roundtrip() {
        let plan = diamond();
        let json = serde_json::to_string(&plan).expect("serialize");
        let back: Plan = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, plan);
    }
}
