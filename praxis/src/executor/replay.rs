//! Incremental replan: carry finished work across a plan swap.
//!
//! A step survives a replan when it is structurally the same unit of work
//! in both plans; its recorded output then counts as done in the new plan
//! instead of being recomputed.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::plan::{Plan, StepDelta};

/// Hash identifying a step's unit of work: `SHA-256(id ":" instruction)`.
#[must_use]
pub fn instruction_hash(id: &str, instruction: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hasher.update(b":");
    hasher.update(instruction.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compute the completed set and outputs that survive a plan swap.
///
/// A completed step id is preserved iff it exists in both plans, is in
/// neither the added nor removed set of the diff, and — when the diff
/// marks it changed — its instruction hash is identical on both sides.
/// With no diff at all, everything is preserved verbatim.
#[must_use]
pub fn apply_replan(
    old_plan: &Plan,
    new_plan: &Plan,
    diff: Option<&StepDelta>,
    completed: &HashSet<String>,
    outputs: &HashMap<String, String>,
) -> (HashSet<String>, HashMap<String, String>) {
    let Some(diff) = diff else {
        return (completed.clone(), outputs.clone());
    };

    let mut new_completed = HashSet::new();
    let mut new_outputs = HashMap::new();

    for id in completed {
        let (Some(old_step), Some(new_step)) = (old_plan.find_step(id), new_plan.find_step(id))
        else {
            continue;
        };
        if diff.added.contains_key(id) || diff.removed.contains_key(id) {
            continue;
        }
        if diff.changed.contains_key(id)
            && instruction_hash(id, &old_step.instruction)
                != instruction_hash(id, &new_step.instruction)
        {
            continue;
        }

        new_completed.insert(id.clone());
        if let Some(output) = outputs.get(id) {
            new_outputs.insert(id.clone(), output.clone());
        }
    }

    (new_completed, new_outputs)
}
