use crate::registry::{Step, StepId, REGISTRY};
use std::collections::BTreeSet;

/// Registry-ordered subsequence of steps selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    steps: Vec<&'static Step>,
}

impl ExecutionPlan {
    pub fn steps(&self) -> &[&'static Step] {
        &self.steps
    }

    pub fn ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|step| step.id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Filter the registry by the requested ids.
///
/// Order always follows the registry, never the order ids were typed.
pub fn build_plan(requested: &BTreeSet<StepId>) -> ExecutionPlan {
    ExecutionPlan {
        steps: REGISTRY
            .iter()
            .filter(|step| requested.contains(&step.id))
            .collect(),
    }
}
