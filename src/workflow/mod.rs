pub mod client;
pub mod store;
pub mod types;

pub use client::WorkflowClient;
pub use store::{StepOutcome, StoreEvent, WorkflowState, WorkflowStore};
pub use types::{PendingClarification, StepPatch, StepStatus, WorkflowPlan, WorkflowStep};

/// One-line rendering of a step for the transcript and the terminal.
pub fn describe_step(position: usize, step: &WorkflowStep) -> String {
    let mut line = format!("{}. [{}] {}", position, step.status, step.software);
    if !step.api.name.is_empty() {
        line.push_str(&format!(" / {}", step.api.name));
    }
    if !step.reasoning.is_empty() {
        line.push_str(&format!(": {}", step.reasoning));
    }
    if let Some(error) = &step.error {
        line.push_str(&format!(" (error: {error})"));
    }
    line
}

/// Multi-line summary of a plan, one step per line.
pub fn describe_plan(plan: &WorkflowPlan) -> String {
    plan.plan
        .iter()
        .enumerate()
        .map(|(i, step)| describe_step(i + 1, step))
        .collect::<Vec<_>>()
        .join("\n")
}
