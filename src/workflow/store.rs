// ============================================
// WORKFLOW STORE
// Plan state shared between the chat orchestrator
// and the front end. Every mutation goes through
// `reduce` and is broadcast as a `StoreEvent`.
// ============================================

use super::client::WorkflowClient;
use super::types::{ExecutionStatus, PendingClarification, StepPatch, StepStatus, WorkflowPlan, WorkflowStep};
use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

pub const EVENT_BUFFER_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    pub is_open: bool,
    pub plan: Option<WorkflowPlan>,
    pub current_step_id: Option<String>,
    pub pending_clarification: Option<PendingClarification>,
}

/// Mutations the store accepts.
#[derive(Debug, Clone)]
pub enum Action {
    Open(WorkflowPlan),
    Close,
    SetStatus { step_id: String, status: StepStatus, error: Option<String> },
    MergeParameters { step_id: String, parameters: HashMap<String, String> },
    Reorder { step_id: String, index: usize },
    Modify { step_id: String, patch: StepPatch },
    SetCurrent(Option<String>),
    AwaitClarification(PendingClarification),
}

/// What subscribers see after a mutation was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Opened { session_id: String, steps: usize },
    Closed,
    StepChanged { step_id: String, status: StepStatus },
    Reordered { step_id: String, index: usize },
    CurrentStepChanged { step_id: Option<String> },
    ClarificationRequested { step_id: String, questions: Vec<String> },
}

/// Result of `run_step` as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed { next_step_id: Option<String> },
    NeedsClarification { questions: Vec<String> },
    Failed { error: String },
    /// The backend answered with a status this client does not know; the
    /// step stays `in_progress`.
    InProgress,
}

/// Apply `action` to `state`. Returns the event to publish, or `None` when
/// the action targeted nothing (no plan, unknown step).
pub fn reduce(state: &mut WorkflowState, action: Action) -> Option<StoreEvent> {
    match action {
        Action::Open(plan) => {
            let event = StoreEvent::Opened { session_id: plan.session_id.clone(), steps: plan.plan.len() };
            state.current_step_id = plan.plan.first().map(|s| s.id.clone());
            state.plan = Some(plan);
            state.is_open = true;
            state.pending_clarification = None;
            Some(event)
        }
        Action::Close => {
            *state = WorkflowState::default();
            Some(StoreEvent::Closed)
        }
        Action::SetStatus { step_id, status, error } => {
            let step = step_mut(state, &step_id)?;
            step.status = status;
            if error.is_some() {
                step.error = error;
            }
            clear_stale_clarification(state);
            Some(StoreEvent::StepChanged { step_id, status })
        }
        Action::MergeParameters { step_id, parameters } => {
            let step = step_mut(state, &step_id)?;
            step.parameters.extend(parameters);
            let status = step.status;
            Some(StoreEvent::StepChanged { step_id, status })
        }
        Action::Reorder { step_id, index } => {
            let steps = &mut state.plan.as_mut()?.plan;
            let from = steps.iter().position(|s| s.id == step_id)?;
            let step = steps.remove(from);
            let index = index.min(steps.len());
            steps.insert(index, step);
            Some(StoreEvent::Reordered { step_id, index })
        }
        Action::Modify { step_id, patch } => {
            let step = step_mut(state, &step_id)?;
            patch.apply(step);
            let status = step.status;
            clear_stale_clarification(state);
            Some(StoreEvent::StepChanged { step_id, status })
        }
        Action::SetCurrent(step_id) => {
            if let Some(id) = &step_id {
                state.plan.as_ref()?.step(id)?;
            }
            state.current_step_id = step_id.clone();
            Some(StoreEvent::CurrentStepChanged { step_id })
        }
        Action::AwaitClarification(pending) => {
            let plan = state.plan.as_mut()?;
            if plan.session_id != pending.session_id {
                return None;
            }
            let step = plan.plan.iter_mut().find(|s| s.id == pending.step_id)?;
            step.status = StepStatus::NeedsClarification;
            let event = StoreEvent::ClarificationRequested {
                step_id: pending.step_id.clone(),
                questions: pending.questions.clone(),
            };
            state.pending_clarification = Some(pending);
            Some(event)
        }
    }
}

fn step_mut<'a>(state: &'a mut WorkflowState, step_id: &str) -> Option<&'a mut WorkflowStep> {
    state.plan.as_mut()?.plan.iter_mut().find(|s| s.id == step_id)
}

/// Drop the pending clarification once its step left `needs_clarification`.
fn clear_stale_clarification(state: &mut WorkflowState) {
    let Some(pending) = &state.pending_clarification else {
        return;
    };
    let still_waiting = state
        .plan
        .as_ref()
        .and_then(|p| p.step(&pending.step_id))
        .is_some_and(|s| s.status == StepStatus::NeedsClarification);
    if !still_waiting {
        state.pending_clarification = None;
    }
}

/// Cloneable handle over the shared workflow state.
#[derive(Clone)]
pub struct WorkflowStore {
    state: Arc<Mutex<WorkflowState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER_CAPACITY);
        Self { state: Arc::new(Mutex::new(WorkflowState::default())), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub fn dispatch(&self, action: Action) -> bool {
        let event = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            reduce(&mut state, action)
        };
        match event {
            Some(event) => {
                debug!(?event, "workflow store updated");
                // No receivers is fine.
                let _ = self.events.send(event);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> WorkflowState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).is_open
    }

    pub fn step(&self, step_id: &str) -> Option<WorkflowStep> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.plan.as_ref()?.step(step_id).cloned()
    }

    pub fn current_step_id(&self) -> Option<String> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).current_step_id.clone()
    }

    pub fn pending_clarification(&self) -> Option<PendingClarification> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).pending_clarification.clone()
    }

    /// Step id at 1-based `position`, used by the front end.
    pub fn step_id_at(&self, position: usize) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let steps = &state.plan.as_ref()?.plan;
        position.checked_sub(1).and_then(|i| steps.get(i)).map(|s| s.id.clone())
    }

    pub fn open_workflow(&self, plan: WorkflowPlan) {
        info!(session_id = %plan.session_id, steps = plan.plan.len(), "opening workflow");
        self.dispatch(Action::Open(plan));
    }

    pub fn close_workflow(&self) {
        info!("closing workflow");
        self.dispatch(Action::Close);
    }

    pub fn update_step_status(&self, step_id: &str, status: StepStatus, error: Option<String>) -> bool {
        self.dispatch(Action::SetStatus { step_id: step_id.to_string(), status, error })
    }

    pub fn update_step_parameters(&self, step_id: &str, parameters: HashMap<String, String>) -> bool {
        self.dispatch(Action::MergeParameters { step_id: step_id.to_string(), parameters })
    }

    pub fn reorder_steps(&self, step_id: &str, new_index: usize) -> bool {
        self.dispatch(Action::Reorder { step_id: step_id.to_string(), index: new_index })
    }

    pub fn skip_step(&self, step_id: &str) -> bool {
        self.update_step_status(step_id, StepStatus::Skipped, None)
    }

    pub fn modify_step(&self, step_id: &str, patch: StepPatch) -> bool {
        self.dispatch(Action::Modify { step_id: step_id.to_string(), patch })
    }

    pub fn set_current_step(&self, step_id: Option<&str>) -> bool {
        self.dispatch(Action::SetCurrent(step_id.map(str::to_string)))
    }

    /// Select the step as the chat's working context.
    pub fn add_context(&self, step_id: &str) -> bool {
        self.set_current_step(Some(step_id))
    }

    pub fn await_clarification(&self, pending: PendingClarification) -> bool {
        self.dispatch(Action::AwaitClarification(pending))
    }

    /// Execute one step on the backend and record the result on the step.
    /// Transport failures are stored as a failed step, not returned.
    /// Skipped and completed steps are terminal and are refused.
    pub async fn run_step(&self, client: &WorkflowClient, step_id: &str) -> AppResult<StepOutcome> {
        let session_id = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let plan = state
                .plan
                .as_ref()
                .ok_or_else(|| AppError::NotFound("no open workflow".to_string()))?;
            let step = plan
                .step(step_id)
                .ok_or_else(|| AppError::NotFound(format!("step '{step_id}'")))?;
            match step.status {
                StepStatus::Skipped => {
                    return Err(AppError::Validation(format!("step '{step_id}' was skipped")));
                }
                StepStatus::Completed => {
                    return Err(AppError::Validation(format!("step '{step_id}' is already completed")));
                }
                _ => {}
            }
            plan.session_id.clone()
        };

        self.update_step_status(step_id, StepStatus::InProgress, None);

        let execution = match client.execute_step(&session_id, step_id).await {
            Ok(execution) => execution,
            Err(e) => {
                warn!(step_id, error = %e, "step execution request failed");
                let error = e.to_string();
                self.update_step_status(step_id, StepStatus::Failed, Some(error.clone()));
                return Ok(StepOutcome::Failed { error });
            }
        };

        match execution.status {
            ExecutionStatus::Completed => {
                self.update_step_status(step_id, StepStatus::Completed, None);
                let next_step_id = self.next_step_id(step_id);
                if let Some(next) = &next_step_id {
                    self.set_current_step(Some(next));
                }
                info!(step_id, next = ?next_step_id, "step completed");
                Ok(StepOutcome::Completed { next_step_id })
            }
            ExecutionStatus::NeedsClarification => {
                let mut questions = execution.questions;
                if questions.is_empty() {
                    questions = client
                        .clarification_questions(&session_id, step_id)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(step_id, error = %e, "could not fetch clarification questions");
                            Vec::new()
                        });
                }
                if questions.is_empty() {
                    questions = execution
                        .missing_params
                        .iter()
                        .map(|p| format!("What value should be used for {p}?"))
                        .collect();
                }
                self.await_clarification(PendingClarification {
                    session_id,
                    step_id: step_id.to_string(),
                    questions: questions.clone(),
                });
                Ok(StepOutcome::NeedsClarification { questions })
            }
            ExecutionStatus::Error => {
                let error = execution.error.unwrap_or_else(|| "Step execution failed".to_string());
                self.update_step_status(step_id, StepStatus::Failed, Some(error.clone()));
                Ok(StepOutcome::Failed { error })
            }
            ExecutionStatus::Unknown => {
                warn!(step_id, "unrecognized execute-step status");
                Ok(StepOutcome::InProgress)
            }
        }
    }

    fn next_step_id(&self, step_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let plan = state.plan.as_ref()?;
        let idx = plan.position(step_id)?;
        plan.plan.get(idx + 1).map(|s| s.id.clone())
    }
}
