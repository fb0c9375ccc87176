use super::types::{
    ClarificationQuestions, ExtractedParams, IntentionResponse, StepExecution, WorkflowPlan, WorkflowStep,
};
use crate::config::AivaConfig;
use crate::error::{AppError, AppResult};
use crate::services::{endpoint, Backend};
use serde::Serialize;
use tracing::{debug, info};

const ERROR_PREFIX: &str = "Workflow API error";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    user_prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Serialize)]
struct ExecuteStepRequest<'a> {
    session_id: &'a str,
    step_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractParamsRequest<'a> {
    step: &'a WorkflowStep,
    user_input: &'a str,
}

/// Client for the `/api/workflow/*` routes.
#[derive(Clone)]
pub struct WorkflowClient {
    backend: Backend,
    base_url: String,
    api_key: Option<String>,
}

impl WorkflowClient {
    pub fn new(backend: Backend, config: &AivaConfig) -> Self {
        Self {
            backend,
            base_url: config.app_base_url.clone(),
            api_key: config.workflow_api_key.clone(),
        }
    }

    /// Ask the backend whether `prompt` describes an automation. Returns the
    /// plan for `plan_created`, `None` for any other status.
    pub async fn detect_intention(&self, prompt: &str) -> AppResult<Option<WorkflowPlan>> {
        let url = endpoint(&self.base_url, &["api", "workflow", "process"])?;
        let body = ProcessRequest { user_prompt: prompt, api_key: self.api_key.as_deref() };
        let resp: IntentionResponse = self.backend.post(url, &body, ERROR_PREFIX).await?;
        debug!(status = %resp.status, message = ?resp.message, "intention detection");
        if resp.status != "plan_created" {
            return Ok(None);
        }
        let session_id = resp
            .session_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Workflow("plan_created reply without session_id".to_string()))?;
        let plan = WorkflowPlan { session_id, plan: resp.plan.unwrap_or_default() };
        info!(session_id = %plan.session_id, steps = plan.plan.len(), "workflow plan created");
        Ok(Some(plan))
    }

    pub async fn execute_step(&self, session_id: &str, step_id: &str) -> AppResult<StepExecution> {
        let url = endpoint(&self.base_url, &["api", "workflow", "execute-step"])?;
        info!(session_id, step_id, "executing workflow step");
        self.backend.post(url, &ExecuteStepRequest { session_id, step_id }, ERROR_PREFIX).await
    }

    pub async fn extract_params(&self, step: &WorkflowStep, user_input: &str) -> AppResult<ExtractedParams> {
        let url = endpoint(&self.base_url, &["api", "workflow", "extract-params"])?;
        debug!(step_id = %step.id, "extracting parameters from clarification");
        self.backend.post(url, &ExtractParamsRequest { step, user_input }, ERROR_PREFIX).await
    }

    pub async fn clarification_questions(&self, session_id: &str, step_id: &str) -> AppResult<Vec<String>> {
        let url = endpoint(
            &self.base_url,
            &["api", "workflow", "get-clarification", session_id, step_id],
        )?;
        let resp: ClarificationQuestions = self.backend.get(url, ERROR_PREFIX).await?;
        Ok(resp.questions)
    }
}
