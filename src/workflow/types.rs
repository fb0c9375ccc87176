use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    NeedsClarification,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::NeedsClarification => "needs_clarification",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// A parameter the step's API call needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, deserialize_with = "lenient_value", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    #[serde(default)]
    pub software: String,
    #[serde(default)]
    pub api: ApiInfo,
    #[serde(default, deserialize_with = "lenient_parameters")]
    pub parameters: HashMap<String, String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub status: StepStatus,
    #[serde(default)]
    pub required_parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowStep {
    /// Required parameters that have no non-blank value yet.
    pub fn unfilled_parameters(&self) -> Vec<&str> {
        self.required_parameters
            .iter()
            .filter(|p| p.required)
            .filter(|p| {
                let supplied = self.parameters.get(&p.name).or(p.value.as_ref());
                supplied.map_or(true, |v| v.trim().is_empty())
            })
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowPlan {
    pub session_id: String,
    #[serde(default)]
    pub plan: Vec<WorkflowStep>,
}

impl WorkflowPlan {
    pub fn step(&self, step_id: &str) -> Option<&WorkflowStep> {
        self.plan.iter().find(|s| s.id == step_id)
    }

    pub fn position(&self, step_id: &str) -> Option<usize> {
        self.plan.iter().position(|s| s.id == step_id)
    }
}

/// Partial update for `modify_step`. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StepPatch {
    pub software: Option<String>,
    pub api: Option<ApiInfo>,
    pub parameters: Option<HashMap<String, String>>,
    pub reasoning: Option<String>,
    pub status: Option<StepStatus>,
    pub required_parameters: Option<Vec<Parameter>>,
    pub error: Option<String>,
}

impl StepPatch {
    pub(crate) fn apply(self, step: &mut WorkflowStep) {
        if let Some(software) = self.software {
            step.software = software;
        }
        if let Some(api) = self.api {
            step.api = api;
        }
        if let Some(parameters) = self.parameters {
            step.parameters = parameters;
        }
        if let Some(reasoning) = self.reasoning {
            step.reasoning = reasoning;
        }
        if let Some(status) = self.status {
            step.status = status;
        }
        if let Some(required) = self.required_parameters {
            step.required_parameters = required;
        }
        if let Some(error) = self.error {
            step.error = Some(error);
        }
    }
}

// ============================================
// BACKEND WIRE TYPES
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    NeedsClarification,
    Error,
    #[serde(other)]
    Unknown,
}

/// Reply of `execute-step`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepExecution {
    pub status: ExecutionStatus,
    #[serde(default)]
    pub step_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "lenient_questions")]
    pub questions: Vec<String>,
    #[serde(default)]
    pub missing_params: Vec<String>,
}

/// Reply of `process`. `plan` and `session_id` are only present for `plan_created`.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentionResponse {
    pub status: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub plan: Option<Vec<WorkflowStep>>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Reply of `extract-params`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedParams {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub complete: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ExtractedParams {
    pub fn string_parameters(&self) -> HashMap<String, String> {
        self.parameters
            .iter()
            .filter_map(|(k, v)| value_text(v).map(|text| (k.clone(), text)))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.complete.unwrap_or(self.success)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ClarificationQuestions {
    #[serde(default, deserialize_with = "lenient_questions")]
    pub questions: Vec<String>,
}

/// A step waiting for the user to answer the backend's questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingClarification {
    pub session_id: String,
    pub step_id: String,
    pub questions: Vec<String>,
}

/// Step parameters are strings. Other JSON values keep their JSON text and
/// nulls are dropped.
fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn lenient_parameters<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .filter_map(|(k, v)| value_text(v).map(|text| (k.clone(), text)))
        .collect())
}

fn lenient_value<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(value_text(&raw))
}

/// Questions arrive either as plain strings or as `{question: ...}` objects.
fn lenient_questions<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|q| match q {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Object(map) => map
                .get("question")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        })
        .collect())
}
