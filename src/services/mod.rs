pub mod calendar;
pub mod chat_backend;
pub mod docs;
pub mod gmail;
pub mod search;

use crate::command::schema::{missing_parameters_message, missing_required};
use crate::command::{Command, Integration};
use crate::config::AivaConfig;
use crate::error::{AppError, AppResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

/// One entry of the conversation history sent to the chat backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: String,
    pub content: String,
}

impl ApiMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self { role: role.to_string(), content: content.into() }
    }
}

/// Uniform result of every backend caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<ApiMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn reply(text: impl Into<String>) -> Self {
        Self { success: true, reply: Some(text.into()), ..Self::default() }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), ..Self::default() }
    }

    /// The reply text, or the failure as an error. A successful response
    /// without a reply counts as a failure.
    pub fn into_reply(self, fallback: &str) -> AppResult<String> {
        match (self.success, self.reply) {
            (true, Some(reply)) => Ok(reply),
            _ => Err(AppError::Server(self.error.unwrap_or_else(|| fallback.to_string()))),
        }
    }
}

impl From<AppError> for ChatResponse {
    fn from(e: AppError) -> Self {
        ChatResponse::failure(e.to_string())
    }
}

// ============================================
// HTTP BACKEND
// ============================================

/// Shared JSON-over-HTTP client.
#[derive(Clone)]
pub struct Backend {
    client: reqwest::Client,
}

impl Backend {
    pub fn new(config: &AivaConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client error: {e}")))?;
        Ok(Self { client })
    }

    /// POST `body` as JSON and decode the JSON reply. Non-2xx replies become
    /// `AppError::Server("<error_prefix>: <status text>")`.
    pub async fn post<B, T>(&self, url: Url, body: &B, error_prefix: &str) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!(%url, "POST");
        let resp = self.client.post(url.clone()).json(body).send().await?;
        Self::decode(url, resp, error_prefix).await
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url, error_prefix: &str) -> AppResult<T> {
        debug!(%url, "GET");
        let resp = self.client.get(url.clone()).send().await?;
        Self::decode(url, resp, error_prefix).await
    }

    async fn decode<T: DeserializeOwned>(url: Url, resp: reqwest::Response, error_prefix: &str) -> AppResult<T> {
        let status = resp.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "backend returned error status");
            let text = status.canonical_reason().unwrap_or(status.as_str());
            return Err(AppError::Server(format!("{error_prefix}: {text}")));
        }
        Ok(resp.json::<T>().await?)
    }
}

/// Join path segments onto `base`, percent-encoding each segment.
pub fn endpoint(base: &str, segments: &[&str]) -> AppResult<Url> {
    let mut url = Url::parse(base).map_err(|e| AppError::Config(format!("Invalid base URL '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("Base URL '{base}' cannot take a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

// ============================================
// INTEGRATION CALLERS
// ============================================

#[async_trait::async_trait]
pub trait IntegrationCaller: Send + Sync {
    fn integration(&self) -> Integration;

    /// Validate, call and format. Never fails: validation problems come back
    /// as a successful reply with guidance, transport problems as a failure.
    async fn call(&self, command: &Command) -> ChatResponse;
}

/// Short-circuit reply for a command lacking required parameters.
pub(crate) fn missing_parameters_reply(command: &Command) -> Option<ChatResponse> {
    let missing = missing_required(command);
    if missing.is_empty() {
        return None;
    }
    debug!(tool = %command.tool, ?missing, "missing required parameters");
    Some(ChatResponse::reply(missing_parameters_message(&command.tool, &missing)))
}

pub struct IntegrationRegistry {
    callers: HashMap<Integration, Box<dyn IntegrationCaller>>,
}

impl IntegrationRegistry {
    pub fn new(backend: &Backend, config: &AivaConfig) -> Self {
        let mut registry = Self { callers: HashMap::new() };
        registry.register(Box::new(docs::DocsCaller::new(backend.clone(), &config.app_base_url)));
        registry.register(Box::new(gmail::GmailCaller::new(backend.clone(), &config.integrations_base_url)));
        registry.register(Box::new(calendar::CalendarCaller::new(backend.clone(), &config.integrations_base_url)));
        registry
    }

    pub fn register(&mut self, caller: Box<dyn IntegrationCaller>) {
        self.callers.insert(caller.integration(), caller);
    }

    pub fn get(&self, integration: Integration) -> Option<&dyn IntegrationCaller> {
        self.callers.get(&integration).map(|c| c.as_ref())
    }
}

// ============================================
// JSON HELPERS
// ============================================

pub(crate) fn str_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

pub(crate) fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
