use super::{endpoint, ApiMessage, Backend, ChatResponse};
use crate::config::AivaConfig;
use crate::error::AppResult;
use serde::Serialize;
use tracing::debug;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    message: &'a str,
    conversation_history: &'a [ApiMessage],
}

/// Client for the generic chat model route.
#[derive(Clone)]
pub struct ChatClient {
    backend: Backend,
    base_url: String,
}

impl ChatClient {
    pub fn new(backend: Backend, config: &AivaConfig) -> Self {
        Self { backend, base_url: config.app_base_url.clone() }
    }

    /// Forward `message` with the history that preceded it.
    pub async fn send(&self, message: &str, history: &[ApiMessage]) -> AppResult<ChatResponse> {
        let url = endpoint(&self.base_url, &["api", "chat"])?;
        debug!(history_len = history.len(), "sending chat message");
        let body = ChatRequest { message, conversation_history: history };
        self.backend.post(url, &body, "API error").await
    }
}
