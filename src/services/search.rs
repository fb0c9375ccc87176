use super::{endpoint, Backend, ChatResponse};
use crate::config::AivaConfig;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    Basic,
    #[default]
    Comprehensive,
}

impl fmt::Display for ResearchDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResearchDepth::Basic => write!(f, "basic"),
            ResearchDepth::Comprehensive => write!(f, "comprehensive"),
        }
    }
}

impl FromStr for ResearchDepth {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(ResearchDepth::Basic),
            "comprehensive" => Ok(ResearchDepth::Comprehensive),
            other => Err(AppError::Validation(format!(
                "Unknown research depth '{other}'. Use basic or comprehensive."
            ))),
        }
    }
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: u32,
}

#[derive(Serialize)]
struct SmartSearchRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

#[derive(Serialize)]
struct ResearchRequest<'a> {
    query: &'a str,
    depth: ResearchDepth,
}

#[derive(Deserialize)]
struct ReplyOnly {
    #[serde(default)]
    reply: Option<String>,
}

/// Web search, smart search and deep research against the app backend.
#[derive(Clone)]
pub struct SearchClient {
    backend: Backend,
    base_url: String,
    num_results: u32,
}

impl SearchClient {
    pub fn new(backend: Backend, config: &AivaConfig) -> Self {
        Self {
            backend,
            base_url: config.app_base_url.clone(),
            num_results: config.search_results,
        }
    }

    /// The backend already answers with a `ChatResponse`.
    pub async fn search(&self, query: &str) -> ChatResponse {
        info!(query, num_results = self.num_results, "web search");
        let body = SearchRequest { query, num_results: self.num_results };
        self.post::<_, ChatResponse>(&["api", "search"], &body)
            .await
            .unwrap_or_else(|e| {
                error!(error = %e, "web search failed");
                e.into()
            })
    }

    pub async fn smart_search(&self, query: &str, instructions: Option<&str>) -> ChatResponse {
        info!(query, "smart search");
        let body = SmartSearchRequest { query, instructions };
        self.reply_only(&["api", "you", "smart-search"], &body, "No results found for your query.")
            .await
    }

    pub async fn research(&self, query: &str, depth: ResearchDepth) -> ChatResponse {
        info!(query, %depth, "deep research");
        let body = ResearchRequest { query, depth };
        self.reply_only(&["api", "you", "research"], &body, "No research results found for your query.")
            .await
    }

    async fn reply_only<B: Serialize>(&self, path: &[&str], body: &B, fallback: &str) -> ChatResponse {
        match self.post::<_, ReplyOnly>(path, body).await {
            Ok(data) => ChatResponse::reply(data.reply.filter(|r| !r.is_empty()).unwrap_or_else(|| fallback.to_string())),
            Err(e) => {
                error!(error = %e, "search request failed");
                e.into()
            }
        }
    }

    async fn post<B: Serialize, T: serde::de::DeserializeOwned>(&self, path: &[&str], body: &B) -> AppResult<T> {
        let url = endpoint(&self.base_url, path)?;
        self.backend.post(url, body, "API error").await
    }
}
