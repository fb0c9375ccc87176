// ============================================
// CONFIGURATION
// ~/.aiva/config.toml, then AIVA_* environment
// overrides, then command-line flags
// ============================================

use crate::error::{AppError, AppResult};
use crate::services::search::ResearchDepth;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_APP_URL: &str = "http://localhost:3000";
pub const DEFAULT_INTEGRATIONS_URL: &str = "http://localhost:4100";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SEARCH_RESULTS: u32 = 5;

pub const WELCOME_MESSAGE: &str = "Hello! I'm AIVA, your personal AI assistant. How can I help you today?\n\n\
TIP: Use @docs, @gmail or @calendar commands to work with Google Docs, Gmail and Calendar. \
Type /help to see available commands.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AivaConfig {
    /// Base URL of the app backend (chat, search, docs, workflow routes).
    pub app_base_url: String,
    /// Base URL of the Gmail/Calendar API server.
    pub integrations_base_url: String,
    pub request_timeout_secs: u64,
    pub search_results: u32,
    pub research_depth: ResearchDepth,
    /// Try to build a workflow plan from every plain chat message.
    pub agent_mode: bool,
    /// Forwarded as `apiKey` to the workflow intention endpoint when set.
    pub workflow_api_key: Option<String>,
    pub welcome_message: String,
}

impl Default for AivaConfig {
    fn default() -> Self {
        Self {
            app_base_url: DEFAULT_APP_URL.to_string(),
            integrations_base_url: DEFAULT_INTEGRATIONS_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            search_results: DEFAULT_SEARCH_RESULTS,
            research_depth: ResearchDepth::Comprehensive,
            agent_mode: false,
            workflow_api_key: None,
            welcome_message: WELCOME_MESSAGE.to_string(),
        }
    }
}

impl AivaConfig {
    /// Returns `~/.aiva/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".aiva").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(std::env::vars())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `AIVA_*` overrides from an environment-like iterator.
    pub fn apply_overrides<I>(&mut self, vars: I) -> AppResult<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            match key.as_str() {
                "AIVA_APP_URL" => self.app_base_url = value,
                "AIVA_INTEGRATIONS_URL" => self.integrations_base_url = value,
                "AIVA_TIMEOUT_SECS" => {
                    self.request_timeout_secs = value.parse().map_err(|_| {
                        AppError::Config(format!("AIVA_TIMEOUT_SECS must be a number, got '{value}'"))
                    })?;
                }
                "AIVA_AGENT_MODE" => self.agent_mode = parse_flag(&value)?,
                "AIVA_WORKFLOW_API_KEY" => self.workflow_api_key = Some(value),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_flag(value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(AppError::Config(format!("Expected a boolean flag, got '{other}'"))),
    }
}
