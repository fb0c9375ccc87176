use crate::config::AivaConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aiva")]
#[command(version, about = "AIVA - chat assistant for Docs, Gmail, Calendar, search and workflows")]
pub struct Cli {
    /// Config file (defaults to ~/.aiva/config.toml)
    #[arg(long, env = "AIVA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the app backend
    #[arg(long)]
    pub app_url: Option<String>,

    /// Base URL of the Gmail/Calendar server
    #[arg(long)]
    pub integrations_url: Option<String>,

    /// Start with agent mode on
    #[arg(long)]
    pub agent: bool,

    /// Send one message, print the reply and exit
    #[arg(long, value_name = "MESSAGE")]
    pub once: Option<String>,
}

impl Cli {
    /// Flags win over file and environment settings.
    pub fn apply_to(&self, config: &mut AivaConfig) {
        if let Some(url) = &self.app_url {
            config.app_base_url = url.clone();
        }
        if let Some(url) = &self.integrations_url {
            config.integrations_base_url = url.clone();
        }
        if self.agent {
            config.agent_mode = true;
        }
    }
}
