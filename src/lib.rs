// ============================================
// AIVA
// Chat assistant that routes messages to Docs,
// Gmail, Calendar, search and workflow backends
// ============================================

pub mod chat;
pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod repl;
pub mod services;
pub mod workflow;

use chat::ChatOrchestrator;
use clap::Parser;
use cli::Cli;
use config::AivaConfig;
use error::AppResult;
use repl::Repl;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();
    match run_with(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("aiva: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so they never mix with replies. `AIVA_LOG` takes an
/// `EnvFilter` directive, default `warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("AIVA_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_with(cli: Cli) -> AppResult<()> {
    let mut config = AivaConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);
    info!(
        app = %config.app_base_url,
        integrations = %config.integrations_base_url,
        agent_mode = config.agent_mode,
        "starting aiva"
    );

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(serve(&config, cli.once.as_deref()))
}

async fn serve(config: &AivaConfig, once: Option<&str>) -> AppResult<()> {
    let orchestrator = ChatOrchestrator::new(config)?;
    let mut repl = Repl::new(orchestrator, std::io::stdout());
    match once {
        Some(message) => repl.run_once(message).await,
        None => repl.run_interactive().await,
    }
}
