// ============================================
// TERMINAL FRONT END
// Line-oriented REPL over the chat orchestrator
// ============================================

pub mod commands;

use crate::chat::{ChatOrchestrator, Message, MessageType};
use crate::command::schema::{help_text, suggest, Suggestion};
use crate::error::AppResult;
use crate::workflow::{describe_plan, StoreEvent};
use commands::{parse_slash, SlashCommand, StepRef, HELP};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Repl<W: Write> {
    orchestrator: ChatOrchestrator,
    events: broadcast::Receiver<StoreEvent>,
    printed: usize,
    out: W,
}

impl<W: Write> Repl<W> {
    pub fn new(orchestrator: ChatOrchestrator, out: W) -> Self {
        let events = orchestrator.workflow().subscribe();
        Self { orchestrator, events, printed: 0, out }
    }

    /// Handle a single message and print only its replies.
    pub async fn run_once(&mut self, line: &str) -> AppResult<()> {
        self.printed = self.orchestrator.transcript().len();
        self.handle_line(line).await?;
        self.flush()
    }

    /// Read lines from stdin until EOF or `/quit`.
    pub async fn run_interactive(&mut self) -> AppResult<()> {
        self.flush()?;
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            write!(self.out, "> ")?;
            self.out.flush()?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if self.handle_line(&line).await? == Flow::Quit {
                break;
            }
            self.flush()?;
        }
        writeln!(self.out, "Goodbye!")?;
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> AppResult<Flow> {
        match parse_slash(line) {
            Some(Ok(cmd)) => self.execute(cmd).await,
            Some(Err(e)) => {
                writeln!(self.out, "{e}")?;
                Ok(Flow::Continue)
            }
            None => {
                self.orchestrator.send(line).await;
                Ok(Flow::Continue)
            }
        }
    }

    async fn execute(&mut self, cmd: SlashCommand) -> AppResult<Flow> {
        debug!(?cmd, "slash command");
        match cmd {
            SlashCommand::Search(query) => self.orchestrator.search(&query).await,
            SlashCommand::Smart(query) => self.orchestrator.smart_search(&query).await,
            SlashCommand::Research(query) => self.orchestrator.research(&query).await,
            SlashCommand::Agent(enabled) => {
                let enabled = enabled.unwrap_or(!self.orchestrator.agent_mode());
                self.orchestrator.set_agent_mode(enabled);
                writeln!(self.out, "Agent mode {}.", if enabled { "on" } else { "off" })?;
            }
            SlashCommand::Plan => self.print_plan()?,
            SlashCommand::Run(step) => {
                let step_id = match step {
                    Some(step) => self.resolve(&step)?,
                    None => {
                        let current = self.orchestrator.workflow().current_step_id();
                        if current.is_none() {
                            writeln!(self.out, "No step to run. Open a workflow first.")?;
                        }
                        current
                    }
                };
                if let Some(id) = step_id {
                    self.orchestrator.run_step(&id).await;
                }
            }
            SlashCommand::Skip(step) => {
                if let Some(id) = self.resolve(&step)? {
                    self.orchestrator.workflow().skip_step(&id);
                }
            }
            SlashCommand::Move(step, position) => {
                if let Some(id) = self.resolve(&step)? {
                    self.orchestrator.workflow().reorder_steps(&id, position.saturating_sub(1));
                }
            }
            SlashCommand::Context(step) => {
                if let Some(id) = self.resolve(&step)? {
                    self.orchestrator.workflow().add_context(&id);
                }
            }
            SlashCommand::Close => self.orchestrator.workflow().close_workflow(),
            SlashCommand::Hint(partial) => {
                let hint = match suggest(&partial) {
                    Some(Suggestion::Tools(tools)) => {
                        let names: Vec<&str> = tools.iter().map(|t| t.name).collect();
                        format!("Tools: {}", names.join(", "))
                    }
                    Some(Suggestion::Parameter(param)) => format!(
                        "Next: {} ({}{})",
                        Suggestion::Parameter(param).ghost_text(),
                        param.description,
                        if param.required { ", required" } else { "" }
                    ),
                    None => "No suggestion.".to_string(),
                };
                writeln!(self.out, "{hint}")?;
            }
            SlashCommand::Help(None) => writeln!(self.out, "{HELP}")?,
            SlashCommand::Help(Some(integration)) => writeln!(self.out, "{}", help_text(integration))?,
            SlashCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Resolve a step reference, printing the problem instead of failing.
    fn resolve(&mut self, step: &StepRef) -> AppResult<Option<String>> {
        match step.resolve(self.orchestrator.workflow()) {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                writeln!(self.out, "{e}")?;
                Ok(None)
            }
        }
    }

    fn print_plan(&mut self) -> AppResult<()> {
        let state = self.orchestrator.workflow().snapshot();
        match state.plan {
            Some(plan) if state.is_open => {
                writeln!(self.out, "Workflow {}:\n{}", plan.session_id, describe_plan(&plan))?;
                if let Some(current) = state.current_step_id {
                    writeln!(self.out, "Current step: {current}")?;
                }
            }
            _ => writeln!(self.out, "No open workflow.")?,
        }
        Ok(())
    }

    /// Print transcript messages added since the last flush, then drain
    /// workflow store events.
    fn flush(&mut self) -> AppResult<()> {
        let messages = self.orchestrator.transcript().messages();
        for message in messages.iter().skip(self.printed) {
            if let Some(text) = render_message(message) {
                writeln!(self.out, "{text}")?;
            }
        }
        self.printed = messages.len();

        loop {
            match self.events.try_recv() {
                Ok(event) => writeln!(self.out, "{}", render_event(&event))?,
                Err(TryRecvError::Lagged(skipped)) => writeln!(self.out, "[workflow] {skipped} updates skipped")?,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

fn render_message(message: &Message) -> Option<String> {
    match message.message_type {
        MessageType::Ai => Some(format!("AIVA: {}\n", message.text)),
        MessageType::User | MessageType::Typing => None,
    }
}

fn render_event(event: &StoreEvent) -> String {
    match event {
        StoreEvent::Opened { session_id, steps } => {
            format!("[workflow] opened {session_id} with {steps} step(s)")
        }
        StoreEvent::Closed => "[workflow] closed".to_string(),
        StoreEvent::StepChanged { step_id, status } => format!("[workflow] {step_id}: {status}"),
        StoreEvent::Reordered { step_id, index } => {
            format!("[workflow] {step_id} moved to position {}", index + 1)
        }
        StoreEvent::CurrentStepChanged { step_id: Some(id) } => format!("[workflow] current step: {id}"),
        StoreEvent::CurrentStepChanged { step_id: None } => "[workflow] no current step".to_string(),
        StoreEvent::ClarificationRequested { step_id, .. } => {
            format!("[workflow] {step_id} is waiting for your answer")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AivaConfig;
    use crate::workflow::{StepStatus, WorkflowPlan, WorkflowStep};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, Repl<Vec<u8>>) {
        let server = MockServer::start().await;
        let config = AivaConfig {
            app_base_url: server.uri(),
            integrations_base_url: server.uri(),
            ..AivaConfig::default()
        };
        let repl = Repl::new(ChatOrchestrator::new(&config).unwrap(), Vec::new());
        (server, repl)
    }

    fn output(repl: &Repl<Vec<u8>>) -> String {
        String::from_utf8(repl.out.clone()).unwrap()
    }

    fn plan() -> WorkflowPlan {
        WorkflowPlan {
            session_id: "sess-1".into(),
            plan: ["a", "b", "c"]
                .iter()
                .map(|id| WorkflowStep { id: id.to_string(), ..Default::default() })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_run_once_prints_reply_only() {
        let (server, mut repl) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "reply": "Hi!"})))
            .mount(&server)
            .await;

        repl.run_once("hello").await.unwrap();
        let out = output(&repl);
        assert_eq!(out, "AIVA: Hi!\n\n");
    }

    #[tokio::test]
    async fn test_workflow_slash_commands() {
        let (_server, mut repl) = setup().await;
        repl.orchestrator.workflow().open_workflow(plan());

        repl.handle_line("/move a 3").await.unwrap();
        repl.handle_line("/skip 1").await.unwrap();
        repl.handle_line("/context c").await.unwrap();
        repl.handle_line("/skip zzz").await.unwrap();
        repl.flush().unwrap();

        let store = repl.orchestrator.workflow();
        let ids: Vec<String> = store.snapshot().plan.unwrap().plan.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(store.step("b").unwrap().status, StepStatus::Skipped);
        assert_eq!(store.current_step_id().as_deref(), Some("c"));

        let out = output(&repl);
        assert!(out.contains("Not found: step 'zzz'"));
        assert!(out.contains("[workflow] opened sess-1 with 3 step(s)"));
        assert!(out.contains("[workflow] a moved to position 3"));
        assert!(out.contains("[workflow] b: skipped"));
        assert!(out.contains("[workflow] current step: c"));
    }

    #[tokio::test]
    async fn test_plan_and_close() {
        let (_server, mut repl) = setup().await;
        repl.handle_line("/plan").await.unwrap();
        repl.orchestrator.workflow().open_workflow(plan());
        repl.handle_line("/plan").await.unwrap();
        repl.handle_line("/close").await.unwrap();
        repl.handle_line("/run").await.unwrap();

        let out = output(&repl);
        assert!(out.starts_with("No open workflow."));
        assert!(out.contains("1. [pending]"));
        assert!(out.contains("Current step: a"));
        assert!(out.contains("No step to run."));
        assert!(!repl.orchestrator.workflow().is_open());
    }

    #[tokio::test]
    async fn test_agent_toggle_hint_and_quit() {
        let (_server, mut repl) = setup().await;
        repl.handle_line("/agent").await.unwrap();
        assert!(repl.orchestrator.agent_mode());
        repl.handle_line("/agent off").await.unwrap();
        assert!(!repl.orchestrator.agent_mode());

        repl.handle_line("/hint @calendar create summary:\"x\"").await.unwrap();
        repl.handle_line("/bogus").await.unwrap();
        assert_eq!(repl.handle_line("/quit").await.unwrap(), Flow::Quit);

        let out = output(&repl);
        assert!(out.contains("Agent mode on."));
        assert!(out.contains("Agent mode off."));
        assert!(out.contains("Next: start:\"\""));
        assert!(out.contains("Unknown command '/bogus'"));
    }

    #[tokio::test]
    async fn test_help_for_integration() {
        let (_server, mut repl) = setup().await;
        repl.handle_line("/help docs").await.unwrap();
        assert!(output(&repl).contains("### Available @docs commands"));
    }
}
