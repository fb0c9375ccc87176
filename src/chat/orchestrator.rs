// ============================================
// CHAT ORCHESTRATOR
// Routes each user message to a clarification
// answer, an integration command or plain chat
// ============================================

use super::message::{Message, MessageSource, Transcript};
use crate::command::{self, parse_command, Integration};
use crate::config::AivaConfig;
use crate::error::AppResult;
use crate::services::chat_backend::ChatClient;
use crate::services::search::{ResearchDepth, SearchClient};
use crate::services::{ApiMessage, Backend, ChatResponse, IntegrationRegistry};
use crate::workflow::{describe_plan, PendingClarification, StepOutcome, WorkflowClient, WorkflowPlan, WorkflowStore};
use tracing::{debug, error, info, warn};

const CHAT_FALLBACK: &str = "Failed to get response";
const SEARCH_FALLBACK: &str = "Failed to get search results";
const RESEARCH_FALLBACK: &str = "Failed to get research results";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Clarification(PendingClarification),
    Integration(Integration),
    Chat,
}

/// Decide where `text` goes. A pending clarification takes every message.
pub fn classify(text: &str, pending: Option<PendingClarification>) -> Route {
    if let Some(pending) = pending {
        return Route::Clarification(pending);
    }
    match command::classify(text) {
        Some(integration) => Route::Integration(integration),
        None => Route::Chat,
    }
}

/// Owns one conversation. Every entry point takes `&mut self`, so sends on
/// a conversation never overlap.
pub struct ChatOrchestrator {
    transcript: Transcript,
    history: Vec<ApiMessage>,
    integrations: IntegrationRegistry,
    chat_client: ChatClient,
    search_client: SearchClient,
    workflow_client: WorkflowClient,
    workflow: WorkflowStore,
    agent_mode: bool,
    research_depth: ResearchDepth,
}

impl ChatOrchestrator {
    pub fn new(config: &AivaConfig) -> AppResult<Self> {
        let backend = Backend::new(config)?;
        Ok(Self {
            transcript: Transcript::new(&config.welcome_message),
            history: vec![ApiMessage::new("assistant", config.welcome_message.clone())],
            integrations: IntegrationRegistry::new(&backend, config),
            chat_client: ChatClient::new(backend.clone(), config),
            search_client: SearchClient::new(backend.clone(), config),
            workflow_client: WorkflowClient::new(backend, config),
            workflow: WorkflowStore::new(),
            agent_mode: config.agent_mode,
            research_depth: config.research_depth,
        })
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn history(&self) -> &[ApiMessage] {
        &self.history
    }

    pub fn workflow(&self) -> &WorkflowStore {
        &self.workflow
    }

    pub fn agent_mode(&self) -> bool {
        self.agent_mode
    }

    pub fn set_agent_mode(&mut self, enabled: bool) {
        info!(enabled, "agent mode");
        self.agent_mode = enabled;
    }

    /// Submit a user message and append the replies to the transcript.
    pub async fn send(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.transcript.push(Message::user(text));
        self.transcript.show_typing();

        let replies = match classify(text, self.workflow.pending_clarification()) {
            Route::Clarification(pending) => self.answer_clarification(pending, text).await,
            Route::Integration(integration) => vec![self.call_integration(integration, text).await],
            Route::Chat => self.chat(text).await,
        };

        self.transcript.hide_typing();
        for reply in replies {
            self.transcript.push(reply);
        }
    }

    pub async fn search(&mut self, query: &str) {
        self.transcript.push(Message::user(format!("🔍 Search: {query}")));
        self.transcript.show_typing();
        let resp = self.search_client.search(query).await;
        self.transcript.hide_typing();
        self.transcript.push(reply_message(resp, MessageSource::WebSearch, SEARCH_FALLBACK));
    }

    pub async fn smart_search(&mut self, query: &str) {
        self.transcript.push(Message::user(format!("🔍 Search: {query}")));
        self.transcript.show_typing();
        let resp = self.search_client.smart_search(query, None).await;
        self.transcript.hide_typing();
        self.transcript.push(reply_message(resp, MessageSource::WebSearch, SEARCH_FALLBACK));
    }

    pub async fn research(&mut self, query: &str) {
        self.transcript.push(Message::user(format!("📚 Research: {query}")));
        self.transcript.show_typing();
        let resp = self.search_client.research(query, self.research_depth).await;
        self.transcript.hide_typing();
        self.transcript.push(reply_message(resp, MessageSource::Research, RESEARCH_FALLBACK));
    }

    /// Execute a workflow step and append its outcome.
    pub async fn run_step(&mut self, step_id: &str) {
        self.transcript.show_typing();
        let message = self.run_step_message(step_id).await;
        self.transcript.hide_typing();
        self.transcript.push(message);
    }

    async fn call_integration(&self, integration: Integration, text: &str) -> Message {
        let resp = match parse_command(text) {
            Ok(cmd) => match self.integrations.get(cmd.integration) {
                Some(caller) => {
                    debug!(integration = %cmd.integration, tool = %cmd.tool, "dispatching command");
                    caller.call(&cmd).await
                }
                None => ChatResponse::failure(format!("No handler registered for {integration}")),
            },
            Err(e) => ChatResponse::failure(e.to_string()),
        };
        reply_message(resp, integration.source(), CHAT_FALLBACK)
    }

    async fn chat(&mut self, text: &str) -> Vec<Message> {
        let mut replies = Vec::new();
        if self.agent_mode {
            match self.workflow_client.detect_intention(text).await {
                Ok(Some(plan)) => replies.push(self.open_plan(plan)),
                Ok(None) => debug!("no workflow intention detected"),
                Err(e) => warn!(error = %e, "intention detection failed, continuing as chat"),
            }
        }

        // The backend gets the history that preceded this message.
        let resp = match self.chat_client.send(text, &self.history).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(error = %e, "chat request failed");
                e.into()
            }
        };
        if resp.success {
            if let Some(history) = &resp.conversation_history {
                self.history = history.clone();
            }
        }
        replies.push(reply_message(resp, MessageSource::Llm, CHAT_FALLBACK));
        replies
    }

    fn open_plan(&self, plan: WorkflowPlan) -> Message {
        let text = format!(
            "I've created a workflow plan with {} step{}:\n\n{}\n\nRun the current step with /run, or adjust the plan first.",
            plan.plan.len(),
            if plan.plan.len() == 1 { "" } else { "s" },
            describe_plan(&plan)
        );
        let component = serde_json::to_value(&plan).unwrap_or_default();
        self.workflow.open_workflow(plan);
        Message::ai(text, MessageSource::Workflow).with_component("workflow_plan", component)
    }

    async fn answer_clarification(&mut self, pending: PendingClarification, text: &str) -> Vec<Message> {
        let Some(step) = self.workflow.step(&pending.step_id) else {
            warn!(step_id = %pending.step_id, "clarification for a step that no longer exists");
            return self.chat(text).await;
        };

        let extracted = match self.workflow_client.extract_params(&step, text).await {
            Ok(extracted) => extracted,
            Err(e) => {
                error!(step_id = %step.id, error = %e, "parameter extraction failed");
                return vec![Message::ai(e.to_string(), MessageSource::Workflow)];
            }
        };
        if !extracted.success {
            let text = extracted
                .message
                .unwrap_or_else(|| "I couldn't find the missing details in that answer. Please try again.".to_string());
            return vec![Message::ai(text, MessageSource::Workflow)];
        }

        let parameters = extracted.string_parameters();
        if !parameters.is_empty() {
            self.workflow.update_step_parameters(&step.id, parameters);
        }

        if extracted.is_complete() {
            return vec![self.run_step_message(&step.id).await];
        }

        let guidance = extracted.message.clone().filter(|m| !m.trim().is_empty());
        let questions = match &guidance {
            Some(g) => vec![g.clone()],
            None => pending.questions.clone(),
        };
        let text = guidance.unwrap_or_else(|| format_questions(&questions));
        self.workflow.await_clarification(PendingClarification { questions, ..pending });
        vec![Message::ai(text, MessageSource::Workflow)]
    }

    async fn run_step_message(&self, step_id: &str) -> Message {
        let text = match self.workflow.run_step(&self.workflow_client, step_id).await {
            Ok(StepOutcome::Completed { next_step_id: Some(next) }) => {
                format!("✅ Step `{step_id}` completed. Next step: `{next}`.")
            }
            Ok(StepOutcome::Completed { next_step_id: None }) => {
                format!("✅ Step `{step_id}` completed. That was the last step.")
            }
            Ok(StepOutcome::NeedsClarification { questions }) => {
                format!("❓ Step `{step_id}` needs more information.\n\n{}", format_questions(&questions))
            }
            Ok(StepOutcome::Failed { error }) => format!("❌ Step `{step_id}` failed: {error}"),
            Ok(StepOutcome::InProgress) => format!("⏳ Step `{step_id}` is still in progress."),
            Err(e) => e.to_string(),
        };
        Message::ai(text, MessageSource::Workflow)
    }
}

/// A reply, or the failure text when the response carries none.
fn reply_message(resp: ChatResponse, source: MessageSource, fallback: &str) -> Message {
    match resp.into_reply(fallback) {
        Ok(text) => Message::ai(text, source),
        Err(e) => Message::ai(e.to_string(), source),
    }
}

fn format_questions(questions: &[String]) -> String {
    if questions.is_empty() {
        return "Please reply with the missing details.".to_string();
    }
    questions.iter().map(|q| format!("- {q}")).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::TYPING_INDICATOR_ID;
    use crate::workflow::{StepStatus, WorkflowStep};
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(agent_mode: bool) -> (MockServer, ChatOrchestrator) {
        let server = MockServer::start().await;
        let config = AivaConfig {
            app_base_url: server.uri(),
            integrations_base_url: server.uri(),
            agent_mode,
            welcome_message: "Welcome!".to_string(),
            ..AivaConfig::default()
        };
        let orchestrator = ChatOrchestrator::new(&config).unwrap();
        (server, orchestrator)
    }

    fn assert_no_typing(orchestrator: &ChatOrchestrator) {
        let typing = orchestrator
            .transcript()
            .messages()
            .iter()
            .filter(|m| m.id == TYPING_INDICATOR_ID)
            .count();
        assert_eq!(typing, 0);
    }

    fn last_text(orchestrator: &ChatOrchestrator) -> String {
        orchestrator.transcript().last().unwrap().text.clone()
    }

    fn two_step_plan() -> WorkflowPlan {
        WorkflowPlan {
            session_id: "sess-1".into(),
            plan: vec![
                WorkflowStep { id: "a".into(), software: "gmail".into(), ..Default::default() },
                WorkflowStep { id: "b".into(), software: "calendar".into(), ..Default::default() },
            ],
        }
    }

    #[test]
    fn test_classify_routes() {
        assert_eq!(classify("@gmail list", None), Route::Integration(Integration::Gmail));
        assert_eq!(classify("@gmailx list", None), Route::Chat);
        assert_eq!(classify("what's up", None), Route::Chat);

        let pending = PendingClarification { session_id: "s".into(), step_id: "a".into(), questions: vec![] };
        assert_eq!(classify("@docs read-doc", Some(pending.clone())), Route::Clarification(pending));
    }

    #[tokio::test]
    async fn test_plain_chat_replaces_history() {
        let (server, mut orchestrator) = setup(false).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "message": "hi",
                "conversationHistory": [{"role": "assistant", "content": "Welcome!"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "reply": "Hello there",
                "conversationHistory": [
                    {"role": "assistant", "content": "Welcome!"},
                    {"role": "user", "content": "hi"},
                    {"role": "assistant", "content": "Hello there"}
                ]
            })))
            .mount(&server)
            .await;

        orchestrator.send("hi").await;
        let messages = orchestrator.transcript().messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].text, "hi");
        assert_eq!(messages[2].text, "Hello there");
        assert_eq!(messages[2].source, Some(MessageSource::Llm));
        assert_eq!(orchestrator.history().len(), 3);
        assert_no_typing(&orchestrator);
    }

    #[tokio::test]
    async fn test_chat_failure_becomes_message() {
        let (server, mut orchestrator) = setup(false).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        orchestrator.send("hi").await;
        assert_eq!(last_text(&orchestrator), "API error: Internal Server Error");
        assert_eq!(orchestrator.history().len(), 1);
        assert_no_typing(&orchestrator);
    }

    #[tokio::test]
    async fn test_unsuccessful_reply_uses_error_text() {
        let (server, mut orchestrator) = setup(false).await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "model overloaded",
                "conversationHistory": []
            })))
            .mount(&server)
            .await;

        orchestrator.send("hi").await;
        assert_eq!(last_text(&orchestrator), "model overloaded");
        assert_eq!(orchestrator.history().len(), 1);
    }

    #[tokio::test]
    async fn test_command_goes_to_integration() {
        let (server, mut orchestrator) = setup(false).await;
        Mock::given(method("POST"))
            .and(path("/api/gmail/send"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messageId": "m-7"})))
            .mount(&server)
            .await;

        orchestrator.send(r#"@gmail send to:"a@b.com" subject:"Hi" body:"Yo""#).await;
        let last = orchestrator.transcript().last().unwrap();
        assert_eq!(last.text, "✅ Email sent successfully! Message ID: m-7");
        assert_eq!(last.source, Some(MessageSource::Gmail));
        assert_eq!(orchestrator.history().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_command_is_usage_text() {
        let (server, mut orchestrator) = setup(false).await;
        orchestrator.send("@docs").await;
        assert_eq!(
            last_text(&orchestrator),
            "Invalid command format. Please use format: @docs [tool] [param1:value1] [param2:value2]"
        );
        assert!(server.received_requests().await.unwrap().is_empty());
        assert_no_typing(&orchestrator);
    }

    #[tokio::test]
    async fn test_agent_mode_opens_plan() {
        let (server, mut orchestrator) = setup(true).await;
        Mock::given(method("POST"))
            .and(path("/api/workflow/process"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "plan_created",
                "session_id": "sess-1",
                "plan": [
                    {"id": "a", "software": "gmail", "api": {"name": "send", "description": ""}},
                    {"id": "b", "software": "calendar", "api": {"name": "create", "description": ""}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "reply": "On it."})))
            .mount(&server)
            .await;

        orchestrator.send("email Bob and book a meeting").await;
        let messages = orchestrator.transcript().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].source, Some(MessageSource::Workflow));
        assert!(messages[2].text.contains("2 steps"));
        assert_eq!(messages[2].components[0].kind, "workflow_plan");
        assert_eq!(messages[3].text, "On it.");
        assert!(orchestrator.workflow().is_open());
        assert_eq!(orchestrator.workflow().current_step_id().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_agent_mode_detection_failure_still_chats() {
        let (server, mut orchestrator) = setup(true).await;
        Mock::given(method("POST"))
            .and(path("/api/workflow/process"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "reply": "Sure."})))
            .mount(&server)
            .await;

        orchestrator.send("hello").await;
        assert_eq!(last_text(&orchestrator), "Sure.");
        assert!(!orchestrator.workflow().is_open());
    }

    #[tokio::test]
    async fn test_clarification_answer_completes_step() {
        let (server, mut orchestrator) = setup(false).await;
        Mock::given(method("POST"))
            .and(path("/api/workflow/execute-step"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "needs_clarification",
                "questions": ["Who should receive it?"]
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/workflow/execute-step"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "completed"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/workflow/extract-params"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "parameters": {"to": "bob@x.com"},
                "complete": true
            })))
            .mount(&server)
            .await;

        orchestrator.workflow().open_workflow(two_step_plan());
        orchestrator.run_step("a").await;
        assert!(last_text(&orchestrator).contains("- Who should receive it?"));
        assert!(orchestrator.workflow().pending_clarification().is_some());

        orchestrator.send("send it to bob@x.com").await;
        assert_eq!(last_text(&orchestrator), "✅ Step `a` completed. Next step: `b`.");
        let step = orchestrator.workflow().step("a").unwrap();
        assert_eq!(step.status, StepStatus::Completed);
        assert_eq!(step.parameters["to"], "bob@x.com");
        assert!(orchestrator.workflow().pending_clarification().is_none());
        assert_no_typing(&orchestrator);

        let chat_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/api/chat")
            .count();
        assert_eq!(chat_calls, 0);
    }

    #[tokio::test]
    async fn test_incomplete_clarification_keeps_waiting() {
        let (server, mut orchestrator) = setup(false).await;
        Mock::given(method("POST"))
            .and(path("/api/workflow/extract-params"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "parameters": {"to": "bob@x.com"},
                "complete": false,
                "message": "What should the subject be?"
            })))
            .mount(&server)
            .await;

        let store = orchestrator.workflow().clone();
        store.open_workflow(two_step_plan());
        store.await_clarification(PendingClarification {
            session_id: "sess-1".into(),
            step_id: "a".into(),
            questions: vec!["Who?".into()],
        });

        orchestrator.send("bob@x.com").await;
        assert_eq!(last_text(&orchestrator), "What should the subject be?");
        let pending = store.pending_clarification().unwrap();
        assert_eq!(pending.questions, vec!["What should the subject be?"]);
        assert_eq!(store.step("a").unwrap().status, StepStatus::NeedsClarification);
        assert_eq!(store.step("a").unwrap().parameters["to"], "bob@x.com");
    }

    #[tokio::test]
    async fn test_search_and_research_messages() {
        let (server, mut orchestrator) = setup(false).await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "reply": "results"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/you/research"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        orchestrator.search("rust").await;
        let messages = orchestrator.transcript().messages();
        assert_eq!(messages[1].text, "🔍 Search: rust");
        assert_eq!(messages[2].source, Some(MessageSource::WebSearch));
        assert_eq!(messages[2].text, "results");

        orchestrator.research("tokio").await;
        let messages = orchestrator.transcript().messages();
        assert_eq!(messages[3].text, "📚 Research: tokio");
        assert_eq!(messages[4].text, "API error: Internal Server Error");
        assert_eq!(messages[4].source, Some(MessageSource::Research));
        assert_no_typing(&orchestrator);
    }

    #[tokio::test]
    async fn test_run_unknown_step_reports_not_found() {
        let (_server, mut orchestrator) = setup(false).await;
        orchestrator.run_step("nope").await;
        assert_eq!(last_text(&orchestrator), "Not found: no open workflow");
        assert_no_typing(&orchestrator);
    }
}
