use super::{endpoint, missing_parameters_reply, pretty, Backend, ChatResponse, IntegrationCaller};
use crate::command::{Command, Integration, ParamValue};
use crate::error::{AppError, AppResult};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info};

/// Envelope returned by the document backend.
#[derive(Debug, Deserialize)]
struct DocsResponse {
    status: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

pub struct DocsCaller {
    backend: Backend,
    base_url: String,
}

impl DocsCaller {
    pub fn new(backend: Backend, base_url: &str) -> Self {
        Self { backend, base_url: base_url.to_string() }
    }

    async fn request(&self, command: &Command) -> AppResult<String> {
        let url = endpoint(&self.base_url, &["mcp", &command.tool])?;
        info!(tool = %command.tool, %url, "calling document server");
        let body = request_body(command);
        let resp: DocsResponse = self.backend.post(url, &body, "MCP server error").await?;
        if resp.status != "success" {
            return Err(AppError::Server(
                resp.error.unwrap_or_else(|| "Unknown error from MCP server".to_string()),
            ));
        }
        Ok(format_reply(&command.tool, resp.result.as_ref().unwrap_or(&Value::Null)))
    }
}

#[async_trait::async_trait]
impl IntegrationCaller for DocsCaller {
    fn integration(&self) -> Integration {
        Integration::Docs
    }

    async fn call(&self, command: &Command) -> ChatResponse {
        if let Some(reply) = missing_parameters_reply(command) {
            return reply;
        }
        match self.request(command).await {
            Ok(reply) => ChatResponse::reply(reply),
            Err(e) => {
                error!(tool = %command.tool, error = %e, "document server call failed");
                e.into()
            }
        }
    }
}

/// `read-doc` only takes the document id; every other tool gets all parameters.
fn request_body(command: &Command) -> HashMap<&str, &ParamValue> {
    command
        .parameters
        .iter()
        .filter(|(name, _)| command.tool != "read-doc" || name.as_str() == "document_id")
        .map(|(name, value)| (name.as_str(), value))
        .collect()
}

pub(crate) fn format_reply(tool: &str, result: &Value) -> String {
    let field = |key: &str| result.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    match tool {
        "create-doc" => format!(
            "✅ Document created successfully!\nDocument ID: {}\n{}",
            field("document_id"),
            field("content")
        ),
        "read-doc" => format!("📄 Document content:\n\n{}", field("content")),
        "rewrite-document" => "✅ Document updated successfully!".to_string(),
        "read-comments" => format!("💬 Comments:\n\n{}", field("content")),
        _ => format!("Operation completed successfully: {}", pretty(result)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::parse_command;
    use crate::config::AivaConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, DocsCaller) {
        let server = MockServer::start().await;
        let backend = Backend::new(&AivaConfig::default()).unwrap();
        let caller = DocsCaller::new(backend, &server.uri());
        (server, caller)
    }

    #[tokio::test]
    async fn test_create_doc() {
        let (server, caller) = setup().await;
        Mock::given(method("POST"))
            .and(path("/mcp/create-doc"))
            .and(body_json(json!({"title": "Q3 Plan"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "result": {"document_id": "abc", "content": "created"}
            })))
            .mount(&server)
            .await;

        let cmd = parse_command(r#"@docs create-doc title:"Q3 Plan""#).unwrap();
        let resp = caller.call(&cmd).await;
        assert!(resp.success);
        assert_eq!(resp.reply.unwrap(), "✅ Document created successfully!\nDocument ID: abc\ncreated");
    }

    #[tokio::test]
    async fn test_read_doc_sends_only_document_id() {
        let (server, caller) = setup().await;
        Mock::given(method("POST"))
            .and(path("/mcp/read-doc"))
            .and(body_json(json!({"document_id": "abc"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "result": {"content": "Hello doc"}
            })))
            .mount(&server)
            .await;

        let cmd = parse_command("@docs read-doc document_id:abc extra:ignored").unwrap();
        let resp = caller.call(&cmd).await;
        assert_eq!(resp.reply.unwrap(), "📄 Document content:\n\nHello doc");
    }

    #[tokio::test]
    async fn test_non_success_status_is_failure() {
        let (server, caller) = setup().await;
        Mock::given(method("POST"))
            .and(path("/mcp/read-comments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "error"})))
            .mount(&server)
            .await;

        let cmd = parse_command("@docs read-comments document_id:abc").unwrap();
        let resp = caller.call(&cmd).await;
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap(), "Unknown error from MCP server");
    }

    #[tokio::test]
    async fn test_blank_required_param_is_guidance() {
        let (server, caller) = setup().await;
        let cmd = parse_command(r#"@docs rewrite-document document_id:abc final_text:"  ""#).unwrap();
        let resp = caller.call(&cmd).await;
        assert!(resp.success);
        assert!(resp.reply.unwrap().contains("final_text"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_format_other_tools() {
        assert_eq!(format_reply("rewrite-document", &Value::Null), "✅ Document updated successfully!");
        assert_eq!(format_reply("read-comments", &json!({"content": "lgtm"})), "💬 Comments:\n\nlgtm");
        assert!(format_reply("delete-reply", &json!({"ok": true})).starts_with("Operation completed successfully: {"));
    }
}
