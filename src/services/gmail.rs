use super::{endpoint, missing_parameters_reply, pretty, str_field, Backend, ChatResponse, IntegrationCaller};
use crate::command::{Command, Integration};
use crate::error::AppResult;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{error, info};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

pub struct GmailCaller {
    backend: Backend,
    base_url: String,
}

impl GmailCaller {
    pub fn new(backend: Backend, base_url: &str) -> Self {
        Self { backend, base_url: base_url.to_string() }
    }

    async fn request(&self, command: &Command) -> AppResult<String> {
        let url = endpoint(&self.base_url, &["api", "gmail", &command.tool])?;
        info!(tool = %command.tool, %url, "calling Gmail API");
        let data: Value = self.backend.post(url, &command.parameters, "Gmail server error").await?;
        Ok(format_reply(&command.tool, &data))
    }
}

#[async_trait::async_trait]
impl IntegrationCaller for GmailCaller {
    fn integration(&self) -> Integration {
        Integration::Gmail
    }

    async fn call(&self, command: &Command) -> ChatResponse {
        if let Some(reply) = missing_parameters_reply(command) {
            return reply;
        }
        match self.request(command).await {
            Ok(reply) => ChatResponse::reply(reply),
            Err(e) => {
                error!(tool = %command.tool, error = %e, "Gmail call failed");
                e.into()
            }
        }
    }
}

pub(crate) fn format_reply(tool: &str, data: &Value) -> String {
    match tool {
        "list" | "search" => format_emails_list(data),
        "get" => format_email_details(data),
        "send" => format!("✅ Email sent successfully! Message ID: {}", str_field(data, "messageId").unwrap_or("N/A")),
        "modify" => format!("✅ Email modified successfully. Message ID: {}", str_field(data, "messageId").unwrap_or("N/A")),
        _ => format!("Operation completed: {}", pretty(data)),
    }
}

fn format_emails_list(data: &Value) -> String {
    let emails = match data.as_array() {
        Some(emails) if !emails.is_empty() => emails,
        _ => return "No emails found matching your criteria.".to_string(),
    };

    let mut out = format!(
        "### 📨 Found {} email{}:\n\n",
        emails.len(),
        if emails.len() > 1 { "s" } else { "" }
    );
    for (idx, email) in emails.iter().enumerate() {
        out.push_str(&format!("#### {}. {}\n\n", idx + 1, str_field(email, "subject").unwrap_or("No subject")));
        out.push_str(&format!("* **From:** {}\n", str_field(email, "from").unwrap_or("Unknown sender")));
        out.push_str(&format!("* **Date:** {}\n", str_field(email, "date").unwrap_or("Unknown date")));
        out.push_str(&format!("* **ID:** `{}`\n\n", str_field(email, "id").unwrap_or("N/A")));
        if idx + 1 < emails.len() {
            out.push_str("---\n\n");
        }
    }
    out.push_str("\n> **Tip:** To view a specific email, use: `@gmail get id:\"[email_id]\"`");
    out
}

fn format_email_details(email: &Value) -> String {
    if !email.is_object() {
        return "Email not found or unable to retrieve details.".to_string();
    }

    let mut out = String::from("### 📧 **Email Details**\n\n");
    out.push_str(&format!("#### Subject: {}\n\n", str_field(email, "subject").unwrap_or("No subject")));
    out.push_str(&format!("* **From:** {}\n", str_field(email, "from").unwrap_or("Unknown sender")));
    out.push_str(&format!("* **To:** {}\n", str_field(email, "to").unwrap_or("No recipients")));
    out.push_str(&format!("* **Date:** {}\n", str_field(email, "date").unwrap_or("Unknown date")));

    let labels: Vec<&str> = email
        .get("labelIds")
        .and_then(|v| v.as_array())
        .map(|ids| ids.iter().filter_map(|l| l.as_str()).collect())
        .unwrap_or_default();
    if !labels.is_empty() {
        out.push_str(&format!("* **Labels:** {}\n", labels.join(", ")));
    }

    out.push_str("\n#### Message Content:\n\n");
    match str_field(email, "body") {
        Some(body) if body.contains('<') => {
            out.push_str("> *Note: HTML content converted to text*\n\n");
            out.push_str(&html_to_text(body));
        }
        Some(body) => out.push_str(body),
        None => out.push_str(str_field(email, "snippet").unwrap_or("No content")),
    }
    out
}

fn html_to_text(html: &str) -> String {
    let stripped = HTML_TAG.replace_all(html, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}
