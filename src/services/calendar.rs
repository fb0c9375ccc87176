use super::{endpoint, missing_parameters_reply, pretty, str_field, Backend, ChatResponse, IntegrationCaller};
use crate::command::{Command, Integration};
use crate::error::AppResult;
use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use tracing::{error, info};

const DESCRIPTION_PREVIEW_CHARS: usize = 100;

pub struct CalendarCaller {
    backend: Backend,
    base_url: String,
}

impl CalendarCaller {
    pub fn new(backend: Backend, base_url: &str) -> Self {
        Self { backend, base_url: base_url.to_string() }
    }

    async fn request(&self, command: &Command) -> AppResult<String> {
        let url = endpoint(&self.base_url, &["api", "calendar", &command.tool])?;
        info!(tool = %command.tool, %url, "calling Calendar API");
        let data: Value = self.backend.post(url, &command.parameters, "Calendar server error").await?;
        Ok(format_reply(&command.tool, &data))
    }
}

#[async_trait::async_trait]
impl IntegrationCaller for CalendarCaller {
    fn integration(&self) -> Integration {
        Integration::Calendar
    }

    async fn call(&self, command: &Command) -> ChatResponse {
        if let Some(reply) = missing_parameters_reply(command) {
            return reply;
        }
        match self.request(command).await {
            Ok(reply) => ChatResponse::reply(reply),
            Err(e) => {
                error!(tool = %command.tool, error = %e, "Calendar call failed");
                e.into()
            }
        }
    }
}

pub(crate) fn format_reply(tool: &str, data: &Value) -> String {
    match tool {
        "list" => format_events_list(data),
        "create" => format_event_creation(data),
        "update" => format!("✅ Event updated successfully. Event ID: {}", str_field(data, "eventId").unwrap_or("N/A")),
        "delete" => format!("✅ Event deleted successfully. Event ID: {}", str_field(data, "eventId").unwrap_or("N/A")),
        _ => format!("Operation completed: {}", pretty(data)),
    }
}

fn format_events_list(data: &Value) -> String {
    let events = match data.as_array() {
        Some(events) if !events.is_empty() => events,
        _ => return "No events found matching your criteria.".to_string(),
    };

    let mut out = format!(
        "### 📅 Found {} event{}:\n\n",
        events.len(),
        if events.len() > 1 { "s" } else { "" }
    );
    for (idx, event) in events.iter().enumerate() {
        out.push_str(&format!("#### {}. {}\n\n", idx + 1, str_field(event, "summary").unwrap_or("Untitled Event")));
        out.push_str(&format!(
            "* **When:** {} to {}\n",
            format_event_time(event.get("start")),
            format_event_time(event.get("end"))
        ));
        if let Some(location) = str_field(event, "location") {
            out.push_str(&format!("* **Where:** {location}\n"));
        }
        if let Some(description) = str_field(event, "description") {
            out.push_str(&format!("* **Description:** {}\n", truncate(description, DESCRIPTION_PREVIEW_CHARS)));
        }
        out.push_str(&format!("* **ID:** `{}`\n\n", str_field(event, "id").unwrap_or("N/A")));
        if idx + 1 < events.len() {
            out.push_str("---\n\n");
        }
    }
    out.push_str("\n> **Tip:** To update an event, use: `@calendar update eventId:\"[event_id]\" summary:\"New Title\"`");
    out
}

fn format_event_creation(data: &Value) -> String {
    let event = data.get("event").filter(|e| e.is_object());
    let event_id = str_field(data, "eventId");
    if event.is_none() && event_id.is_none() {
        return "✅ Event created successfully.".to_string();
    }
    let event = event.unwrap_or(data);
    let event_id = event_id.or_else(|| str_field(event, "id")).unwrap_or("N/A");

    let mut out = String::from("### ✅ Event created successfully!\n\n");
    out.push_str(&format!("#### {}\n\n", str_field(event, "summary").unwrap_or("Untitled Event")));
    out.push_str(&format!(
        "* **When:** {} to {}\n",
        format_event_time(event.get("start")),
        format_event_time(event.get("end"))
    ));
    if let Some(location) = str_field(event, "location") {
        out.push_str(&format!("* **Where:** {location}\n"));
    }
    if let Some(description) = str_field(event, "description") {
        out.push_str(&format!("* **Description:** {description}\n"));
    }
    let attendees: Vec<&str> = event
        .get("attendees")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|a| a.as_str().or_else(|| a.get("email").and_then(|e| e.as_str())))
                .collect()
        })
        .unwrap_or_default();
    if !attendees.is_empty() {
        out.push_str(&format!("* **Attendees:** {}\n", attendees.join(", ")));
    }
    out.push_str(&format!("* **Event ID:** `{event_id}`\n\n"));
    out.push_str("\n> **Tip:** View all events with `@calendar list`");
    out
}

/// Render a Calendar `{date}` or `{dateTime}` object.
fn format_event_time(value: Option<&Value>) -> String {
    let Some(value) = value.filter(|v| v.is_object()) else {
        return "Unknown time".to_string();
    };
    if let Some(date) = str_field(value, "date") {
        return match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
            Ok(d) => d.format("%b %-d, %Y").to_string(),
            Err(_) => "Invalid date".to_string(),
        };
    }
    if let Some(date_time) = str_field(value, "dateTime") {
        return match DateTime::parse_from_rfc3339(date_time) {
            Ok(dt) => dt.format("%b %-d, %Y %H:%M").to_string(),
            Err(_) => "Invalid date".to_string(),
        };
    }
    "Unknown time".to_string()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        text.to_string()
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

    async fn setup() -> (MockServer, CalendarCaller) {
        let server = MockServer::start().await;
        let backend = Backend::new(&AivaConfig::default()).unwrap();
        let caller = CalendarCaller::new(backend, &server.uri());
        (server, caller)
    }

    #[tokio::test]
    async fn test_create_sends_attendee_list() {
        let (server, caller) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/calendar/create"))
            .and(body_json(json!({
                "summary": "Standup",
                "start": "2025-04-05T10:00:00Z",
                "end": "2025-04-05T10:30:00Z",
                "attendees": ["a@x.com", "b@y.com"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "eventId": "ev-9",
                "event": {
                    "summary": "Standup",
                    "start": {"dateTime": "2025-04-05T10:00:00Z"},
                    "end": {"dateTime": "2025-04-05T10:30:00Z"},
                    "attendees": [{"email": "a@x.com"}, {"email": "b@y.com"}]
                }
            })))
            .mount(&server)
            .await;

        let cmd = parse_command(
            r#"@calendar create summary:"Standup" start:"2025-04-05T10:00:00Z" end:"2025-04-05T10:30:00Z" attendees:"a@x.com,b@y.com""#,
        )
        .unwrap();
        let reply = caller.call(&cmd).await.reply.unwrap();
        assert!(reply.starts_with("### ✅ Event created successfully!"));
        assert!(reply.contains("* **When:** Apr 5, 2025 10:00 to Apr 5, 2025 10:30"));
        assert!(reply.contains("* **Attendees:** a@x.com, b@y.com"));
        assert!(reply.contains("`ev-9`"));
    }

    #[tokio::test]
    async fn test_create_missing_times_is_guidance() {
        let (server, caller) = setup().await;
        let cmd = parse_command(r#"@calendar create summary:"Lunch""#).unwrap();
        let resp = caller.call(&cmd).await;
        assert!(resp.success);
        assert_eq!(
            resp.reply.unwrap(),
            "Missing required parameters. Please provide start, end parameters for the create tool."
        );
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_error_status() {
        let (server, caller) = setup().await;
        Mock::given(method("POST"))
            .and(path("/api/calendar/delete"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cmd = parse_command("@calendar delete eventId:gone").unwrap();
        let resp = caller.call(&cmd).await;
        assert!(!resp.success);
        assert_eq!(resp.error.unwrap(), "Calendar server error: Not Found");
    }

    #[test]
    fn test_list_truncates_description() {
        let long = "x".repeat(150);
        let reply = format_reply(
            "list",
            &json!([{
                "id": "e1",
                "summary": "Offsite",
                "location": "HQ",
                "description": long,
                "start": {"date": "2025-06-01"},
                "end": {"date": "2025-06-02"}
            }]),
        );
        assert!(reply.starts_with("### 📅 Found 1 event:"));
        assert!(reply.contains("* **When:** Jun 1, 2025 to Jun 2, 2025"));
        assert!(reply.contains("* **Where:** HQ"));
        assert!(reply.contains(&format!("* **Description:** {}...", "x".repeat(100))));
        assert!(!reply.contains(&"x".repeat(101)));
    }

    #[test]
    fn test_event_time_fallbacks() {
        assert_eq!(format_event_time(None), "Unknown time");
        assert_eq!(format_event_time(Some(&json!({}))), "Unknown time");
        assert_eq!(format_event_time(Some(&json!({"dateTime": "tomorrow"}))), "Invalid date");
    }

    #[test]
    fn test_bare_create_and_mutations() {
        assert_eq!(format_reply("create", &json!({})), "✅ Event created successfully.");
        assert_eq!(
            format_reply("update", &json!({"eventId": "e7"})),
            "✅ Event updated successfully. Event ID: e7"
        );
        assert_eq!(format_reply("delete", &json!({})), "✅ Event deleted successfully. Event ID: N/A");
        assert_eq!(format_reply("list", &json!([])), "No events found matching your criteria.");
    }
}
