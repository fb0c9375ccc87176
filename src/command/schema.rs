// ============================================
// TOOL SCHEMA
// Declarative parameter tables shared by
// validation, help text and suggestions
// ============================================

use super::{classify, parse_command, Command, Integration};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
    pub example: &'static str,
}

impl ToolSpec {
    pub fn required(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.params.iter().filter(|p| p.required).map(|p| p.name)
    }
}

const fn req(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec { name, required: true, description }
}

const fn opt(name: &'static str, description: &'static str) -> ParamSpec {
    ParamSpec { name, required: false, description }
}

// ============================================
// TABLES
// ============================================

pub static DOCS_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "create-doc",
        description: "Create a new Google Doc",
        params: &[req("title", "Document title"), opt("org", "Share with this domain"), opt("role", "Sharing role")],
        example: r#"@docs create-doc title:"My Meeting Notes" org:example.com role:writer"#,
    },
    ToolSpec {
        name: "read-doc",
        description: "Read content from a Google Doc",
        params: &[req("document_id", "Document ID")],
        example: "@docs read-doc document_id:1F2_jauT6IZLCOkBPvcwIxPJbmOyleXvGRyvQaNP5bI8",
    },
    ToolSpec {
        name: "rewrite-document",
        description: "Rewrite the entire content of a Google Doc",
        params: &[req("document_id", "Document ID"), req("final_text", "New document text")],
        example: r#"@docs rewrite-document document_id:1F2_jauT6IZLCOkBPvcwIxPJbmOyleXvGRyvQaNP5bI8 final_text:"New content""#,
    },
    ToolSpec {
        name: "read-comments",
        description: "Read comments on a Google Doc",
        params: &[req("document_id", "Document ID")],
        example: "@docs read-comments document_id:1F2_jauT6IZLCOkBPvcwIxPJbmOyleXvGRyvQaNP5bI8",
    },
    ToolSpec {
        name: "create-comment",
        description: "Add a comment to a Google Doc",
        params: &[req("document_id", "Document ID"), req("content", "Comment text")],
        example: r#"@docs create-comment document_id:1F2_jauT6IZLCOkBPvcwIxPJbmOyleXvGRyvQaNP5bI8 content:"This looks great!""#,
    },
    ToolSpec {
        name: "reply-comment",
        description: "Reply to a comment",
        params: &[opt("document_id", "Document ID"), opt("comment_id", "Comment ID"), opt("reply", "Reply text")],
        example: r#"@docs reply-comment document_id:1F2_jauT6IZLCOkBPvcwIxPJbmOyleXvGRyvQaNP5bI8 comment_id:123 reply:"Thanks!""#,
    },
    ToolSpec {
        name: "delete-reply",
        description: "Delete a reply from a comment",
        params: &[opt("document_id", "Document ID"), opt("comment_id", "Comment ID"), opt("reply_id", "Reply ID")],
        example: "@docs delete-reply document_id:1F2_jauT6IZLCOkBPvcwIxPJbmOyleXvGRyvQaNP5bI8 comment_id:123 reply_id:456",
    },
];

pub static GMAIL_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "list",
        description: "List emails from your inbox",
        params: &[opt("maxResults", "Number of emails"), opt("query", "Gmail search filter")],
        example: r#"@gmail list maxResults:5 query:"is:unread""#,
    },
    ToolSpec {
        name: "search",
        description: "Search for specific emails",
        params: &[req("query", "Gmail search query"), opt("maxResults", "Number of emails")],
        example: r#"@gmail search query:"from:example@gmail.com has:attachment" maxResults:10"#,
    },
    ToolSpec {
        name: "get",
        description: "Get a single email by ID",
        params: &[req("id", "Email ID")],
        example: "@gmail get id:18e046d9a8b26397",
    },
    ToolSpec {
        name: "send",
        description: "Send a new email",
        params: &[req("to", "Recipient"), req("subject", "Subject line"), req("body", "Message body")],
        example: r#"@gmail send to:"recipient@example.com" subject:"Hello from AI" body:"This is a test email.""#,
    },
    ToolSpec {
        name: "modify",
        description: "Modify email labels",
        params: &[req("id", "Email ID"), opt("addLabels", "Labels to add"), opt("removeLabels", "Labels to remove")],
        example: r#"@gmail modify id:18e046d9a8b26397 addLabels:"UNREAD,IMPORTANT" removeLabels:"INBOX""#,
    },
];

pub static CALENDAR_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: "list",
        description: "List upcoming calendar events",
        params: &[opt("maxResults", "Number of events"), opt("timeMin", "Start of range"), opt("timeMax", "End of range")],
        example: r#"@calendar list maxResults:10 timeMin:"2025-03-01T00:00:00Z" timeMax:"2025-04-30T23:59:59Z""#,
    },
    ToolSpec {
        name: "create",
        description: "Create a new calendar event",
        params: &[
            req("summary", "Event title"),
            req("start", "Start time (RFC 3339)"),
            req("end", "End time (RFC 3339)"),
            opt("location", "Where"),
            opt("description", "Details"),
            opt("attendees", "Comma-separated emails"),
        ],
        example: r#"@calendar create summary:"Team Meeting" start:"2025-04-05T10:00:00Z" end:"2025-04-05T11:00:00Z" attendees:"a@example.com,b@example.com""#,
    },
    ToolSpec {
        name: "update",
        description: "Update an existing calendar event",
        params: &[
            req("eventId", "Event ID"),
            opt("summary", "Event title"),
            opt("location", "Where"),
            opt("description", "Details"),
            opt("start", "Start time (RFC 3339)"),
            opt("end", "End time (RFC 3339)"),
            opt("attendees", "Comma-separated emails"),
        ],
        example: r#"@calendar update eventId:"abc123def456ghi789" summary:"Updated Meeting Title""#,
    },
    ToolSpec {
        name: "delete",
        description: "Delete a calendar event",
        params: &[req("eventId", "Event ID")],
        example: r#"@calendar delete eventId:"abc123def456ghi789""#,
    },
];

pub fn tools(integration: Integration) -> &'static [ToolSpec] {
    match integration {
        Integration::Docs => DOCS_TOOLS,
        Integration::Gmail => GMAIL_TOOLS,
        Integration::Calendar => CALENDAR_TOOLS,
    }
}

pub fn find_tool(integration: Integration, name: &str) -> Option<&'static ToolSpec> {
    tools(integration).iter().find(|t| t.name == name)
}

/// Required parameters of `command`'s tool that are absent or blank.
/// Unknown tools have no requirements.
pub fn missing_required(command: &Command) -> Vec<&'static str> {
    let Some(spec) = find_tool(command.integration, &command.tool) else {
        return Vec::new();
    };
    spec.required()
        .filter(|name| command.param(name).map_or(true, |v| v.is_blank()))
        .collect()
}

/// Guidance text for missing parameters.
pub fn missing_parameters_message(tool: &str, missing: &[&str]) -> String {
    format!(
        "Missing required parameters. Please provide {} parameter{} for the {} tool.",
        missing.join(", "),
        if missing.len() > 1 { "s" } else { "" },
        tool
    )
}

// ============================================
// SUGGESTIONS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    /// Tools whose name starts with the partially typed tool token.
    Tools(Vec<&'static ToolSpec>),
    /// The next parameter to fill, required ones first.
    Parameter(&'static ParamSpec),
}

impl Suggestion {
    /// Inline placeholder text for the suggestion.
    pub fn ghost_text(&self) -> String {
        match self {
            Suggestion::Tools(tools) => tools.first().map(|t| t.name.to_string()).unwrap_or_default(),
            Suggestion::Parameter(p) => format!("{}:\"\"", p.name),
        }
    }
}

/// Suggest what to type next for a partially typed command.
pub fn suggest(input: &str) -> Option<Suggestion> {
    let integration = classify(input)?;
    let rest = input.trim_start()[integration.prefix().len()..].trim_start();

    let tool_complete = rest.contains(char::is_whitespace);
    if !tool_complete {
        let matches: Vec<_> = tools(integration).iter().filter(|t| t.name.starts_with(rest)).collect();
        return if matches.is_empty() { None } else { Some(Suggestion::Tools(matches)) };
    }

    let command = parse_command(input).ok()?;
    let spec = find_tool(integration, &command.tool)?;
    let unfilled = |p: &&ParamSpec| !command.parameters.contains_key(p.name);
    spec.params
        .iter()
        .filter(|p| p.required)
        .find(unfilled)
        .or_else(|| spec.params.iter().find(unfilled))
        .map(Suggestion::Parameter)
}

/// Markdown help listing an integration's tools.
pub fn help_text(integration: Integration) -> String {
    let mut out = format!("### Available {} commands\n\n", integration.prefix());
    for tool in tools(integration) {
        out.push_str(&format!("* **{}** - {}\n", tool.name, tool.description));
        if !tool.params.is_empty() {
            let params: Vec<String> = tool
                .params
                .iter()
                .map(|p| if p.required { format!("{}*", p.name) } else { p.name.to_string() })
                .collect();
            out.push_str(&format!("  * Parameters: {}\n", params.join(", ")));
        }
        out.push_str(&format!("  * Example: `{}`\n", tool.example));
    }
    out.push_str("\n_* required_");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_gmail_search() {
        let cmd = parse_command("@gmail search maxResults:3").unwrap();
        assert_eq!(missing_required(&cmd), vec!["query"]);
    }

    #[test]
    fn test_blank_counts_as_missing() {
        let cmd = parse_command(r#"@gmail send to:"a@b.com" subject:"   " body:"#).unwrap();
        assert_eq!(missing_required(&cmd), vec!["subject", "body"]);
    }

    #[test]
    fn test_unknown_tool_has_no_requirements() {
        let cmd = parse_command("@calendar snooze").unwrap();
        assert!(missing_required(&cmd).is_empty());
    }

    #[test]
    fn test_missing_message_plural() {
        assert_eq!(
            missing_parameters_message("get", &["id"]),
            "Missing required parameters. Please provide id parameter for the get tool."
        );
        assert_eq!(
            missing_parameters_message("send", &["to", "body"]),
            "Missing required parameters. Please provide to, body parameters for the send tool."
        );
    }

    #[test]
    fn test_every_example_parses_to_its_tool() {
        for integration in Integration::ALL {
            for tool in tools(integration) {
                let cmd = parse_command(tool.example).unwrap();
                assert_eq!(cmd.integration, integration);
                assert_eq!(cmd.tool, tool.name);
                assert!(missing_required(&cmd).is_empty(), "{} example lacks params", tool.name);
            }
        }
    }

    #[test]
    fn test_suggest_tools() {
        match suggest("@docs re").unwrap() {
            Suggestion::Tools(tools) => {
                let names: Vec<_> = tools.iter().map(|t| t.name).collect();
                assert_eq!(names, vec!["read-doc", "rewrite-document", "read-comments", "reply-comment"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(suggest("@docs zzz").is_none());
    }

    #[test]
    fn test_suggest_next_required_then_optional() {
        let s = suggest(r#"@gmail send to:"a@b.com" "#).unwrap();
        assert_eq!(s, Suggestion::Parameter(&GMAIL_TOOLS[3].params[1]));
        assert_eq!(s.ghost_text(), "subject:\"\"");

        let s = suggest("@gmail modify id:1 ").unwrap();
        assert_eq!(s.ghost_text(), "addLabels:\"\"");

        assert!(suggest("@gmail get id:1 ").is_none());
        assert!(suggest("plain text").is_none());
    }

    #[test]
    fn test_help_text_lists_all_tools() {
        let help = help_text(Integration::Calendar);
        for tool in CALENDAR_TOOLS {
            assert!(help.contains(tool.name));
        }
        assert!(help.contains("summary*"));
    }
}
