pub mod schema;
pub mod tokenizer;

use crate::chat::message::MessageSource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokenizer::{tokenize, Token};

/// A backend reachable through an `@prefix` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integration {
    Docs,
    Gmail,
    Calendar,
}

impl Integration {
    pub const ALL: [Integration; 3] = [Integration::Docs, Integration::Gmail, Integration::Calendar];

    pub fn prefix(self) -> &'static str {
        match self {
            Integration::Docs => "@docs",
            Integration::Gmail => "@gmail",
            Integration::Calendar => "@calendar",
        }
    }

    pub fn source(self) -> MessageSource {
        match self {
            Integration::Docs => MessageSource::Mcp,
            Integration::Gmail => MessageSource::Gmail,
            Integration::Calendar => MessageSource::Calendar,
        }
    }

    pub fn from_prefix(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.prefix() == token)
    }

    /// Accepts `docs` as well as `@docs`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_prefix('@').unwrap_or(name);
        Self::ALL.into_iter().find(|i| &i.prefix()[1..] == name)
    }
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// A parsed parameter value. Serializes to the plain JSON scalar or array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(serde_json::Number),
    List(Vec<String>),
    Text(String),
}

impl ParamValue {
    /// Absent-equivalent for required-parameter checks: an empty or
    /// whitespace-only string.
    pub fn is_blank(&self) -> bool {
        matches!(self, ParamValue::Text(s) if s.trim().is_empty())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Number(n) => write!(f, "{n}"),
            ParamValue::List(items) => f.write_str(&items.join(",")),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// Ephemeral parse result, dropped after dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub integration: Integration,
    pub tool: String,
    pub parameters: HashMap<String, ParamValue>,
}

impl Command {
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.parameters.get(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Not an integration command")]
    NotACommand,
    #[error("Invalid command format. Please use format: {} [tool] [param1:value1] [param2:value2]", .0.prefix())]
    MissingTool(Integration),
}

/// The integration addressed by `text`, if its first token is a known prefix.
pub fn classify(text: &str) -> Option<Integration> {
    text.split_whitespace().next().and_then(Integration::from_prefix)
}

pub fn parse_command(text: &str) -> Result<Command, ParseError> {
    let text = text.trim();
    let (head, rest) = split_first_word(text);
    let integration = Integration::from_prefix(head).ok_or(ParseError::NotACommand)?;

    let (tool, params) = split_first_word(rest.trim_start());
    if tool.is_empty() {
        return Err(ParseError::MissingTool(integration));
    }

    let mut parameters = HashMap::new();
    for token in tokenize(params) {
        if let Token::Pair { key, value, .. } = token {
            parameters.insert(key.to_string(), coerce(integration, key, value));
        }
    }

    Ok(Command { integration, tool: tool.to_string(), parameters })
}

fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(idx) => (&text[..idx], &text[idx..]),
        None => (text, ""),
    }
}

fn coerce(integration: Integration, key: &str, value: &str) -> ParamValue {
    match integration {
        Integration::Docs => ParamValue::Text(value.to_string()),
        Integration::Calendar if key == "attendees" => {
            ParamValue::List(value.split(',').map(|s| s.trim().to_string()).collect())
        }
        Integration::Gmail | Integration::Calendar => coerce_scalar(value),
    }
}

fn coerce_scalar(value: &str) -> ParamValue {
    match value {
        "true" => return ParamValue::Bool(true),
        "false" => return ParamValue::Bool(false),
        "" => return ParamValue::Text(String::new()),
        _ => {}
    }
    if let Ok(n) = value.parse::<i64>() {
        return ParamValue::Number(n.into());
    }
    if let Some(n) = value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
    {
        return ParamValue::Number(n);
    }
    ParamValue::Text(value.to_string())
}
