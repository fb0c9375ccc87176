use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TYPING_INDICATOR_ID: &str = "typing-indicator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Ai,
    Typing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Chat,
    Workflow,
    Tool,
    User,
    Llm,
    Mcp,
    Gmail,
    Calendar,
    WebSearch,
    Research,
}

/// Structured attachment rendered alongside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageComponent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<MessageSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<MessageComponent>,
}

impl Message {
    fn new(message_type: MessageType, text: impl Into<String>, source: Option<MessageSource>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            message_type,
            text: text.into(),
            timestamp: Utc::now(),
            source,
            components: Vec::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageType::User, text, Some(MessageSource::User))
    }

    pub fn ai(text: impl Into<String>, source: MessageSource) -> Self {
        Self::new(MessageType::Ai, text, Some(source))
    }

    pub fn typing() -> Self {
        Self {
            id: TYPING_INDICATOR_ID.to_string(),
            ..Self::new(MessageType::Typing, "", None)
        }
    }

    pub fn with_component(mut self, kind: &str, content: serde_json::Value) -> Self {
        self.components.push(MessageComponent {
            id: Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            content,
        });
        self
    }

    pub fn is_typing(&self) -> bool {
        self.id == TYPING_INDICATOR_ID
    }
}

/// Append-only message list. Holds at most one typing placeholder,
/// always in last position while shown.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(welcome: &str) -> Self {
        Self { messages: vec![Message::ai(welcome, MessageSource::Chat)] }
    }

    /// Append a message, keeping the placeholder last if it is shown.
    /// A typing message pushed here is treated as `show_typing`.
    pub fn push(&mut self, message: Message) {
        if message.is_typing() {
            self.show_typing();
            return;
        }
        match self.messages.iter().position(Message::is_typing) {
            Some(idx) => self.messages.insert(idx, message),
            None => self.messages.push(message),
        }
    }

    pub fn show_typing(&mut self) {
        self.hide_typing();
        self.messages.push(Message::typing());
    }

    pub fn hide_typing(&mut self) {
        self.messages.retain(|m| !m.is_typing());
    }

    pub fn is_typing(&self) -> bool {
        self.messages.iter().any(Message::is_typing)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
