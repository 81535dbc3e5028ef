use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Speaker role for a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message. Immutable once sent along an edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// A producer-tagged response gathered at a fan-in barrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedResponse {
    pub producer: NodeId,
    pub text: String,
}

/// Payload delivered to a node along an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    /// A conversation history, as handed to the start node.
    Conversation(Vec<ChatMessage>),
    /// Plain text, the common currency between nodes.
    Text(String),
    /// A structured value.
    Json(serde_json::Value),
    /// A completed fan-in batch, ordered by producer id.
    Batch(Vec<TaggedResponse>),
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Conversation(_) => "conversation",
            Payload::Text(_) => "text",
            Payload::Json(_) => "json",
            Payload::Batch(_) => "batch",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text content contributed when this payload crosses a fan-in edge.
    ///
    /// Conversations contribute their latest message text; batches have no
    /// single text form and cannot be re-gathered.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Payload::Text(s) => Some(s.clone()),
            Payload::Conversation(messages) => Some(
                messages
                    .last()
                    .map(|m| m.text.clone())
                    .unwrap_or_default(),
            ),
            Payload::Json(value) => Some(value.to_string()),
            Payload::Batch(_) => None,
        }
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload::Text(s)
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload::Text(s.to_string())
    }
}
