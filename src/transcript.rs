//! Transcript - Chat Session Model
//!
//! The session is owned by the caller and threaded through each turn. Its
//! JSON form is the exact message the wallet signs, so field order and
//! formatting must match what the web client produced.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";
pub const FAILURE_MESSAGE: &str = "Something went horribly wrong. Call support!";

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Models offered for chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatModel {
    #[default]
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
    #[serde(rename = "gpt-4")]
    Gpt4,
}

impl ChatModel {
    pub const ALL: [ChatModel; 2] = [ChatModel::Gpt35Turbo, ChatModel::Gpt4];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatModel::Gpt35Turbo => "gpt-3.5-turbo",
            ChatModel::Gpt4 => "gpt-4",
        }
    }
}

impl FromStr for ChatModel {
    type Err = TranscriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| TranscriptError::UnknownModel(s.to_string()))
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered chat history. Serializes as a bare message array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatSession {
    /// Process-local id for log correlation, never serialized.
    #[serde(skip, default = "Uuid::new_v4")]
    id: Uuid,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::from_messages(vec![ChatMessage::new(Role::System, DEFAULT_SYSTEM_PROMPT)])
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { id: Uuid::new_v4(), messages }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(Role::User, content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::new(Role::Assistant, content));
    }

    /// Record a failed completion so the user sees it in the history.
    pub fn push_failure(&mut self) {
        self.messages.push(ChatMessage::new(Role::System, FAILURE_MESSAGE));
    }

    pub fn has_user_turn(&self) -> bool {
        self.messages
            .iter()
            .any(|m| m.role == Role::User && !m.content.trim().is_empty())
    }

    /// Compact JSON of the message array; this is what gets signed.
    pub fn signing_payload(&self) -> Result<String, TranscriptError> {
        Ok(serde_json::to_string(&self.messages)?)
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ChatSession {
    fn eq(&self, other: &Self) -> bool {
        self.messages == other.messages
    }
}

impl Eq for ChatSession {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_system_prompt() {
        let session = ChatSession::new();
        assert_eq!(session.len(), 1);
        assert_eq!(session.messages()[0].role, Role::System);
        assert!(!session.has_user_turn());
    }

    #[test]
    fn test_signing_payload_matches_web_client() {
        let mut session = ChatSession::new();
        session.push_user("hi \"there\"");
        session.push_assistant("Hello!");
        assert_eq!(
            session.signing_payload().unwrap(),
            r#"[{"role":"system","content":"You are a helpful assistant."},{"role":"user","content":"hi \"there\""},{"role":"assistant","content":"Hello!"}]"#
        );
    }

    #[test]
    fn test_blank_user_message_is_not_a_turn() {
        let mut session = ChatSession::new();
        session.push_user("   ");
        assert!(!session.has_user_turn());
    }

    #[test]
    fn test_failure_message_appended() {
        let mut session = ChatSession::new();
        session.push_failure();
        assert_eq!(session.messages()[1], ChatMessage::new(Role::System, FAILURE_MESSAGE));
    }

    #[test]
    fn test_session_deserializes_from_array() {
        let json = r#"[{"role":"user","content":"x"}]"#;
        let session: ChatSession = serde_json::from_str(json).unwrap();
        assert_eq!(session.len(), 1);
        assert!(session.has_user_turn());
        assert_eq!(serde_json::to_string(&session).unwrap(), json);
    }

    #[test]
    fn test_model_names() {
        assert_eq!("gpt-4".parse::<ChatModel>().unwrap(), ChatModel::Gpt4);
        assert_eq!(ChatModel::default().as_str(), "gpt-3.5-turbo");
        assert!("gpt-5".parse::<ChatModel>().is_err());
    }
}
