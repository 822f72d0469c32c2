//! Message types for reasoning collaborator requests.

use serde::{Deserialize, Serialize};

/// Role of a message sent to the reasoning collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    #[default]
    User,
    Assistant,
}

/// A message in a reasoning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Split a conversation into its system instructions and the remaining turns.
pub fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let system = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    let turns = messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .collect();
    (system, turns)
}
