//! Provider-agnostic LLM types and the `LlmProvider` / `EmbeddingProvider`
//! traits the rest of the bot talks to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A completion request.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// All system messages joined, if any.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// The user messages joined into the single prompt sent to the model.
    pub fn conversation_prompt(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
}

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

/// A text-embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;

    /// Embed each text; output order matches input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f64>>, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_joins_system_messages() {
        let req = CompletionRequest::new(vec![
            ChatMessage::system("one"),
            ChatMessage::user("hi"),
            ChatMessage::system("two"),
        ]);
        assert_eq!(req.system_prompt().as_deref(), Some("one\n\ntwo"));
    }

    #[test]
    fn no_system_prompt() {
        let req = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        assert!(req.system_prompt().is_none());
    }

    #[test]
    fn single_user_message_passes_through() {
        let req = CompletionRequest::new(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("Formality: neutral, email: hi"),
        ]);
        assert_eq!(req.conversation_prompt(), "Formality: neutral, email: hi");
    }

    #[test]
    fn user_messages_are_joined() {
        let req = CompletionRequest::new(vec![
            ChatMessage::user("a"),
            ChatMessage::system("sys"),
            ChatMessage::user("c"),
        ]);
        assert_eq!(req.conversation_prompt(), "a\n\nc");
        assert!(req.temperature.is_none());
    }
}
