//! Channel trait and the message types that flow through it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Name of the channel it arrived on.
    pub channel: String,
    /// Channel-native user identifier.
    pub user_id: String,
    pub user_name: Option<String>,
    pub content: String,
    /// Client-chosen thread, when the channel supports several per user.
    pub thread_id: Option<String>,
    pub received_at: DateTime<Utc>,
    /// Channel-specific routing data (e.g. Telegram `chat_id`).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(channel: &str, user_id: &str, content: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            content: content.to_string(),
            thread_id: None,
            received_at: Utc::now(),
            metadata: serde_json::json!({}),
        }
    }

    pub fn with_thread(mut self, thread_id: &str) -> Self {
        self.thread_id = Some(thread_id.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: &str) -> Self {
        self.user_name = Some(name.to_string());
        self
    }

    /// Stable key of the conversation this message belongs to: the thread
    /// when one is given, the user otherwise.
    pub fn conversation_key(&self) -> String {
        let scope = self.thread_id.as_deref().unwrap_or(&self.user_id);
        format!("{}:{}", self.channel, scope)
    }
}

/// A reply to send back on the channel a message came from.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub content: String,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Stream of incoming messages produced by `Channel::start`.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A source and sink of chat messages.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name, used to route replies.
    fn name(&self) -> &str;

    /// Begin receiving messages. Called once.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a reply to the conversation `msg` came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError>;

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
