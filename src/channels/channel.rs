//! The source-channel abstraction consumed by the listener.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use uuid::Uuid;

use crate::error::ChannelError;

/// An inbound item observed on a source channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Channel name ("telegram").
    pub channel: String,
    /// Chat the item was posted in (username or numeric id).
    pub chat: String,
    /// Raw message text.
    pub content: String,
    pub received_at: DateTime<Utc>,
    /// Channel-specific extras (update id, message id, ...).
    pub metadata: serde_json::Value,
}

impl IncomingMessage {
    pub fn new(
        channel: impl Into<String>,
        chat: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.into(),
            chat: chat.into(),
            content: content.into(),
            received_at: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_received_at(mut self, received_at: DateTime<Utc>) -> Self {
        self.received_at = received_at;
        self
    }
}

/// Async sequence of inbound messages.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// A live subscription to a single source channel.
///
/// `start` may be called again after a previous stream ended; implementations
/// must not assume the underlying connection is permanent.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Open the subscription and return its message stream.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
