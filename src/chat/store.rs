//! Persistence collaborator
//!
//! The fan-out core never touches storage itself; the chat service only
//! needs these three operations from whatever database backs it.

use std::future::Future;
use std::time::SystemTime;

use tokio::sync::RwLock;

use super::ids::{ChannelId, MessageId};
use super::message::Message;

/// Error type for message store operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No message with this ID
    NotFound(MessageId),
    /// The backing store failed
    Backend(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "Message not found: {}", id),
            StoreError::Backend(msg) => write!(f, "Store backend error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable message storage
pub trait MessageStore: Send + Sync {
    /// Commit a new message; returns only once it is readable
    fn insert_message(
        &self,
        message: Message,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Fetch one message
    fn get_message(&self, id: MessageId)
        -> impl Future<Output = Result<Message, StoreError>> + Send;

    /// Up to `count` messages of a channel older than `before`, newest first
    fn message_history(
        &self,
        channel_id: ChannelId,
        before: SystemTime,
        count: usize,
    ) -> impl Future<Output = Result<Vec<Message>, StoreError>> + Send;
}

/// In-memory message store
#[derive(Debug, Default)]
pub struct MemoryStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored messages
    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
        self.messages.write().await.push(message);
        Ok(())
    }

    async fn get_message(&self, id: MessageId) -> Result<Message, StoreError> {
        self.messages
            .read()
            .await
            .iter()
            .find(|m| m.id == id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn message_history(
        &self,
        channel_id: ChannelId,
        before: SystemTime,
        count: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.read().await;

        let mut history: Vec<Message> = messages
            .iter()
            .filter(|m| m.channel_id == channel_id && m.timestamp < before)
            .cloned()
            .collect();

        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(count);

        Ok(history)
    }
}
