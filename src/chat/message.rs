//! Message model

use std::time::SystemTime;

use super::ids::{AttachmentId, ChannelId, MessageId, UserId};

/// A chat message as persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message ID
    pub id: MessageId,
    /// Channel the message was posted to
    pub channel_id: ChannelId,
    /// Author
    pub sender_id: UserId,
    /// Text content
    pub content: String,
    /// When the message was created
    pub timestamp: SystemTime,
    /// Attached files
    pub attachments: Vec<MessageAttachment>,
}

impl Message {
    /// Create a new message stamped with the current time
    pub fn new(channel_id: ChannelId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            channel_id,
            sender_id,
            content: content.into(),
            timestamp: SystemTime::now(),
            attachments: Vec::new(),
        }
    }
}

/// Link between a message and a stored attachment blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttachment {
    /// Blob ID in attachment storage
    pub attachment_id: AttachmentId,
    /// Display file name
    pub name: String,
}
