//! Chat service
//!
//! The write and read paths around the fan-out core. Sending a message
//! commits it to the store and only then notifies the channel's
//! subscribers, so a notified reader can always fetch what it was told
//! about.

use std::future::Future;
use std::time::SystemTime;

use crate::delivery::{self, DeliveryReport, DeliverySink};
use crate::error::{Error, Result};
use crate::registry::{KeyedRegistry, Subscription};

use super::ids::{AttachmentId, ChannelId, MessageId, UserId};
use super::message::{Message, MessageAttachment};
use super::store::MessageStore;

/// New-message notifications keyed by channel
pub type MessageBroker = KeyedRegistry<ChannelId, MessageId>;

/// Chat message service
pub struct ChatService<S> {
    store: S,
    broker: MessageBroker,
}

impl<S: MessageStore> ChatService<S> {
    /// Create a service over a store and a shared broker
    pub fn new(store: S, broker: MessageBroker) -> Self {
        Self { store, broker }
    }

    /// Get the notification broker
    pub fn broker(&self) -> &MessageBroker {
        &self.broker
    }

    /// Get the message store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Post a text message
    pub async fn send_message(
        &self,
        sender_id: UserId,
        channel_id: ChannelId,
        content: impl Into<String>,
    ) -> Result<MessageId> {
        self.send_message_with_attachments(sender_id, channel_id, content, &[], &[])
            .await
    }

    /// Post a message with attachments
    ///
    /// `attachment_ids` and `attachment_names` are paired by position.
    pub async fn send_message_with_attachments(
        &self,
        sender_id: UserId,
        channel_id: ChannelId,
        content: impl Into<String>,
        attachment_ids: &[AttachmentId],
        attachment_names: &[String],
    ) -> Result<MessageId> {
        if attachment_ids.len() != attachment_names.len() {
            return Err(Error::AttachmentMismatch {
                ids: attachment_ids.len(),
                names: attachment_names.len(),
            });
        }

        let mut message = Message::new(channel_id, sender_id, content);
        message.attachments = attachment_ids
            .iter()
            .zip(attachment_names)
            .map(|(&attachment_id, name)| MessageAttachment {
                attachment_id,
                name: name.clone(),
            })
            .collect();

        let message_id = message.id;
        self.store.insert_message(message).await?;

        // The message is committed; a topic closing under us only means
        // nobody was listening.
        if let Err(e) = self.broker.publish(&channel_id, message_id).await {
            tracing::debug!(
                channel = %channel_id,
                message = %message_id,
                error = %e,
                "New message notification dropped"
            );
        }

        tracing::debug!(
            channel = %channel_id,
            message = %message_id,
            attachments = attachment_ids.len(),
            "Message sent"
        );

        Ok(message_id)
    }

    /// Fetch one message
    pub async fn get_message(&self, message_id: MessageId) -> Result<Message> {
        Ok(self.store.get_message(message_id).await?)
    }

    /// Fetch up to `count` messages older than `before`, newest first
    pub async fn message_history(
        &self,
        channel_id: ChannelId,
        before: SystemTime,
        count: usize,
    ) -> Result<Vec<Message>> {
        Ok(self
            .store
            .message_history(channel_id, before, count)
            .await?)
    }

    /// Subscribe to IDs of messages posted to a channel from now on
    pub async fn subscribe_new_messages(
        &self,
        channel_id: ChannelId,
    ) -> Result<Subscription<ChannelId, MessageId>> {
        Ok(self.broker.subscribe(channel_id).await?)
    }

    /// Serve a new-messages stream for a channel given in text form
    ///
    /// Runs until `cancel` completes (the call ended) or the sink fails.
    pub async fn stream_new_messages<T, C>(
        &self,
        channel: &str,
        sink: &mut T,
        cancel: C,
    ) -> Result<DeliveryReport>
    where
        T: DeliverySink<MessageId>,
        T::Error: std::error::Error + Send + Sync + 'static,
        C: Future<Output = ()>,
    {
        let channel_id: ChannelId = channel.parse()?;

        tracing::debug!(channel = %channel_id, "New-message stream opened");

        Ok(delivery::deliver(&self.broker, channel_id, sink, cancel).await?)
    }
}
