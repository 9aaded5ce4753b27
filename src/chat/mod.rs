//! Chat message paths built on the fan-out core
//!
//! This module provides:
//! - Typed IDs for channels, messages, users and attachments
//! - The message model and the `MessageStore` persistence trait
//! - `ChatService`: send (commit, then publish), history, and the
//!   new-message subscription/stream used by server-streaming calls

pub mod ids;
pub mod message;
pub mod service;
pub mod store;

pub use ids::{AttachmentId, ChannelId, MessageId, UserId};
pub use message::{Message, MessageAttachment};
pub use service::{ChatService, MessageBroker};
pub use store::{MemoryStore, MessageStore, StoreError};
