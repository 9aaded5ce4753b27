//! Real-time notification fan-out for a chat backend
//!
//! Lets many server-streaming calls learn, without polling, about messages
//! posted to the chat channel they watch. Channels come and go at will and
//! publishers never wait on consumers that have gone quiet.
//!
//! - [`broadcast::Broadcaster`]: one topic, one owning task, many outputs
//! - [`registry::KeyedRegistry`]: topics created on first subscribe and
//!   reclaimed when the last subscriber leaves
//! - [`delivery::deliver`]: the loop a streaming handler runs
//! - [`chat::ChatService`]: commit-then-publish write path and the
//!   new-message stream
//!
//! # Example
//! ```no_run
//! use chat_fanout::chat::{ChannelId, ChatService, MemoryStore, MessageBroker, UserId};
//!
//! # async fn example() -> chat_fanout::Result<()> {
//! let service = ChatService::new(MemoryStore::new(), MessageBroker::new());
//! let channel = ChannelId::new();
//!
//! let mut sub = service.subscribe_new_messages(channel).await?;
//! let id = service.send_message(UserId::new(), channel, "hello").await?;
//!
//! assert_eq!(sub.recv().await, Some(id));
//! sub.unsubscribe().await;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod chat;
pub mod delivery;
pub mod error;
pub mod registry;

pub use broadcast::{BroadcastConfig, Broadcaster, DeliveryPolicy};
pub use delivery::{deliver, DeliverySink};
pub use error::{Error, Result};
pub use registry::{KeyedRegistry, RegistryConfig, Subscription, TeardownPolicy};
