//! Keyed registry for multi-topic pub/sub
//!
//! The registry maps topic keys (chat channel IDs) to broadcasters. Topics
//! are created on the first `subscribe` and, under the default
//! `TeardownPolicy::Eager`, torn down when the last subscriber leaves.
//!
//! # Architecture
//!
//! ```text
//!                        KeyedRegistry (Clone)
//!                  ┌───────────────────────────────┐
//!                  │ topics: RwLock<HashMap<Key,   │
//!                  │   TopicEntry {                │
//!                  │     broadcaster,              │
//!                  │     subscribers: usize,       │
//!                  │   }                           │
//!                  │ >                             │
//!                  └───────────────┬───────────────┘
//!                                  │  lock held for lookup/insert/remove only
//!          ┌───────────────────────┼───────────────────────┐
//!          │                       │                       │
//!          ▼                       ▼                       ▼
//!     [Publisher]            [Subscription]          [Subscription]
//!     publish(key, v)        recv()                  recv()
//!          │                       ▲                       ▲
//!          └──► broadcaster.submit()──► owning loop ───────┘
//! ```
//!
//! # Teardown
//!
//! With `Eager`, memory is bounded by live subscriptions at the cost of
//! spawning a new loop when a channel is revisited. With `Retain`, dormant
//! topics stay warm until the cleanup task finds them idle for longer than
//! `idle_topic_timeout`.

pub mod config;
pub mod entry;
pub mod error;
pub mod store;
pub mod subscription;

pub use config::{RegistryConfig, TeardownPolicy};
pub use entry::TopicStats;
pub use error::RegistryError;
pub use store::KeyedRegistry;
pub use subscription::Subscription;
