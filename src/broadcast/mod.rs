//! Single-topic broadcast primitive
//!
//! A `Broadcaster` owns one logical topic. All registration, unregistration
//! and publish requests are serialized through one spawned task, which is
//! the only code that ever touches the subscriber set.
//!
//! # Architecture
//!
//! ```text
//!   submit() / try_submit()        register()          unregister()
//!            │                         │                     │
//!            ▼                         ▼                     ▼
//!      ┌──────────── commands (bounded, ordered) ───┐   unregister queue
//!      │  Publish(v) │ Register(tx) │ Publish(v) …  │   (unbounded)
//!      └──────────────────────┬──────────────────────┘        │
//!                             ▼                               │
//!                   ┌──────────────────┐◄─────────────────────┘
//!                   │  BroadcastLoop   │◄── close (watch)
//!                   │  outputs: {id→tx}│
//!                   └────────┬─────────┘
//!               ┌────────────┼────────────┐
//!               ▼            ▼            ▼
//!           [output]     [output]     [output]
//! ```
//!
//! Publishes and registrations share one queue, so a registration takes
//! effect strictly between the values submitted before and after it.

pub mod broadcaster;
pub mod config;
pub mod error;

pub use broadcaster::{BroadcastStats, Broadcaster, SubscriberId};
pub use config::{BroadcastConfig, DeliveryPolicy};
pub use error::BroadcastError;
