//! Streaming delivery
//!
//! The glue a server-streaming handler runs: subscribe to a topic, forward
//! values to the peer until the call is cancelled or the peer fails, then
//! release the subscription.

pub mod sink;
pub mod stream;

pub use sink::DeliverySink;
pub use stream::{deliver, DeliveryError, DeliveryReport, StopReason};
