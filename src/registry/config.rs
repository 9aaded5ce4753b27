//! Registry configuration

use std::time::Duration;

use crate::broadcast::{BroadcastConfig, DeliveryPolicy};

/// When topics with no subscribers are reclaimed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TeardownPolicy {
    /// Remove and close the topic as soon as its last subscriber leaves
    #[default]
    Eager,
    /// Keep dormant topics until `cleanup` finds them idle for longer
    /// than `idle_topic_timeout`
    Retain,
}

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Input buffer depth of each topic (producer backpressure threshold)
    pub input_capacity: usize,

    /// Buffer depth of each subscriber conduit
    pub subscriber_capacity: usize,

    /// Full-conduit handling for every topic
    pub delivery: DeliveryPolicy,

    /// Dormant topic handling
    pub teardown: TeardownPolicy,

    /// How long a dormant topic survives under `TeardownPolicy::Retain`
    pub idle_topic_timeout: Duration,

    /// Interval of the background cleanup task
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            input_capacity: 64,
            subscriber_capacity: 10,
            delivery: DeliveryPolicy::default(),
            teardown: TeardownPolicy::default(),
            idle_topic_timeout: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the per-topic input buffer depth (raised to 1 if zero)
    pub fn input_capacity(mut self, capacity: usize) -> Self {
        self.input_capacity = capacity.max(1);
        self
    }

    /// Set the per-subscriber buffer depth (raised to 1 if zero)
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }

    /// Set the delivery policy
    pub fn delivery(mut self, policy: DeliveryPolicy) -> Self {
        self.delivery = policy;
        self
    }

    /// Set the teardown policy
    pub fn teardown(mut self, policy: TeardownPolicy) -> Self {
        self.teardown = policy;
        self
    }

    /// Set the dormant topic timeout
    pub fn idle_topic_timeout(mut self, timeout: Duration) -> Self {
        self.idle_topic_timeout = timeout;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Broadcaster configuration used for each topic
    pub fn broadcast_config(&self) -> BroadcastConfig {
        BroadcastConfig::default()
            .input_capacity(self.input_capacity)
            .output_capacity(self.subscriber_capacity)
            .delivery(self.delivery)
    }
}
