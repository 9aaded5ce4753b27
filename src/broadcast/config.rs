//! Broadcaster configuration

/// How the owning loop treats a subscriber whose conduit is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Wait until the subscriber makes room.
    ///
    /// A live subscriber that stops draining stalls the whole topic,
    /// including the publisher once the input buffer fills up.
    Block,
    /// Drop the value for that subscriber only
    #[default]
    DropNewest,
    /// Remove the subscriber; its conduit closes
    Evict,
}

/// Broadcaster configuration options
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Input buffer depth (producer backpressure threshold)
    pub input_capacity: usize,

    /// Buffer depth of outputs allocated by `Broadcaster::subscribe`
    pub output_capacity: usize,

    /// Full-conduit handling
    pub delivery: DeliveryPolicy,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            input_capacity: 64,
            output_capacity: 16,
            delivery: DeliveryPolicy::default(),
        }
    }
}

impl BroadcastConfig {
    /// Set the input buffer depth (raised to 1 if zero)
    pub fn input_capacity(mut self, capacity: usize) -> Self {
        self.input_capacity = capacity.max(1);
        self
    }

    /// Set the per-subscriber output buffer depth (raised to 1 if zero)
    pub fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity.max(1);
        self
    }

    /// Set the delivery policy
    pub fn delivery(mut self, policy: DeliveryPolicy) -> Self {
        self.delivery = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BroadcastConfig::default();

        assert_eq!(config.input_capacity, 64);
        assert_eq!(config.output_capacity, 16);
        assert_eq!(config.delivery, DeliveryPolicy::DropNewest);
    }

    #[test]
    fn test_zero_capacity_raised() {
        let config = BroadcastConfig::default()
            .input_capacity(0)
            .output_capacity(0);

        assert_eq!(config.input_capacity, 1);
        assert_eq!(config.output_capacity, 1);
    }

    #[test]
    fn test_builder_chaining() {
        let config = BroadcastConfig::default()
            .input_capacity(8)
            .output_capacity(2)
            .delivery(DeliveryPolicy::Evict);

        assert_eq!(config.input_capacity, 8);
        assert_eq!(config.output_capacity, 2);
        assert_eq!(config.delivery, DeliveryPolicy::Evict);
    }
}
