//! Topic entry and stats types
//!
//! This module defines the per-topic state stored in the registry.

use std::time::{Duration, Instant};

use crate::broadcast::Broadcaster;

use super::config::RegistryConfig;

/// Entry for a single topic in the registry
pub(super) struct TopicEntry<V> {
    /// Fan-out loop for this topic
    pub(super) broadcaster: Broadcaster<V>,

    /// Live subscription handles (not outputs: an evicted subscriber still
    /// counts until its handle is released)
    pub(super) subscribers: usize,

    /// When the topic was created
    pub(super) created_at: Instant,

    /// When the last subscriber left (None while subscribed)
    pub(super) idle_since: Option<Instant>,
}

impl<V: Clone + Send + 'static> TopicEntry<V> {
    /// Create a new topic entry, spawning its broadcaster
    pub(super) fn new(config: &RegistryConfig) -> Self {
        Self {
            broadcaster: Broadcaster::with_config(config.broadcast_config()),
            subscribers: 0,
            created_at: Instant::now(),
            idle_since: None,
        }
    }
}

impl<V> TopicEntry<V> {
    /// Check whether a dormant topic has outlived `timeout`
    pub(super) fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        if self.broadcaster.is_closed() {
            return true;
        }

        self.subscribers == 0
            && self
                .idle_since
                .is_some_and(|since| now.duration_since(since) > timeout)
    }

    pub(super) fn stats(&self) -> TopicStats {
        let broadcast = self.broadcaster.stats();

        TopicStats {
            subscribers: self.subscribers,
            outputs: broadcast.subscribers,
            published: broadcast.published,
            delivered: broadcast.delivered,
            dropped: broadcast.dropped,
            evicted: broadcast.evicted,
            age: self.created_at.elapsed(),
            idle_for: self.idle_since.map(|since| since.elapsed()),
        }
    }
}

/// Statistics for a topic
#[derive(Debug, Clone)]
pub struct TopicStats {
    /// Live subscription handles
    pub subscribers: usize,
    /// Outputs currently receiving values
    pub outputs: usize,
    /// Values fanned out
    pub published: u64,
    /// Values pushed into an output
    pub delivered: u64,
    /// Values skipped for full outputs
    pub dropped: u64,
    /// Outputs evicted for being full
    pub evicted: u64,
    /// Time since the topic was created
    pub age: Duration,
    /// Time since the last subscriber left
    pub idle_for: Option<Duration>,
}
